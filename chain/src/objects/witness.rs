//! Witness records and per-account witness approvals.

use std::cmp::Reverse;

use amalgam_protocol::operations::ChainProperties;
use amalgam_store::{ObjectId, StateObject};
use amalgam_types::{AccountName, Price, PublicKey, Timestamp};

/// A block producer candidate.
///
/// The ordered index ranks by vote total descending, owner name breaking
/// ties, which is exactly the order the schedule and median refresh walk.
#[derive(Clone, Debug)]
pub struct WitnessObject {
    pub id: ObjectId,
    pub owner: AccountName,
    pub created: Timestamp,
    pub url: String,
    /// Sum of witness_vote_weight over all approving accounts.
    pub votes: i64,
    /// All-zero key means the witness has signalled (or been swept into)
    /// shutdown and is skipped by the schedule.
    pub signing_key: PublicKey,
    pub props: ChainProperties,
    pub abd_exchange_rate: Option<Price>,
    pub last_abd_exchange_update: Timestamp,
    pub last_confirmed_block_num: u32,
}

impl WitnessObject {
    pub fn new(id: ObjectId, owner: AccountName, created: Timestamp) -> Self {
        Self {
            id,
            owner,
            created,
            url: String::new(),
            votes: 0,
            signing_key: PublicKey::ZERO,
            props: ChainProperties::default(),
            abd_exchange_rate: None,
            last_abd_exchange_update: Timestamp::EPOCH,
            last_confirmed_block_num: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.signing_key != PublicKey::ZERO
    }
}

impl StateObject for WitnessObject {
    type Key = AccountName;
    type OrderKey = (Reverse<i64>, AccountName);

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> AccountName {
        self.owner.clone()
    }

    fn order_key(&self) -> (Reverse<i64>, AccountName) {
        (Reverse(self.votes), self.owner.clone())
    }
}

/// One account's approval of one witness.
#[derive(Clone, Debug)]
pub struct WitnessVoteObject {
    pub id: ObjectId,
    pub account: AccountName,
    pub witness: AccountName,
}

impl StateObject for WitnessVoteObject {
    type Key = (AccountName, AccountName);
    type OrderKey = (AccountName, AccountName);

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> (AccountName, AccountName) {
        (self.account.clone(), self.witness.clone())
    }

    fn order_key(&self) -> (AccountName, AccountName) {
        (self.account.clone(), self.witness.clone())
    }
}
