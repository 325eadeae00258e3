//! Account recovery requests and voting-rights declines.

use amalgam_protocol::Authority;
use amalgam_store::{ObjectId, StateObject};
use amalgam_types::{AccountName, Timestamp};

/// A pending owner-key recovery, valid for one day.
#[derive(Clone, Debug)]
pub struct AccountRecoveryRequestObject {
    pub id: ObjectId,
    pub account_to_recover: AccountName,
    pub new_owner_authority: Authority,
    pub expires: Timestamp,
}

impl StateObject for AccountRecoveryRequestObject {
    type Key = AccountName;
    type OrderKey = Timestamp;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> AccountName {
        self.account_to_recover.clone()
    }

    fn order_key(&self) -> Timestamp {
        self.expires
    }
}

/// A pending change of recovery partner, effective after thirty days.
#[derive(Clone, Debug)]
pub struct ChangeRecoveryAccountRequestObject {
    pub id: ObjectId,
    pub account_to_recover: AccountName,
    pub recovery_account: AccountName,
    pub effective_on: Timestamp,
}

impl StateObject for ChangeRecoveryAccountRequestObject {
    type Key = AccountName;
    type OrderKey = Timestamp;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> AccountName {
        self.account_to_recover.clone()
    }

    fn order_key(&self) -> Timestamp {
        self.effective_on
    }
}

/// An announced, irreversible surrender of voting rights, effective
/// after thirty days.
#[derive(Clone, Debug)]
pub struct DeclineVotingRightsRequestObject {
    pub id: ObjectId,
    pub account: AccountName,
    pub effective_date: Timestamp,
}

impl StateObject for DeclineVotingRightsRequestObject {
    type Key = AccountName;
    type OrderKey = Timestamp;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> AccountName {
        self.account.clone()
    }

    fn order_key(&self) -> Timestamp {
        self.effective_date
    }
}
