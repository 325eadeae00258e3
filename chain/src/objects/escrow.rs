//! Escrow agreements between two parties and an agent.

use amalgam_store::{ObjectId, StateObject};
use amalgam_types::{AccountName, Asset, Timestamp};

/// Funds held pending approval and possible dispute.
///
/// The ordered index puts unratified escrows first, deadline ascending,
/// so the ratification sweep stops at the first approved or not-yet-due
/// row.
#[derive(Clone, Debug)]
pub struct EscrowObject {
    pub id: ObjectId,
    pub escrow_id: u32,
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    pub ratification_deadline: Timestamp,
    pub escrow_expiration: Timestamp,
    pub abd_balance: Asset,
    pub aml_balance: Asset,
    pub pending_fee: Asset,
    pub to_approved: bool,
    pub agent_approved: bool,
    pub disputed: bool,
}

impl EscrowObject {
    /// Both non-initiating parties have signed off; funds may move.
    pub fn is_approved(&self) -> bool {
        self.to_approved && self.agent_approved
    }
}

impl StateObject for EscrowObject {
    type Key = (AccountName, u32);
    type OrderKey = (bool, Timestamp);

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> (AccountName, u32) {
        (self.from.clone(), self.escrow_id)
    }

    fn order_key(&self) -> (bool, Timestamp) {
        (self.is_approved(), self.ratification_deadline)
    }
}
