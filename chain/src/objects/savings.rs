//! Delayed withdrawals out of savings balances.

use amalgam_store::{ObjectId, StateObject};
use amalgam_types::{AccountName, Asset, Timestamp};

/// A savings withdrawal waiting out its three-day delay.
#[derive(Clone, Debug)]
pub struct SavingsWithdrawObject {
    pub id: ObjectId,
    pub from: AccountName,
    pub to: AccountName,
    pub memo: String,
    pub request_id: u32,
    pub amount: Asset,
    pub complete: Timestamp,
}

impl StateObject for SavingsWithdrawObject {
    type Key = (AccountName, u32);
    type OrderKey = Timestamp;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> (AccountName, u32) {
        (self.from.clone(), self.request_id)
    }

    fn order_key(&self) -> Timestamp {
        self.complete
    }
}
