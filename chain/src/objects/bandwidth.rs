//! Per-account bandwidth usage records.

use amalgam_store::{ObjectId, StateObject};
use amalgam_types::{AccountName, Timestamp};

/// Which rate-limit bucket a transaction charges.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum BandwidthType {
    /// Ordinary transactions.
    Forum,
    /// Transactions carrying a market operation; charged at 10x.
    Market,
}

/// Exponentially averaged bandwidth use for one account and bucket.
///
/// `average_bandwidth` decays linearly across the one-week window; a
/// record untouched for a full window restarts from zero.
#[derive(Clone, Debug)]
pub struct AccountBandwidthObject {
    pub id: ObjectId,
    pub account: AccountName,
    pub bandwidth_type: BandwidthType,
    pub average_bandwidth: u64,
    pub lifetime_bandwidth: u64,
    pub last_bandwidth_update: Timestamp,
}

impl StateObject for AccountBandwidthObject {
    type Key = (AccountName, BandwidthType);
    type OrderKey = (AccountName, BandwidthType);

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> (AccountName, BandwidthType) {
        (self.account.clone(), self.bandwidth_type)
    }

    fn order_key(&self) -> (AccountName, BandwidthType) {
        (self.account.clone(), self.bandwidth_type)
    }
}
