//! Vesting delegations and power-down routing.

use amalgam_store::{ObjectId, StateObject};
use amalgam_types::{AccountName, Asset, Timestamp};

/// An active delegation of vesting shares from one account to another.
#[derive(Clone, Debug)]
pub struct VestingDelegationObject {
    pub id: ObjectId,
    pub delegator: AccountName,
    pub delegatee: AccountName,
    pub vesting_shares: Asset,
    /// Earliest time a reduction of this delegation may return shares.
    pub min_delegation_time: Timestamp,
}

impl StateObject for VestingDelegationObject {
    type Key = (AccountName, AccountName);
    type OrderKey = (AccountName, AccountName);

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> (AccountName, AccountName) {
        (self.delegator.clone(), self.delegatee.clone())
    }

    fn order_key(&self) -> (AccountName, AccountName) {
        (self.delegator.clone(), self.delegatee.clone())
    }
}

/// Shares pulled out of a delegation, in limbo until their cooldown
/// passes and they return to the delegator.
#[derive(Clone, Debug)]
pub struct VestingDelegationExpirationObject {
    pub id: ObjectId,
    pub delegator: AccountName,
    pub vesting_shares: Asset,
    pub expiration: Timestamp,
}

impl StateObject for VestingDelegationExpirationObject {
    type Key = ObjectId;
    type OrderKey = Timestamp;

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> ObjectId {
        self.id
    }

    fn order_key(&self) -> Timestamp {
        self.expiration
    }
}

/// A standing instruction to divert part of each power-down payment.
#[derive(Clone, Debug)]
pub struct WithdrawVestingRouteObject {
    pub id: ObjectId,
    pub from: AccountName,
    pub to: AccountName,
    pub percent: u16,
    /// Deliver as vesting shares instead of liquid AML.
    pub auto_vest: bool,
}

impl StateObject for WithdrawVestingRouteObject {
    type Key = (AccountName, AccountName);
    type OrderKey = (AccountName, AccountName);

    fn id(&self) -> ObjectId {
        self.id
    }

    fn key(&self) -> (AccountName, AccountName) {
        (self.from.clone(), self.to.clone())
    }

    fn order_key(&self) -> (AccountName, AccountName) {
        (self.from.clone(), self.to.clone())
    }
}
