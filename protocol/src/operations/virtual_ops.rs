//! Virtual operations.
//!
//! Emitted by the chain as a record of things it did on its own (filling
//! orders, paying interest, returning expired delegations). They exist
//! for observers and account history; they are never part of a
//! transaction and carry no validation or authority of their own.

use amalgam_types::{AccountName, Asset};
use serde::{Deserialize, Serialize};

/// A conversion request settled at the median feed price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FillConvertRequestOp {
    pub owner: AccountName,
    pub request_id: u32,
    pub amount_in: Asset,
    pub amount_out: Asset,
}

/// ABD interest credited when a balance-touching operation compounds it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterestOp {
    pub owner: AccountName,
    pub interest: Asset,
}

/// One weekly power-down installment paid out (or routed).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FillVestingWithdrawOp {
    pub from_account: AccountName,
    pub to_account: AccountName,
    pub withdrawn: Asset,
    pub deposited: Asset,
}

/// Two orders crossed; each side learns what it paid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FillOrderOp {
    pub current_owner: AccountName,
    pub current_order_id: u32,
    pub current_pays: Asset,
    pub open_owner: AccountName,
    pub open_order_id: u32,
    pub open_pays: Asset,
}

/// A witness missed enough blocks to be withdrawn from scheduling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShutdownWitnessOp {
    pub owner: AccountName,
}

/// A savings withdrawal completed after its delay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FillTransferFromSavingsOp {
    pub from: AccountName,
    pub to: AccountName,
    pub amount: Asset,
    pub request_id: u32,
    pub memo: String,
}

/// A hardfork activated at this block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HardforkOp {
    pub hardfork_id: u32,
}

/// An expired delegation's shares returned to the delegator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReturnVestingDelegationOp {
    pub account: AccountName,
    pub vesting_shares: Asset,
}

/// The block producer's reward, paid in vesting shares.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProducerRewardOp {
    pub producer: AccountName,
    pub vesting_shares: Asset,
}
