//! Consensus state records and their table index keys.

mod account;
mod bandwidth;
mod escrow;
mod global;
mod market;
mod recovery;
mod savings;
mod vesting;
mod witness;

pub use account::{AccountAuthorityObject, AccountObject, OwnerAuthorityHistoryObject};
pub use bandwidth::{AccountBandwidthObject, BandwidthType};
pub use escrow::EscrowObject;
pub use global::{
    BlockSummaryObject, DynamicGlobalProperties, FeedHistory, ReserveRatio, RewardCurve,
    RewardFund, TransactionRecordObject,
};
pub use market::{ConvertRequestObject, LimitOrderObject};
pub use recovery::{
    AccountRecoveryRequestObject, ChangeRecoveryAccountRequestObject,
    DeclineVotingRightsRequestObject,
};
pub use savings::SavingsWithdrawObject;
pub use vesting::{
    VestingDelegationExpirationObject, VestingDelegationObject, WithdrawVestingRouteObject,
};
pub use witness::{WitnessObject, WitnessVoteObject};
