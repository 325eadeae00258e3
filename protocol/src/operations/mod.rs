//! The closed set of chain operations.
//!
//! Variant order is consensus: it fixes each operation's serialized tag.
//! New operations append after the last user operation; virtual operations
//! stay at the tail and never appear inside transactions.

pub mod account;
pub mod balances;
pub mod custom;
pub mod escrow;
pub mod market;
pub mod recovery;
pub mod savings;
pub mod virtual_ops;
pub mod witness;

use amalgam_types::{AccountName, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::authority::Authority;
use crate::error::ProtocolError;

pub use account::{AccountCreateOp, AccountUpdateOp};
pub use balances::{
    DelegateVestingSharesOp, SetWithdrawVestingRouteOp, TransferOp, TransferToVestingOp,
    WithdrawVestingOp,
};
pub use custom::{CustomBinaryOp, CustomJsonOp, CustomOp};
pub use escrow::{EscrowApproveOp, EscrowDisputeOp, EscrowReleaseOp, EscrowTransferOp};
pub use market::{
    ConvertOp, FeedPublishOp, LimitOrderCancelOp, LimitOrderCreate2Op, LimitOrderCreateOp,
};
pub use recovery::{
    ChangeRecoveryAccountOp, DeclineVotingRightsOp, RecoverAccountOp, RequestAccountRecoveryOp,
};
pub use savings::{CancelTransferFromSavingsOp, TransferFromSavingsOp, TransferToSavingsOp};
pub use virtual_ops::{
    FillConvertRequestOp, FillOrderOp, FillTransferFromSavingsOp, FillVestingWithdrawOp,
    HardforkOp, InterestOp, ProducerRewardOp, ReturnVestingDelegationOp, ShutdownWitnessOp,
};
pub use witness::{
    AccountWitnessProxyOp, AccountWitnessVoteOp, ChainProperties, DecodedWitnessProperties,
    WitnessSetPropertiesOp, WitnessUpdateOp,
};

/// Authority requirements collected from the operations of a transaction.
///
/// The account sets name accounts whose owner/active/posting authority
/// must be satisfied;
/// `other` carries literal authorities some operations declare inline
/// (account recovery, witness property updates).
#[derive(Clone, Debug, Default)]
pub struct RequiredAuthorities {
    pub owner: BTreeSet<AccountName>,
    pub active: BTreeSet<AccountName>,
    pub posting: BTreeSet<AccountName>,
    pub other: Vec<Authority>,
}

impl RequiredAuthorities {
    pub fn is_empty(&self) -> bool {
        self.owner.is_empty()
            && self.active.is_empty()
            && self.posting.is_empty()
            && self.other.is_empty()
    }
}

/// Every operation the chain understands, user-submitted and virtual.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    Transfer(TransferOp),
    TransferToVesting(TransferToVestingOp),
    WithdrawVesting(WithdrawVestingOp),
    LimitOrderCreate(LimitOrderCreateOp),
    LimitOrderCancel(LimitOrderCancelOp),
    FeedPublish(FeedPublishOp),
    Convert(ConvertOp),
    AccountCreate(AccountCreateOp),
    AccountUpdate(AccountUpdateOp),
    WitnessUpdate(WitnessUpdateOp),
    AccountWitnessVote(AccountWitnessVoteOp),
    AccountWitnessProxy(AccountWitnessProxyOp),
    Custom(CustomOp),
    CustomJson(CustomJsonOp),
    SetWithdrawVestingRoute(SetWithdrawVestingRouteOp),
    LimitOrderCreate2(LimitOrderCreate2Op),
    RequestAccountRecovery(RequestAccountRecoveryOp),
    RecoverAccount(RecoverAccountOp),
    ChangeRecoveryAccount(ChangeRecoveryAccountOp),
    EscrowTransfer(EscrowTransferOp),
    EscrowDispute(EscrowDisputeOp),
    EscrowRelease(EscrowReleaseOp),
    EscrowApprove(EscrowApproveOp),
    TransferToSavings(TransferToSavingsOp),
    TransferFromSavings(TransferFromSavingsOp),
    CancelTransferFromSavings(CancelTransferFromSavingsOp),
    CustomBinary(CustomBinaryOp),
    DeclineVotingRights(DeclineVotingRightsOp),
    DelegateVestingShares(DelegateVestingSharesOp),
    WitnessSetProperties(WitnessSetPropertiesOp),
    // virtual operations below this point
    FillConvertRequest(FillConvertRequestOp),
    Interest(InterestOp),
    FillVestingWithdraw(FillVestingWithdrawOp),
    FillOrder(FillOrderOp),
    ShutdownWitness(ShutdownWitnessOp),
    FillTransferFromSavings(FillTransferFromSavingsOp),
    Hardfork(HardforkOp),
    ReturnVestingDelegation(ReturnVestingDelegationOp),
    ProducerReward(ProducerRewardOp),
}

impl Operation {
    /// The operation's canonical name, for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transfer(_) => "transfer",
            Self::TransferToVesting(_) => "transfer_to_vesting",
            Self::WithdrawVesting(_) => "withdraw_vesting",
            Self::LimitOrderCreate(_) => "limit_order_create",
            Self::LimitOrderCancel(_) => "limit_order_cancel",
            Self::FeedPublish(_) => "feed_publish",
            Self::Convert(_) => "convert",
            Self::AccountCreate(_) => "account_create",
            Self::AccountUpdate(_) => "account_update",
            Self::WitnessUpdate(_) => "witness_update",
            Self::AccountWitnessVote(_) => "account_witness_vote",
            Self::AccountWitnessProxy(_) => "account_witness_proxy",
            Self::Custom(_) => "custom",
            Self::CustomJson(_) => "custom_json",
            Self::SetWithdrawVestingRoute(_) => "set_withdraw_vesting_route",
            Self::LimitOrderCreate2(_) => "limit_order_create2",
            Self::RequestAccountRecovery(_) => "request_account_recovery",
            Self::RecoverAccount(_) => "recover_account",
            Self::ChangeRecoveryAccount(_) => "change_recovery_account",
            Self::EscrowTransfer(_) => "escrow_transfer",
            Self::EscrowDispute(_) => "escrow_dispute",
            Self::EscrowRelease(_) => "escrow_release",
            Self::EscrowApprove(_) => "escrow_approve",
            Self::TransferToSavings(_) => "transfer_to_savings",
            Self::TransferFromSavings(_) => "transfer_from_savings",
            Self::CancelTransferFromSavings(_) => "cancel_transfer_from_savings",
            Self::CustomBinary(_) => "custom_binary",
            Self::DeclineVotingRights(_) => "decline_voting_rights",
            Self::DelegateVestingShares(_) => "delegate_vesting_shares",
            Self::WitnessSetProperties(_) => "witness_set_properties",
            Self::FillConvertRequest(_) => "fill_convert_request",
            Self::Interest(_) => "interest",
            Self::FillVestingWithdraw(_) => "fill_vesting_withdraw",
            Self::FillOrder(_) => "fill_order",
            Self::ShutdownWitness(_) => "shutdown_witness",
            Self::FillTransferFromSavings(_) => "fill_transfer_from_savings",
            Self::Hardfork(_) => "hardfork",
            Self::ReturnVestingDelegation(_) => "return_vesting_delegation",
            Self::ProducerReward(_) => "producer_reward",
        }
    }

    /// Virtual operations are emitted by the chain while applying blocks;
    /// they never validate, carry no authority and cannot be submitted.
    pub fn is_virtual(&self) -> bool {
        matches!(
            self,
            Self::FillConvertRequest(_)
                | Self::Interest(_)
                | Self::FillVestingWithdraw(_)
                | Self::FillOrder(_)
                | Self::ShutdownWitness(_)
                | Self::FillTransferFromSavings(_)
                | Self::Hardfork(_)
                | Self::ReturnVestingDelegation(_)
                | Self::ProducerReward(_)
        )
    }

    /// Market operations are rate-limited against the market bandwidth
    /// bucket at ten times their size.
    pub fn is_market(&self) -> bool {
        matches!(
            self,
            Self::Transfer(_)
                | Self::TransferToVesting(_)
                | Self::LimitOrderCreate(_)
                | Self::LimitOrderCreate2(_)
                | Self::LimitOrderCancel(_)
        )
    }

    /// Stateless structural validation.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            Self::Transfer(op) => op.validate(),
            Self::TransferToVesting(op) => op.validate(),
            Self::WithdrawVesting(op) => op.validate(),
            Self::LimitOrderCreate(op) => op.validate(),
            Self::LimitOrderCancel(op) => op.validate(),
            Self::FeedPublish(op) => op.validate(),
            Self::Convert(op) => op.validate(),
            Self::AccountCreate(op) => op.validate(),
            Self::AccountUpdate(op) => op.validate(),
            Self::WitnessUpdate(op) => op.validate(),
            Self::AccountWitnessVote(op) => op.validate(),
            Self::AccountWitnessProxy(op) => op.validate(),
            Self::Custom(op) => op.validate(),
            Self::CustomJson(op) => op.validate(),
            Self::SetWithdrawVestingRoute(op) => op.validate(),
            Self::LimitOrderCreate2(op) => op.validate(),
            Self::RequestAccountRecovery(op) => op.validate(),
            Self::RecoverAccount(op) => op.validate(),
            Self::ChangeRecoveryAccount(op) => op.validate(),
            Self::EscrowTransfer(op) => op.validate(),
            Self::EscrowDispute(op) => op.validate(),
            Self::EscrowRelease(op) => op.validate(),
            Self::EscrowApprove(op) => op.validate(),
            Self::TransferToSavings(op) => op.validate(),
            Self::TransferFromSavings(op) => op.validate(),
            Self::CancelTransferFromSavings(op) => op.validate(),
            Self::CustomBinary(op) => op.validate(),
            Self::DeclineVotingRights(op) => op.validate(),
            Self::DelegateVestingShares(op) => op.validate(),
            Self::WitnessSetProperties(op) => op.validate(),
            op => Err(ProtocolError::VirtualOperationInTransaction(op.name())),
        }
    }

    /// Collect the authority requirements this operation declares.
    ///
    /// Virtual operations declare nothing.
    pub fn required_authorities(&self, req: &mut RequiredAuthorities) {
        match self {
            Self::Transfer(op) => {
                // Liquid transfers want the active key; moving vesting
                // shares would be an owner-level action.
                if op.amount.symbol == Symbol::Amlv {
                    req.owner.insert(op.from.clone());
                } else {
                    req.active.insert(op.from.clone());
                }
            }
            Self::TransferToVesting(op) => {
                req.active.insert(op.from.clone());
            }
            Self::WithdrawVesting(op) => {
                req.active.insert(op.account.clone());
            }
            Self::LimitOrderCreate(op) => {
                req.active.insert(op.owner.clone());
            }
            Self::LimitOrderCancel(op) => {
                req.active.insert(op.owner.clone());
            }
            Self::FeedPublish(op) => {
                req.active.insert(op.publisher.clone());
            }
            Self::Convert(op) => {
                req.active.insert(op.owner.clone());
            }
            Self::AccountCreate(op) => {
                req.active.insert(op.creator.clone());
            }
            Self::AccountUpdate(op) => {
                // Touching the owner authority takes the owner key; any
                // other change is an active-level action.
                if op.owner.is_some() {
                    req.owner.insert(op.account.clone());
                } else {
                    req.active.insert(op.account.clone());
                }
            }
            Self::WitnessUpdate(op) => {
                req.active.insert(op.owner.clone());
            }
            Self::AccountWitnessVote(op) => {
                req.active.insert(op.account.clone());
            }
            Self::AccountWitnessProxy(op) => {
                req.active.insert(op.account.clone());
            }
            Self::Custom(op) => {
                for account in &op.required_auths {
                    req.active.insert(account.clone());
                }
            }
            Self::CustomJson(op) => {
                for account in &op.required_auths {
                    req.active.insert(account.clone());
                }
                for account in &op.required_posting_auths {
                    req.posting.insert(account.clone());
                }
            }
            Self::SetWithdrawVestingRoute(op) => {
                req.active.insert(op.from_account.clone());
            }
            Self::LimitOrderCreate2(op) => {
                req.active.insert(op.owner.clone());
            }
            Self::RequestAccountRecovery(op) => {
                req.active.insert(op.recovery_account.clone());
            }
            Self::RecoverAccount(op) => {
                req.other.push(op.new_owner_authority.clone());
                req.other.push(op.recent_owner_authority.clone());
            }
            Self::ChangeRecoveryAccount(op) => {
                req.owner.insert(op.account_to_recover.clone());
            }
            Self::EscrowTransfer(op) => {
                req.active.insert(op.from.clone());
            }
            Self::EscrowDispute(op) => {
                req.active.insert(op.who.clone());
            }
            Self::EscrowRelease(op) => {
                req.active.insert(op.who.clone());
            }
            Self::EscrowApprove(op) => {
                req.active.insert(op.who.clone());
            }
            Self::TransferToSavings(op) => {
                req.active.insert(op.from.clone());
            }
            Self::TransferFromSavings(op) => {
                req.active.insert(op.from.clone());
            }
            Self::CancelTransferFromSavings(op) => {
                req.active.insert(op.from.clone());
            }
            Self::CustomBinary(op) => {
                for account in &op.required_owner_auths {
                    req.owner.insert(account.clone());
                }
                for account in &op.required_active_auths {
                    req.active.insert(account.clone());
                }
                for account in &op.required_posting_auths {
                    req.posting.insert(account.clone());
                }
                for auth in &op.required_auths {
                    req.other.push(auth.clone());
                }
            }
            Self::DeclineVotingRights(op) => {
                req.owner.insert(op.account.clone());
            }
            Self::DelegateVestingShares(op) => {
                req.active.insert(op.delegator.clone());
            }
            Self::WitnessSetProperties(op) => {
                req.other.push(op.signing_authority());
            }
            Self::FillConvertRequest(_)
            | Self::Interest(_)
            | Self::FillVestingWithdraw(_)
            | Self::FillOrder(_)
            | Self::ShutdownWitness(_)
            | Self::FillTransferFromSavings(_)
            | Self::Hardfork(_)
            | Self::ReturnVestingDelegation(_)
            | Self::ProducerReward(_) => {}
        }
    }
}

// ── Shared validation helpers ────────────────────────────────────────────

pub(crate) fn check_account_name(name: &AccountName) -> Result<(), ProtocolError> {
    if AccountName::is_valid_name(name.as_str()) {
        Ok(())
    } else {
        Err(ProtocolError::validation(format!(
            "account name \"{name}\" is invalid"
        )))
    }
}

pub(crate) fn check_memo(memo: &str) -> Result<(), ProtocolError> {
    if memo.len() >= crate::config::MAX_MEMO_SIZE {
        return Err(ProtocolError::validation("memo is too large"));
    }
    Ok(())
}

pub(crate) fn check_json_metadata(json: &str) -> Result<(), ProtocolError> {
    if json.is_empty() {
        return Ok(());
    }
    serde_json::from_str::<serde_json::Value>(json)
        .map(|_| ())
        .map_err(|e| ProtocolError::validation(format!("metadata is not valid JSON: {e}")))
}
