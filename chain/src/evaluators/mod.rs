//! Operation evaluators: the state-mutation half of every operation.
//!
//! By the time an evaluator runs, structural validation and authority
//! checks have already passed. Evaluators check state preconditions and
//! mutate; any error aborts the enclosing transaction and the driver
//! rolls its undo frame back.

mod account;
mod balances;
mod custom;
mod escrow;
mod market;
mod recovery;
mod savings;
mod witness;

use amalgam_protocol::Operation;
use amalgam_types::{AccountName, Asset};

use crate::error::ChainError;
use crate::state::State;

/// Fail with a structured error unless `account` holds at least
/// `required` in its liquid balance of the matching symbol.
fn check_liquid(state: &State, account: &AccountName, required: Asset) -> Result<(), ChainError> {
    let available = state.get_account(account)?.balance_of(required.symbol);
    if available.amount < required.amount {
        return Err(ChainError::InsufficientBalance {
            account: account.clone(),
            available,
            required,
        });
    }
    Ok(())
}

/// Savings-balance counterpart of [`check_liquid`].
fn check_savings(state: &State, account: &AccountName, required: Asset) -> Result<(), ChainError> {
    let available = state.get_account(account)?.savings_balance_of(required.symbol);
    if available.amount < required.amount {
        return Err(ChainError::InsufficientBalance {
            account: account.clone(),
            available,
            required,
        });
    }
    Ok(())
}

/// Apply one user operation to the state.
pub(crate) fn apply(state: &mut State, op: &Operation) -> Result<(), ChainError> {
    match op {
        Operation::Transfer(op) => balances::transfer(state, op),
        Operation::TransferToVesting(op) => balances::transfer_to_vesting(state, op),
        Operation::WithdrawVesting(op) => balances::withdraw_vesting(state, op),
        Operation::LimitOrderCreate(op) => market::limit_order_create(state, op),
        Operation::LimitOrderCancel(op) => market::limit_order_cancel(state, op),
        Operation::FeedPublish(op) => market::feed_publish(state, op),
        Operation::Convert(op) => market::convert(state, op),
        Operation::AccountCreate(op) => account::account_create(state, op),
        Operation::AccountUpdate(op) => account::account_update(state, op),
        Operation::WitnessUpdate(op) => witness::witness_update(state, op),
        Operation::AccountWitnessVote(op) => witness::account_witness_vote(state, op),
        Operation::AccountWitnessProxy(op) => witness::account_witness_proxy(state, op),
        Operation::Custom(op) => custom::custom(state, op),
        Operation::CustomJson(op) => custom::custom_json(state, op),
        Operation::SetWithdrawVestingRoute(op) => balances::set_withdraw_vesting_route(state, op),
        Operation::LimitOrderCreate2(op) => market::limit_order_create2(state, op),
        Operation::RequestAccountRecovery(op) => recovery::request_account_recovery(state, op),
        Operation::RecoverAccount(op) => recovery::recover_account(state, op),
        Operation::ChangeRecoveryAccount(op) => recovery::change_recovery_account(state, op),
        Operation::EscrowTransfer(op) => escrow::escrow_transfer(state, op),
        Operation::EscrowDispute(op) => escrow::escrow_dispute(state, op),
        Operation::EscrowRelease(op) => escrow::escrow_release(state, op),
        Operation::EscrowApprove(op) => escrow::escrow_approve(state, op),
        Operation::TransferToSavings(op) => savings::transfer_to_savings(state, op),
        Operation::TransferFromSavings(op) => savings::transfer_from_savings(state, op),
        Operation::CancelTransferFromSavings(op) => {
            savings::cancel_transfer_from_savings(state, op)
        }
        Operation::CustomBinary(op) => custom::custom_binary(state, op),
        Operation::DeclineVotingRights(op) => recovery::decline_voting_rights(state, op),
        Operation::DelegateVestingShares(op) => balances::delegate_vesting_shares(state, op),
        Operation::WitnessSetProperties(op) => witness::witness_set_properties(state, op),
        other => Err(ChainError::Precondition(format!(
            "virtual operation {} cannot be applied directly",
            other.name()
        ))),
    }
}
