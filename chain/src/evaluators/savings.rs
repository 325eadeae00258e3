//! Savings balances: deposits clear instantly, withdrawals take three
//! days, which gives a compromised account's owner time to recover it.

use amalgam_protocol::config;
use amalgam_protocol::operations::{
    CancelTransferFromSavingsOp, TransferFromSavingsOp, TransferToSavingsOp,
};

use crate::error::{ensure, ChainError};
use crate::objects::SavingsWithdrawObject;
use crate::state::State;

use super::{check_liquid, check_savings};

pub(super) fn transfer_to_savings(
    state: &mut State,
    op: &TransferToSavingsOp,
) -> Result<(), ChainError> {
    state.get_account(&op.to)?;
    check_liquid(state, &op.from, op.amount)?;
    state.adjust_balance(&op.from, op.amount.negated())?;
    state.adjust_savings_balance(&op.to, op.amount)?;
    Ok(())
}

pub(super) fn transfer_from_savings(
    state: &mut State,
    op: &TransferFromSavingsOp,
) -> Result<(), ChainError> {
    let open_requests = state.get_account(&op.from)?.savings_withdraw_requests;
    ensure(open_requests < config::SAVINGS_WITHDRAW_REQUEST_LIMIT, || {
        format!("\"{}\" has too many open savings withdrawals", op.from)
    })?;
    state.get_account(&op.to)?;
    check_savings(state, &op.from, op.amount)?;
    ensure(
        !state
            .savings_withdraws
            .contains(&(op.from.clone(), op.request_id)),
        || {
            format!(
                "\"{}\" already has a savings withdrawal {}",
                op.from, op.request_id
            )
        },
    )?;

    state.adjust_savings_balance(&op.from, op.amount.negated())?;
    let complete = state
        .head_block_time()
        .plus_secs(config::SAVINGS_WITHDRAW_DELAY_SECS);
    state.savings_withdraws.create(|id| SavingsWithdrawObject {
        id,
        from: op.from.clone(),
        to: op.to.clone(),
        memo: op.memo.clone(),
        request_id: op.request_id,
        amount: op.amount,
        complete,
    })?;
    state
        .accounts
        .modify_by_key(&op.from, |a| a.savings_withdraw_requests += 1)?;
    Ok(())
}

pub(super) fn cancel_transfer_from_savings(
    state: &mut State,
    op: &CancelTransferFromSavingsOp,
) -> Result<(), ChainError> {
    let amount = state.get_savings_withdraw(&op.from, op.request_id)?.amount;
    state.adjust_savings_balance(&op.from, amount)?;
    state
        .savings_withdraws
        .remove_by_key(&(op.from.clone(), op.request_id))?;
    state
        .accounts
        .modify_by_key(&op.from, |a| a.savings_withdraw_requests -= 1)?;
    Ok(())
}
