//! Account creation and authority updates.

use amalgam_protocol::config;
use amalgam_protocol::operations::{AccountCreateOp, AccountUpdateOp};
use amalgam_protocol::Authority;
use amalgam_types::{PublicKey, Timestamp};

use crate::error::{ensure, ChainError};
use crate::objects::{AccountAuthorityObject, AccountObject};
use crate::state::State;

use super::check_liquid;

/// Every account named in an authority must already exist, otherwise
/// the authority could never be satisfied.
fn check_authority_accounts(state: &State, authority: &Authority) -> Result<(), ChainError> {
    for name in authority.account_auths.keys() {
        state.get_account(name)?;
    }
    Ok(())
}

pub(super) fn account_create(state: &mut State, op: &AccountCreateOp) -> Result<(), ChainError> {
    check_liquid(state, &op.creator, op.fee)?;
    let required = state.global.get().account_creation_fee;
    ensure(op.fee.amount >= required.amount, || {
        format!("creation fee {} is below the chain minimum of {required}", op.fee)
    })?;
    check_authority_accounts(state, &op.owner)?;
    check_authority_accounts(state, &op.active)?;
    check_authority_accounts(state, &op.posting)?;
    if state.accounts.contains(&op.new_account_name) {
        return Err(ChainError::AccountAlreadyExists(op.new_account_name.clone()));
    }

    state.adjust_balance(&op.creator, op.fee.negated())?;

    let now = state.head_block_time();
    state.accounts.create(|id| {
        let mut account = AccountObject::new(id, op.new_account_name.clone(), now);
        account.recovery_account = op.creator.clone();
        account.memo_key = op.memo_key;
        account.json_metadata = op.json_metadata.clone();
        account
    })?;
    state.account_authorities.create(|id| AccountAuthorityObject {
        id,
        account: op.new_account_name.clone(),
        owner: op.owner.clone(),
        active: op.active.clone(),
        posting: op.posting.clone(),
        last_owner_update: Timestamp::EPOCH,
    })?;

    // The fee seeds the account with enough vesting stake to transact.
    if op.fee.amount > 0 {
        state.create_vesting(&op.new_account_name, op.fee)?;
    }
    Ok(())
}

pub(super) fn account_update(state: &mut State, op: &AccountUpdateOp) -> Result<(), ChainError> {
    ensure(op.account != config::temp_account(), || {
        "the temp account cannot be updated".to_string()
    })?;
    state.get_account(&op.account)?;
    let now = state.head_block_time();

    if let Some(ref owner) = op.owner {
        let last = state.get_account_authority(&op.account)?.last_owner_update;
        ensure(now.secs_since(last) > config::OWNER_UPDATE_LIMIT_SECS, || {
            format!(
                "the owner authority of \"{}\" was already updated within the last hour",
                op.account
            )
        })?;
        check_authority_accounts(state, owner)?;
        state.update_owner_authority(&op.account, owner.clone())?;
    }
    if let Some(ref active) = op.active {
        check_authority_accounts(state, active)?;
    }
    if let Some(ref posting) = op.posting {
        check_authority_accounts(state, posting)?;
    }
    if op.active.is_some() || op.posting.is_some() {
        state.account_authorities.modify_by_key(&op.account, |auth| {
            if let Some(ref active) = op.active {
                auth.active = active.clone();
            }
            if let Some(ref posting) = op.posting {
                auth.posting = posting.clone();
            }
        })?;
    }

    state.accounts.modify_by_key(&op.account, |account| {
        if op.memo_key != PublicKey::ZERO {
            account.memo_key = op.memo_key;
        }
        if !op.json_metadata.is_empty() {
            account.json_metadata = op.json_metadata.clone();
        }
        account.last_account_update = now;
    })?;
    Ok(())
}
