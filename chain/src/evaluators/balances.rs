//! Transfers, vesting conversions, power-down schedules, withdrawal
//! routing and vesting delegation.

use std::ops::Bound;

use amalgam_protocol::config;
use amalgam_protocol::operations::{
    DelegateVestingSharesOp, SetWithdrawVestingRouteOp, TransferOp, TransferToVestingOp,
    WithdrawVestingOp,
};
use amalgam_store::ObjectId;
use amalgam_types::{AccountName, Asset, Symbol, Timestamp};

use crate::error::{ensure, ChainError};
use crate::objects::{
    VestingDelegationExpirationObject, VestingDelegationObject, WithdrawVestingRouteObject,
};
use crate::state::State;

use super::check_liquid;

pub(super) fn transfer(state: &mut State, op: &TransferOp) -> Result<(), ChainError> {
    check_liquid(state, &op.from, op.amount)?;
    state.get_account(&op.to)?;
    state.adjust_balance(&op.from, op.amount.negated())?;
    state.adjust_balance(&op.to, op.amount)?;
    Ok(())
}

/// Liquid AML becomes vesting shares for `to` (or `from` when `to` is
/// left empty).
pub(super) fn transfer_to_vesting(
    state: &mut State,
    op: &TransferToVestingOp,
) -> Result<(), ChainError> {
    let to = if op.to.is_empty() {
        op.from.clone()
    } else {
        op.to.clone()
    };
    state.get_account(&to)?;
    check_liquid(state, &op.from, op.amount)?;
    state.adjust_balance(&op.from, op.amount.negated())?;
    state.create_vesting(&to, op.amount)?;
    Ok(())
}

/// Start, restart or cancel a power-down schedule.
///
/// A non-zero amount schedules thirteen weekly payments; zero cancels
/// the active schedule. Delegated-away shares cannot be withdrawn.
pub(super) fn withdraw_vesting(state: &mut State, op: &WithdrawVestingOp) -> Result<(), ChainError> {
    let (owned, current_rate) = {
        let account = state.get_account(&op.account)?;
        (
            account.vesting_shares.checked_sub(account.delegated_vesting_shares)?,
            account.vesting_withdraw_rate,
        )
    };
    ensure(owned.amount >= op.vesting_shares.amount, || {
        format!("\"{}\" cannot power down more than it holds outright", op.account)
    })?;

    if op.vesting_shares.is_zero() {
        ensure(current_rate.amount != 0, || {
            format!("\"{}\" has no power-down to cancel", op.account)
        })?;
        state.accounts.modify_by_key(&op.account, |a| {
            a.vesting_withdraw_rate = Asset::zero(Symbol::Amlv);
            a.next_vesting_withdrawal = Timestamp::MAX;
            a.to_withdraw = 0;
            a.withdrawn = 0;
        })?;
        return Ok(());
    }

    let rate = Asset::new(
        (op.vesting_shares.amount / i64::from(config::VESTING_WITHDRAW_INTERVALS)).max(1),
        Symbol::Amlv,
    );
    ensure(rate != current_rate, || {
        format!("\"{}\" is already powering down at that rate", op.account)
    })?;
    let next = state
        .head_block_time()
        .plus_secs(config::VESTING_WITHDRAW_INTERVAL_SECS);
    state.accounts.modify_by_key(&op.account, |a| {
        a.vesting_withdraw_rate = rate;
        a.next_vesting_withdrawal = next;
        a.to_withdraw = op.vesting_shares.amount;
        a.withdrawn = 0;
    })?;
    Ok(())
}

pub(super) fn set_withdraw_vesting_route(
    state: &mut State,
    op: &SetWithdrawVestingRouteOp,
) -> Result<(), ChainError> {
    state.get_account(&op.from_account)?;
    state.get_account(&op.to_account)?;
    let key = (op.from_account.clone(), op.to_account.clone());
    let exists = state.withdraw_routes.contains(&key);

    if op.percent == 0 {
        ensure(exists, || {
            format!(
                "no withdrawal route from \"{}\" to \"{}\"",
                op.from_account, op.to_account
            )
        })?;
        state.withdraw_routes.remove_by_key(&key)?;
        state
            .accounts
            .modify_by_key(&op.from_account, |a| a.withdraw_routes -= 1)?;
    } else if !exists {
        let count = state.get_account(&op.from_account)?.withdraw_routes;
        ensure(count < config::MAX_WITHDRAW_ROUTES, || {
            format!("\"{}\" already has the maximum number of withdrawal routes", op.from_account)
        })?;
        state.withdraw_routes.create(|id| WithdrawVestingRouteObject {
            id,
            from: op.from_account.clone(),
            to: op.to_account.clone(),
            percent: op.percent,
            auto_vest: op.auto_vest,
        })?;
        state
            .accounts
            .modify_by_key(&op.from_account, |a| a.withdraw_routes += 1)?;
    } else {
        state.withdraw_routes.modify_by_key(&key, |r| {
            r.percent = op.percent;
            r.auto_vest = op.auto_vest;
        })?;
    }

    let total: u32 = state
        .withdraw_routes
        .range_ordered(
            Bound::Included(((op.from_account.clone(), AccountName::empty()), ObjectId(0))),
            Bound::Unbounded,
        )
        .take_while(|r| r.from == op.from_account)
        .map(|r| u32::from(r.percent))
        .sum();
    ensure(total <= u32::from(config::PERCENT_100), || {
        format!("withdrawal routes from \"{}\" would exceed 100%", op.from_account)
    })?;
    Ok(())
}

/// Create, raise, lower or remove a delegation of vesting shares.
///
/// Lowered shares do not return to the delegator immediately; they sit
/// in an expiration object until the return period passes, so influence
/// cannot be double-spent by delegating, undelegating and voting.
pub(super) fn delegate_vesting_shares(
    state: &mut State,
    op: &DelegateVestingSharesOp,
) -> Result<(), ChainError> {
    state.get_account(&op.delegatee)?;
    let available = {
        let d = state.get_account(&op.delegator)?;
        Asset::new(
            d.vesting_shares.amount - d.delegated_vesting_shares.amount
                - (d.to_withdraw - d.withdrawn),
            Symbol::Amlv,
        )
    };

    let fee = state.global.get().account_creation_fee;
    let price = state.global.get().vesting_share_price();
    let min_delegation = Asset::new(fee.amount * 10, Symbol::Aml).mul_price(&price)?;
    let min_update = fee.mul_price(&price)?;

    let key = (op.delegator.clone(), op.delegatee.clone());
    let current = state.vesting_delegations.find(&key).cloned();
    let now = state.head_block_time();

    match current {
        None => {
            ensure(!op.vesting_shares.is_zero(), || {
                format!(
                    "\"{}\" has no delegation to \"{}\" to remove",
                    op.delegator, op.delegatee
                )
            })?;
            ensure(op.vesting_shares.amount >= min_delegation.amount, || {
                format!("delegation is below the minimum of {min_delegation}")
            })?;
            if available.amount < op.vesting_shares.amount {
                return Err(ChainError::InsufficientBalance {
                    account: op.delegator.clone(),
                    available,
                    required: op.vesting_shares,
                });
            }
            state.vesting_delegations.create(|id| VestingDelegationObject {
                id,
                delegator: op.delegator.clone(),
                delegatee: op.delegatee.clone(),
                vesting_shares: op.vesting_shares,
                min_delegation_time: now,
            })?;
            state.accounts.modify_by_key(&op.delegator, |a| {
                a.delegated_vesting_shares.amount += op.vesting_shares.amount;
            })?;
            state.accounts.modify_by_key(&op.delegatee, |a| {
                a.received_vesting_shares.amount += op.vesting_shares.amount;
            })?;
        }
        Some(ref row) if op.vesting_shares.amount >= row.vesting_shares.amount => {
            let delta = op.vesting_shares.checked_sub(row.vesting_shares)?;
            ensure(delta.amount >= min_update.amount, || {
                format!("delegation increase is below the minimum step of {min_update}")
            })?;
            if available.amount < delta.amount {
                return Err(ChainError::InsufficientBalance {
                    account: op.delegator.clone(),
                    available,
                    required: delta,
                });
            }
            state
                .vesting_delegations
                .modify_by_key(&key, |d| d.vesting_shares = op.vesting_shares)?;
            state.accounts.modify_by_key(&op.delegator, |a| {
                a.delegated_vesting_shares.amount += delta.amount;
            })?;
            state.accounts.modify_by_key(&op.delegatee, |a| {
                a.received_vesting_shares.amount += delta.amount;
            })?;
        }
        Some(row) => {
            let delta = row.vesting_shares.checked_sub(op.vesting_shares)?;
            if !op.vesting_shares.is_zero() {
                ensure(delta.amount >= min_update.amount, || {
                    format!("delegation decrease is below the minimum step of {min_update}")
                })?;
                ensure(op.vesting_shares.amount >= min_delegation.amount, || {
                    format!("remaining delegation would fall below the minimum of {min_delegation}")
                })?;
            }
            let return_at = now
                .plus_secs(config::DELEGATION_RETURN_PERIOD_SECS)
                .max(row.min_delegation_time);
            state
                .delegation_expirations
                .create(|id| VestingDelegationExpirationObject {
                    id,
                    delegator: op.delegator.clone(),
                    vesting_shares: delta,
                    expiration: return_at,
                })?;
            state.accounts.modify_by_key(&op.delegatee, |a| {
                a.received_vesting_shares.amount -= delta.amount;
            })?;
            if op.vesting_shares.is_zero() {
                state.vesting_delegations.remove_by_key(&key)?;
            } else {
                state
                    .vesting_delegations
                    .modify_by_key(&key, |d| d.vesting_shares = op.vesting_shares)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::AccountObject;

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn add_account(state: &mut State, s: &str) -> AccountName {
        let n = name(s);
        let created = state.head_block_time();
        state
            .accounts
            .create(|id| AccountObject::new(id, n.clone(), created))
            .unwrap();
        n
    }

    fn fund(state: &mut State, who: &AccountName, amount: Asset) {
        state
            .accounts
            .modify_by_key(who, |a| match amount.symbol {
                Symbol::Aml => a.balance = amount,
                Symbol::Abd => a.abd_balance = amount,
                Symbol::Amlv => a.vesting_shares = amount,
            })
            .unwrap();
    }

    fn aml(amount: i64) -> Asset {
        Asset::new(amount, Symbol::Aml)
    }

    fn vests(amount: i64) -> Asset {
        Asset::new(amount, Symbol::Amlv)
    }

    #[test]
    fn test_transfer_moves_the_amount() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        fund(&mut state, &alice, aml(1_000));

        transfer(
            &mut state,
            &TransferOp {
                from: alice.clone(),
                to: bob.clone(),
                amount: aml(300),
                memo: String::new(),
            },
        )
        .unwrap();

        assert_eq!(state.get_account(&alice).unwrap().balance, aml(700));
        assert_eq!(state.get_account(&bob).unwrap().balance, aml(300));
    }

    #[test]
    fn test_transfer_rejects_overdraft() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        fund(&mut state, &alice, aml(100));

        let err = transfer(
            &mut state,
            &TransferOp {
                from: alice.clone(),
                to: bob,
                amount: aml(101),
                memo: String::new(),
            },
        )
        .unwrap_err();

        assert!(matches!(err, ChainError::InsufficientBalance { .. }));
        assert_eq!(state.get_account(&alice).unwrap().balance, aml(100));
    }

    #[test]
    fn test_transfer_requires_a_known_recipient() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        fund(&mut state, &alice, aml(100));

        let err = transfer(
            &mut state,
            &TransferOp {
                from: alice,
                to: name("ghost"),
                amount: aml(50),
                memo: String::new(),
            },
        )
        .unwrap_err();

        assert!(matches!(err, ChainError::UnknownAccount(_)));
    }

    #[test]
    fn test_vesting_a_transfer_grows_the_pool() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        fund(&mut state, &alice, aml(1_000));

        transfer_to_vesting(
            &mut state,
            &TransferToVestingOp {
                from: alice.clone(),
                to: bob.clone(),
                amount: aml(1_000),
                memo: String::new(),
            },
        )
        .unwrap();

        assert_eq!(state.get_account(&alice).unwrap().balance, aml(0));
        // First vest at the bootstrap price of a thousand shares per AML.
        assert_eq!(
            state.get_account(&bob).unwrap().vesting_shares,
            vests(1_000_000)
        );
        assert_eq!(state.global.get().total_vesting_fund_aml, aml(1_000));
    }

    #[test]
    fn test_empty_target_vests_to_the_sender() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        fund(&mut state, &alice, aml(500));

        transfer_to_vesting(
            &mut state,
            &TransferToVestingOp {
                from: alice.clone(),
                to: AccountName::empty(),
                amount: aml(500),
                memo: String::new(),
            },
        )
        .unwrap();

        assert_eq!(
            state.get_account(&alice).unwrap().vesting_shares,
            vests(500_000)
        );
    }

    #[test]
    fn test_power_down_schedules_thirteen_weeks() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        fund(&mut state, &alice, vests(13_000));

        withdraw_vesting(
            &mut state,
            &WithdrawVestingOp {
                account: alice.clone(),
                vesting_shares: vests(13_000),
            },
        )
        .unwrap();

        let a = state.get_account(&alice).unwrap();
        assert_eq!(a.vesting_withdraw_rate, vests(1_000));
        assert_eq!(a.to_withdraw, 13_000);
        assert_eq!(a.withdrawn, 0);
        assert_eq!(
            a.next_vesting_withdrawal,
            state
                .head_block_time()
                .plus_secs(config::VESTING_WITHDRAW_INTERVAL_SECS)
        );
    }

    #[test]
    fn test_power_down_cannot_touch_delegated_shares() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        fund(&mut state, &alice, vests(10_000));
        state
            .accounts
            .modify_by_key(&alice, |a| a.delegated_vesting_shares = vests(4_000))
            .unwrap();

        let err = withdraw_vesting(
            &mut state,
            &WithdrawVestingOp {
                account: alice,
                vesting_shares: vests(7_000),
            },
        )
        .unwrap_err();

        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_zero_cancels_an_active_power_down() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        fund(&mut state, &alice, vests(13_000));
        withdraw_vesting(
            &mut state,
            &WithdrawVestingOp {
                account: alice.clone(),
                vesting_shares: vests(13_000),
            },
        )
        .unwrap();

        withdraw_vesting(
            &mut state,
            &WithdrawVestingOp {
                account: alice.clone(),
                vesting_shares: vests(0),
            },
        )
        .unwrap();

        let a = state.get_account(&alice).unwrap();
        assert_eq!(a.vesting_withdraw_rate, vests(0));
        assert_eq!(a.next_vesting_withdrawal, Timestamp::MAX);
        assert_eq!(a.to_withdraw, 0);

        // Nothing left to cancel the second time.
        let err = withdraw_vesting(
            &mut state,
            &WithdrawVestingOp {
                account: alice,
                vesting_shares: vests(0),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_routes_are_created_updated_and_removed() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");

        let route = |percent| SetWithdrawVestingRouteOp {
            from_account: alice.clone(),
            to_account: bob.clone(),
            percent,
            auto_vest: false,
        };

        set_withdraw_vesting_route(&mut state, &route(3_000)).unwrap();
        assert_eq!(state.get_account(&alice).unwrap().withdraw_routes, 1);

        set_withdraw_vesting_route(&mut state, &route(5_000)).unwrap();
        let key = (alice.clone(), bob.clone());
        assert_eq!(state.withdraw_routes.find(&key).unwrap().percent, 5_000);
        assert_eq!(state.get_account(&alice).unwrap().withdraw_routes, 1);

        set_withdraw_vesting_route(&mut state, &route(0)).unwrap();
        assert!(state.withdraw_routes.find(&key).is_none());
        assert_eq!(state.get_account(&alice).unwrap().withdraw_routes, 0);
    }

    #[test]
    fn test_route_percents_cannot_exceed_the_whole() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        let carol = add_account(&mut state, "carol");

        set_withdraw_vesting_route(
            &mut state,
            &SetWithdrawVestingRouteOp {
                from_account: alice.clone(),
                to_account: bob,
                percent: 6_000,
                auto_vest: false,
            },
        )
        .unwrap();

        let err = set_withdraw_vesting_route(
            &mut state,
            &SetWithdrawVestingRouteOp {
                from_account: alice,
                to_account: carol,
                percent: 5_000,
                auto_vest: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_delegation_lifecycle() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        fund(&mut state, &alice, vests(10_000_000));

        let delegate = |state: &mut State, shares| {
            delegate_vesting_shares(
                state,
                &DelegateVestingSharesOp {
                    delegator: alice.clone(),
                    delegatee: bob.clone(),
                    vesting_shares: vests(shares),
                },
            )
        };

        // Create: the minimum is ten creation fees at the vesting price,
        // 100 AML * 10 * 1000 shares.
        delegate(&mut state, 2_000_000).unwrap();
        assert_eq!(
            state.get_account(&alice).unwrap().delegated_vesting_shares,
            vests(2_000_000)
        );
        assert_eq!(
            state.get_account(&bob).unwrap().received_vesting_shares,
            vests(2_000_000)
        );

        // Raise by more than one fee's worth of shares.
        delegate(&mut state, 2_500_000).unwrap();
        assert_eq!(
            state.get_account(&alice).unwrap().delegated_vesting_shares,
            vests(2_500_000)
        );

        // Lower: the difference goes into cooldown, the delegatee loses
        // it immediately, the delegator keeps it locked.
        delegate(&mut state, 1_000_000).unwrap();
        assert_eq!(
            state.get_account(&bob).unwrap().received_vesting_shares,
            vests(1_000_000)
        );
        assert_eq!(
            state.get_account(&alice).unwrap().delegated_vesting_shares,
            vests(2_500_000)
        );
        let pending = state.delegation_expirations.first_ordered().unwrap();
        assert_eq!(pending.vesting_shares, vests(1_500_000));
        assert_eq!(
            pending.expiration,
            state
                .head_block_time()
                .plus_secs(config::DELEGATION_RETURN_PERIOD_SECS)
        );

        // Remove entirely.
        delegate(&mut state, 0).unwrap();
        assert!(state
            .vesting_delegations
            .find(&(alice.clone(), bob.clone()))
            .is_none());
        assert_eq!(
            state.get_account(&bob).unwrap().received_vesting_shares,
            vests(0)
        );
    }

    #[test]
    fn test_delegation_below_the_minimum_is_rejected() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        fund(&mut state, &alice, vests(10_000_000));

        let err = delegate_vesting_shares(
            &mut state,
            &DelegateVestingSharesOp {
                delegator: alice,
                delegatee: bob,
                vesting_shares: vests(999_999),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_delegation_cannot_exceed_undelegated_stake() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        let carol = add_account(&mut state, "carol");
        fund(&mut state, &alice, vests(3_000_000));

        delegate_vesting_shares(
            &mut state,
            &DelegateVestingSharesOp {
                delegator: alice.clone(),
                delegatee: bob,
                vesting_shares: vests(2_000_000),
            },
        )
        .unwrap();

        let err = delegate_vesting_shares(
            &mut state,
            &DelegateVestingSharesOp {
                delegator: alice,
                delegatee: carol,
                vesting_shares: vests(2_000_000),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::InsufficientBalance { .. }));
    }
}
