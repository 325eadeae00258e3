//! Account recovery: a trusted partner countersigns owner-key changes
//! after a theft, and voting-rights declines.
//!
//! Recovery rests on the owner-authority history: the rightful owner
//! proves control of a recently valid owner key while the recovery
//! partner vouches for the new one. Either alone is insufficient.

use std::ops::Bound;

use amalgam_protocol::config;
use amalgam_protocol::operations::{
    ChangeRecoveryAccountOp, DeclineVotingRightsOp, RecoverAccountOp, RequestAccountRecoveryOp,
};
use amalgam_protocol::Authority;
use amalgam_store::ObjectId;
use amalgam_types::Timestamp;

use crate::error::{ensure, ChainError};
use crate::objects::{
    AccountRecoveryRequestObject, ChangeRecoveryAccountRequestObject,
    DeclineVotingRightsRequestObject,
};
use crate::state::State;

fn check_authority_accounts(state: &State, authority: &Authority) -> Result<(), ChainError> {
    for name in authority.account_auths.keys() {
        state.get_account(name)?;
    }
    Ok(())
}

/// Open, replace or cancel a recovery request on behalf of the account's
/// recovery partner. Accounts without a partner fall to the top-voted
/// witness.
pub(super) fn request_account_recovery(
    state: &mut State,
    op: &RequestAccountRecoveryOp,
) -> Result<(), ChainError> {
    let partner = state.get_account(&op.account_to_recover)?.recovery_account.clone();
    if !partner.is_empty() {
        ensure(partner == op.recovery_account, || {
            format!(
                "\"{}\" is not the recovery partner of \"{}\"",
                op.recovery_account, op.account_to_recover
            )
        })?;
    } else {
        let top = state.witnesses.first_ordered().ok_or_else(|| {
            ChainError::Precondition(
                "no witness exists to recover unpartnered accounts".to_string(),
            )
        })?;
        ensure(top.owner == op.recovery_account, || {
            format!(
                "only the top witness recovers accounts without a partner, and that is not \"{}\"",
                op.recovery_account
            )
        })?;
    }

    let now = state.head_block_time();
    let expires = now.plus_secs(config::ACCOUNT_RECOVERY_REQUEST_EXPIRATION_SECS);

    if !state.recovery_requests.contains(&op.account_to_recover) {
        ensure(!op.new_owner_authority.is_impossible(), || {
            "cannot recover to an impossible authority".to_string()
        })?;
        ensure(op.new_owner_authority.weight_threshold != 0, || {
            "cannot recover to an open authority".to_string()
        })?;
        check_authority_accounts(state, &op.new_owner_authority)?;
        state
            .recovery_requests
            .create(|id| AccountRecoveryRequestObject {
                id,
                account_to_recover: op.account_to_recover.clone(),
                new_owner_authority: op.new_owner_authority.clone(),
                expires,
            })?;
    } else if op.new_owner_authority.weight_threshold == 0 {
        // An open authority cancels the pending request.
        state.recovery_requests.remove_by_key(&op.account_to_recover)?;
    } else {
        ensure(!op.new_owner_authority.is_impossible(), || {
            "cannot recover to an impossible authority".to_string()
        })?;
        check_authority_accounts(state, &op.new_owner_authority)?;
        state
            .recovery_requests
            .modify_by_key(&op.account_to_recover, |req| {
                req.new_owner_authority = op.new_owner_authority.clone();
                req.expires = expires;
            })?;
    }
    Ok(())
}

/// Complete a pending recovery by proving a recently valid owner
/// authority alongside the requested new one.
pub(super) fn recover_account(state: &mut State, op: &RecoverAccountOp) -> Result<(), ChainError> {
    let last_recovery = state.get_account(&op.account_to_recover)?.last_account_recovery;
    let now = state.head_block_time();
    ensure(
        now.secs_since(last_recovery) > config::OWNER_UPDATE_LIMIT_SECS,
        || format!("\"{}\" was recovered within the last hour", op.account_to_recover),
    )?;

    let requested = state
        .recovery_requests
        .find(&op.account_to_recover)
        .ok_or_else(|| {
            ChainError::ObjectNotFound(format!(
                "recovery request for \"{}\"",
                op.account_to_recover
            ))
        })?;
    ensure(requested.new_owner_authority == op.new_owner_authority, || {
        format!(
            "the new owner authority does not match the request for \"{}\"",
            op.account_to_recover
        )
    })?;

    // The first history entry carrying the claimed authority decides;
    // a stale entry cannot be bypassed by a fresher duplicate.
    let matched = state
        .owner_authority_history
        .range_ordered(
            Bound::Included(((op.account_to_recover.clone(), Timestamp::EPOCH), ObjectId(0))),
            Bound::Unbounded,
        )
        .take_while(|h| h.account == op.account_to_recover)
        .find(|h| h.previous_owner_authority == op.recent_owner_authority)
        .map(|h| h.last_valid_time);
    let last_valid = matched.ok_or_else(|| {
        ChainError::Precondition(format!(
            "the claimed recent authority never belonged to \"{}\"",
            op.account_to_recover
        ))
    })?;
    ensure(
        last_valid.plus_secs(config::OWNER_AUTH_RECOVERY_PERIOD_SECS) >= now,
        || format!("the claimed authority of \"{}\" is too old", op.account_to_recover),
    )?;

    state.recovery_requests.remove_by_key(&op.account_to_recover)?;
    state.update_owner_authority(&op.account_to_recover, op.new_owner_authority.clone())?;
    state
        .accounts
        .modify_by_key(&op.account_to_recover, |a| a.last_account_recovery = now)?;
    Ok(())
}

/// Switch recovery partners after a thirty-day announcement period, so a
/// thief cannot instantly lock the rightful owner out of recovery.
pub(super) fn change_recovery_account(
    state: &mut State,
    op: &ChangeRecoveryAccountOp,
) -> Result<(), ChainError> {
    state.get_account(&op.new_recovery_account)?;
    let current = state.get_account(&op.account_to_recover)?.recovery_account.clone();

    let now = state.head_block_time();
    let effective_on = now.plus_secs(config::OWNER_AUTH_RECOVERY_PERIOD_SECS);

    if !state.recovery_change_requests.contains(&op.account_to_recover) {
        state
            .recovery_change_requests
            .create(|id| ChangeRecoveryAccountRequestObject {
                id,
                account_to_recover: op.account_to_recover.clone(),
                recovery_account: op.new_recovery_account.clone(),
                effective_on,
            })?;
    } else if current != op.new_recovery_account {
        state
            .recovery_change_requests
            .modify_by_key(&op.account_to_recover, |req| {
                req.recovery_account = op.new_recovery_account.clone();
                req.effective_on = effective_on;
            })?;
    } else {
        // Changing back to the current partner just drops the request.
        state
            .recovery_change_requests
            .remove_by_key(&op.account_to_recover)?;
    }
    Ok(())
}

/// Announce an irreversible surrender of voting rights, or cancel the
/// announcement while it is still pending.
pub(super) fn decline_voting_rights(
    state: &mut State,
    op: &DeclineVotingRightsOp,
) -> Result<(), ChainError> {
    state.get_account(&op.account)?;
    let pending = state.decline_voting_requests.contains(&op.account);

    if op.decline {
        ensure(!pending, || {
            format!("\"{}\" already announced a voting decline", op.account)
        })?;
        let effective_date = state
            .head_block_time()
            .plus_secs(config::OWNER_AUTH_RECOVERY_PERIOD_SECS);
        state
            .decline_voting_requests
            .create(|id| DeclineVotingRightsRequestObject {
                id,
                account: op.account.clone(),
                effective_date,
            })?;
    } else {
        ensure(pending, || {
            format!("\"{}\" has no voting decline to cancel", op.account)
        })?;
        state.decline_voting_requests.remove_by_key(&op.account)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{AccountAuthorityObject, AccountObject, WitnessObject};
    use amalgam_types::{AccountName, PublicKey};

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn key(byte: u8) -> PublicKey {
        PublicKey([byte; 32])
    }

    fn owner_auth(byte: u8) -> Authority {
        Authority::single_key(key(byte))
    }

    fn add_account(state: &mut State, s: &str) -> AccountName {
        let n = name(s);
        let created = state.head_block_time();
        state
            .accounts
            .create(|id| AccountObject::new(id, n.clone(), created))
            .unwrap();
        state
            .account_authorities
            .create(|id| AccountAuthorityObject {
                id,
                account: n.clone(),
                owner: owner_auth(1),
                active: owner_auth(2),
                posting: owner_auth(3),
                last_owner_update: Timestamp::EPOCH,
            })
            .unwrap();
        n
    }

    fn advance(state: &mut State, secs: u32) {
        state.global.modify(|g| g.time = g.time.plus_secs(secs));
    }

    fn request_op(account: &AccountName, partner: &AccountName, auth_byte: u8) -> RequestAccountRecoveryOp {
        RequestAccountRecoveryOp {
            recovery_account: partner.clone(),
            account_to_recover: account.clone(),
            new_owner_authority: owner_auth(auth_byte),
        }
    }

    #[test]
    fn test_only_the_partner_may_request() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        let mallory = add_account(&mut state, "mallory");
        state
            .accounts
            .modify_by_key(&alice, |a| a.recovery_account = bob.clone())
            .unwrap();

        let err =
            request_account_recovery(&mut state, &request_op(&alice, &mallory, 10)).unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));

        request_account_recovery(&mut state, &request_op(&alice, &bob, 10)).unwrap();
        let request = state.recovery_requests.find(&alice).unwrap();
        assert_eq!(request.new_owner_authority, owner_auth(10));
        assert_eq!(
            request.expires,
            state
                .head_block_time()
                .plus_secs(config::ACCOUNT_RECOVERY_REQUEST_EXPIRATION_SECS)
        );
    }

    #[test]
    fn test_unpartnered_accounts_fall_to_the_top_witness() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let big = add_account(&mut state, "bigwit");
        let small = add_account(&mut state, "smallwit");
        let created = state.head_block_time();
        for (owner, votes) in [(&big, 100), (&small, 10)] {
            let owner = owner.clone();
            state
                .witnesses
                .create(|id| {
                    let mut w = WitnessObject::new(id, owner.clone(), created);
                    w.votes = votes;
                    w
                })
                .unwrap();
        }

        let err =
            request_account_recovery(&mut state, &request_op(&alice, &small, 10)).unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
        request_account_recovery(&mut state, &request_op(&alice, &big, 10)).unwrap();
    }

    #[test]
    fn test_an_open_authority_cancels_the_request() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        state
            .accounts
            .modify_by_key(&alice, |a| a.recovery_account = bob.clone())
            .unwrap();

        request_account_recovery(&mut state, &request_op(&alice, &bob, 10)).unwrap();

        let mut cancel = request_op(&alice, &bob, 10);
        cancel.new_owner_authority = Authority::new(0);
        request_account_recovery(&mut state, &cancel).unwrap();
        assert!(state.recovery_requests.find(&alice).is_none());
    }

    #[test]
    fn test_impossible_authorities_are_rejected() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        state
            .accounts
            .modify_by_key(&alice, |a| a.recovery_account = bob.clone())
            .unwrap();

        let mut op = request_op(&alice, &bob, 10);
        op.new_owner_authority = Authority::impossible();
        let err = request_account_recovery(&mut state, &op).unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_recovery_needs_request_and_recent_authority() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        state
            .accounts
            .modify_by_key(&alice, |a| a.recovery_account = bob.clone())
            .unwrap();

        // The account's owner key rotates; the old owner authority is
        // archived and stays usable for recovery.
        state.update_owner_authority(&alice, owner_auth(40)).unwrap();

        request_account_recovery(&mut state, &request_op(&alice, &bob, 50)).unwrap();

        // Claiming an authority the account never had fails.
        let err = recover_account(
            &mut state,
            &RecoverAccountOp {
                account_to_recover: alice.clone(),
                new_owner_authority: owner_auth(50),
                recent_owner_authority: owner_auth(99),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));

        // The new authority must match the request.
        let err = recover_account(
            &mut state,
            &RecoverAccountOp {
                account_to_recover: alice.clone(),
                new_owner_authority: owner_auth(51),
                recent_owner_authority: owner_auth(1),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));

        recover_account(
            &mut state,
            &RecoverAccountOp {
                account_to_recover: alice.clone(),
                new_owner_authority: owner_auth(50),
                recent_owner_authority: owner_auth(1),
            },
        )
        .unwrap();

        let auth = state.get_account_authority(&alice).unwrap();
        assert_eq!(auth.owner, owner_auth(50));
        assert!(state.recovery_requests.find(&alice).is_none());
        assert_eq!(
            state.get_account(&alice).unwrap().last_account_recovery,
            state.head_block_time()
        );
    }

    #[test]
    fn test_recoveries_are_rate_limited() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        state
            .accounts
            .modify_by_key(&alice, |a| a.recovery_account = bob.clone())
            .unwrap();
        state.update_owner_authority(&alice, owner_auth(40)).unwrap();

        request_account_recovery(&mut state, &request_op(&alice, &bob, 50)).unwrap();
        recover_account(
            &mut state,
            &RecoverAccountOp {
                account_to_recover: alice.clone(),
                new_owner_authority: owner_auth(50),
                recent_owner_authority: owner_auth(1),
            },
        )
        .unwrap();

        // A second recovery in the same hour is rejected even with a
        // fresh request.
        request_account_recovery(&mut state, &request_op(&alice, &bob, 60)).unwrap();
        let err = recover_account(
            &mut state,
            &RecoverAccountOp {
                account_to_recover: alice.clone(),
                new_owner_authority: owner_auth(60),
                recent_owner_authority: owner_auth(40),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_stale_history_cannot_recover() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        state
            .accounts
            .modify_by_key(&alice, |a| a.recovery_account = bob.clone())
            .unwrap();
        state.update_owner_authority(&alice, owner_auth(40)).unwrap();

        advance(&mut state, config::OWNER_AUTH_RECOVERY_PERIOD_SECS + 1);
        request_account_recovery(&mut state, &request_op(&alice, &bob, 50)).unwrap();

        let err = recover_account(
            &mut state,
            &RecoverAccountOp {
                account_to_recover: alice,
                new_owner_authority: owner_auth(50),
                recent_owner_authority: owner_auth(1),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_partner_changes_wait_thirty_days() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        let carol = add_account(&mut state, "carol");
        state
            .accounts
            .modify_by_key(&alice, |a| a.recovery_account = bob.clone())
            .unwrap();

        change_recovery_account(
            &mut state,
            &ChangeRecoveryAccountOp {
                account_to_recover: alice.clone(),
                new_recovery_account: carol.clone(),
            },
        )
        .unwrap();
        let request = state.recovery_change_requests.find(&alice).unwrap();
        assert_eq!(request.recovery_account, carol);
        assert_eq!(
            request.effective_on,
            state
                .head_block_time()
                .plus_secs(config::OWNER_AUTH_RECOVERY_PERIOD_SECS)
        );

        // Changing back to the current partner withdraws the request.
        change_recovery_account(
            &mut state,
            &ChangeRecoveryAccountOp {
                account_to_recover: alice.clone(),
                new_recovery_account: bob,
            },
        )
        .unwrap();
        assert!(state.recovery_change_requests.find(&alice).is_none());
    }

    #[test]
    fn test_decline_lifecycle() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");

        decline_voting_rights(
            &mut state,
            &DeclineVotingRightsOp {
                account: alice.clone(),
                decline: true,
            },
        )
        .unwrap();
        let request = state.decline_voting_requests.find(&alice).unwrap();
        assert_eq!(
            request.effective_date,
            state
                .head_block_time()
                .plus_secs(config::OWNER_AUTH_RECOVERY_PERIOD_SECS)
        );

        // Duplicate announcements are rejected.
        let err = decline_voting_rights(
            &mut state,
            &DeclineVotingRightsOp {
                account: alice.clone(),
                decline: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));

        decline_voting_rights(
            &mut state,
            &DeclineVotingRightsOp {
                account: alice.clone(),
                decline: false,
            },
        )
        .unwrap();
        assert!(state.decline_voting_requests.find(&alice).is_none());

        // Nothing left to cancel.
        let err = decline_voting_rights(
            &mut state,
            &DeclineVotingRightsOp {
                account: alice,
                decline: false,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }
}
