//! The escrow lifecycle: open, ratify, dispute, release.

use amalgam_protocol::operations::{
    EscrowApproveOp, EscrowDisputeOp, EscrowReleaseOp, EscrowTransferOp,
};
use amalgam_types::Symbol;

use crate::error::{ensure, ChainError};
use crate::objects::EscrowObject;
use crate::state::State;

use super::check_liquid;

/// Lock the escrowed amounts plus the agent's fee. The fee rides along
/// in `pending_fee` until ratification settles its fate.
pub(super) fn escrow_transfer(state: &mut State, op: &EscrowTransferOp) -> Result<(), ChainError> {
    state.get_account(&op.to)?;
    state.get_account(&op.agent)?;
    let now = state.head_block_time();
    ensure(op.ratification_deadline > now, || {
        format!("escrow {} ratification deadline is already past", op.escrow_id)
    })?;
    ensure(op.escrow_expiration > now, || {
        format!("escrow {} expiration is already past", op.escrow_id)
    })?;

    let mut aml_total = op.aml_amount;
    let mut abd_total = op.abd_amount;
    if op.fee.symbol == Symbol::Aml {
        aml_total = aml_total.checked_add(op.fee)?;
    } else {
        abd_total = abd_total.checked_add(op.fee)?;
    }
    check_liquid(state, &op.from, aml_total)?;
    check_liquid(state, &op.from, abd_total)?;
    ensure(
        !state.escrows.contains(&(op.from.clone(), op.escrow_id)),
        || format!("\"{}\" already has an escrow {}", op.from, op.escrow_id),
    )?;

    state.adjust_balance(&op.from, aml_total.negated())?;
    state.adjust_balance(&op.from, abd_total.negated())?;

    state.escrows.create(|id| EscrowObject {
        id,
        escrow_id: op.escrow_id,
        from: op.from.clone(),
        to: op.to.clone(),
        agent: op.agent.clone(),
        ratification_deadline: op.ratification_deadline,
        escrow_expiration: op.escrow_expiration,
        abd_balance: op.abd_amount,
        aml_balance: op.aml_amount,
        pending_fee: op.fee,
        to_approved: false,
        agent_approved: false,
        disputed: false,
    })?;
    Ok(())
}

/// One ratification per party. A single refusal cancels the escrow and
/// refunds everything; the second approval releases the fee to the
/// agent.
pub(super) fn escrow_approve(state: &mut State, op: &EscrowApproveOp) -> Result<(), ChainError> {
    let escrow = state.get_escrow(&op.from, op.escrow_id)?.clone();
    ensure(escrow.to == op.to, || {
        format!("escrow {} names a different receiver", op.escrow_id)
    })?;
    ensure(escrow.agent == op.agent, || {
        format!("escrow {} names a different agent", op.escrow_id)
    })?;
    ensure(
        escrow.ratification_deadline >= state.head_block_time(),
        || format!("the ratification deadline of escrow {} has passed", op.escrow_id),
    )?;

    let already_approved = if op.who == escrow.to {
        escrow.to_approved
    } else {
        escrow.agent_approved
    };
    ensure(!already_approved, || {
        format!("\"{}\" already ratified escrow {}", op.who, op.escrow_id)
    })?;

    let key = (op.from.clone(), op.escrow_id);
    if !op.approve {
        state.adjust_balance(&escrow.from, escrow.aml_balance)?;
        state.adjust_balance(&escrow.from, escrow.abd_balance)?;
        state.adjust_balance(&escrow.from, escrow.pending_fee)?;
        state.escrows.remove_by_key(&key)?;
        return Ok(());
    }

    let fully_approved = {
        let row = state.escrows.modify_by_key(&key, |esc| {
            if op.who == esc.to {
                esc.to_approved = true;
            } else {
                esc.agent_approved = true;
            }
        })?;
        row.is_approved()
    };
    if fully_approved {
        state.adjust_balance(&escrow.agent, escrow.pending_fee)?;
        state
            .escrows
            .modify_by_key(&key, |esc| esc.pending_fee.amount = 0)?;
    }
    Ok(())
}

pub(super) fn escrow_dispute(state: &mut State, op: &EscrowDisputeOp) -> Result<(), ChainError> {
    let escrow = state.get_escrow(&op.from, op.escrow_id)?;
    ensure(escrow.to == op.to, || {
        format!("escrow {} names a different receiver", op.escrow_id)
    })?;
    ensure(escrow.agent == op.agent, || {
        format!("escrow {} names a different agent", op.escrow_id)
    })?;
    ensure(
        state.head_block_time() < escrow.escrow_expiration,
        || format!("escrow {} has already expired", op.escrow_id),
    )?;
    ensure(escrow.is_approved(), || {
        format!("escrow {} is not ratified yet", op.escrow_id)
    })?;
    ensure(!escrow.disputed, || {
        format!("escrow {} is already disputed", op.escrow_id)
    })?;

    state
        .escrows
        .modify_by_key(&(op.from.clone(), op.escrow_id), |esc| esc.disputed = true)?;
    Ok(())
}

/// Move part or all of the escrowed funds to `from` or `to`.
///
/// Undisputed and unexpired, each party can only pay the other; once
/// expired either party can also pull funds back to itself. Under
/// dispute only the agent moves funds, in either direction.
pub(super) fn escrow_release(state: &mut State, op: &EscrowReleaseOp) -> Result<(), ChainError> {
    let escrow = state.get_escrow(&op.from, op.escrow_id)?.clone();
    ensure(escrow.aml_balance.amount >= op.aml_amount.amount, || {
        format!("escrow {} holds less AML than the release asks for", op.escrow_id)
    })?;
    ensure(escrow.abd_balance.amount >= op.abd_amount.amount, || {
        format!("escrow {} holds less ABD than the release asks for", op.escrow_id)
    })?;
    ensure(escrow.to == op.to, || {
        format!("escrow {} names a different receiver", op.escrow_id)
    })?;
    ensure(escrow.agent == op.agent, || {
        format!("escrow {} names a different agent", op.escrow_id)
    })?;
    ensure(op.receiver == escrow.from || op.receiver == escrow.to, || {
        format!("escrow {} funds can only go to its sender or receiver", op.escrow_id)
    })?;
    ensure(escrow.is_approved(), || {
        format!("escrow {} is not ratified yet", op.escrow_id)
    })?;

    if escrow.disputed {
        ensure(op.who == escrow.agent, || {
            format!("only the agent releases the disputed escrow {}", op.escrow_id)
        })?;
    } else {
        ensure(op.who == escrow.from || op.who == escrow.to, || {
            format!(
                "only the sender or the receiver releases escrow {}",
                op.escrow_id
            )
        })?;
        if escrow.escrow_expiration > state.head_block_time() {
            // Before expiration each party can only pay the other side.
            if op.who == escrow.from {
                ensure(op.receiver == escrow.to, || {
                    format!("the sender of escrow {} must release to the receiver", op.escrow_id)
                })?;
            } else {
                ensure(op.receiver == escrow.from, || {
                    format!("the receiver of escrow {} must release to the sender", op.escrow_id)
                })?;
            }
        }
    }

    state.adjust_balance(&op.receiver, op.aml_amount)?;
    state.adjust_balance(&op.receiver, op.abd_amount)?;

    let key = (op.from.clone(), op.escrow_id);
    let drained = {
        let row = state.escrows.modify_by_key(&key, |esc| {
            esc.aml_balance.amount -= op.aml_amount.amount;
            esc.abd_balance.amount -= op.abd_amount.amount;
        })?;
        row.aml_balance.is_zero() && row.abd_balance.is_zero()
    };
    if drained {
        state.escrows.remove_by_key(&key)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::AccountObject;
    use amalgam_types::{AccountName, Asset, Timestamp};

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn aml(amount: i64) -> Asset {
        Asset::new(amount, Symbol::Aml)
    }

    fn abd(amount: i64) -> Asset {
        Asset::new(amount, Symbol::Abd)
    }

    fn make_state() -> (State, AccountName, AccountName, AccountName) {
        let mut state = State::new();
        for s in ["alice", "bobby", "judge"] {
            let created = state.head_block_time();
            state
                .accounts
                .create(|id| AccountObject::new(id, name(s), created))
                .unwrap();
        }
        state
            .accounts
            .modify_by_key(&name("alice"), |a| {
                a.balance = aml(10_000);
                a.abd_balance = abd(1_000);
            })
            .unwrap();
        (state, name("alice"), name("bobby"), name("judge"))
    }

    fn transfer_op(state: &State, from: &AccountName) -> EscrowTransferOp {
        let now = state.head_block_time();
        EscrowTransferOp {
            from: from.clone(),
            to: name("bobby"),
            agent: name("judge"),
            escrow_id: 7,
            abd_amount: abd(0),
            aml_amount: aml(5_000),
            fee: aml(100),
            ratification_deadline: now.plus_secs(100),
            escrow_expiration: now.plus_secs(1_000),
            json_meta: String::new(),
        }
    }

    fn approve_op(who: &str, approve: bool) -> EscrowApproveOp {
        EscrowApproveOp {
            from: name("alice"),
            to: name("bobby"),
            agent: name("judge"),
            who: name(who),
            escrow_id: 7,
            approve,
        }
    }

    fn release_op(who: &str, receiver: &str, amount: Asset) -> EscrowReleaseOp {
        EscrowReleaseOp {
            from: name("alice"),
            to: name("bobby"),
            agent: name("judge"),
            who: name(who),
            receiver: name(receiver),
            escrow_id: 7,
            abd_amount: abd(0),
            aml_amount: amount,
        }
    }

    fn ratify(state: &mut State) {
        escrow_approve(state, &approve_op("bobby", true)).unwrap();
        escrow_approve(state, &approve_op("judge", true)).unwrap();
    }

    fn advance(state: &mut State, secs: u32) {
        state.global.modify(|g| g.time = g.time.plus_secs(secs));
    }

    #[test]
    fn test_transfer_locks_amounts_and_fee() {
        let (mut state, alice, ..) = make_state();
        let op = transfer_op(&state, &alice);
        escrow_transfer(&mut state, &op).unwrap();

        assert_eq!(state.get_account(&alice).unwrap().balance, aml(4_900));
        let escrow = state.get_escrow(&alice, 7).unwrap();
        assert_eq!(escrow.aml_balance, aml(5_000));
        assert_eq!(escrow.pending_fee, aml(100));
        assert!(!escrow.to_approved && !escrow.agent_approved && !escrow.disputed);
    }

    #[test]
    fn test_escrow_ids_cannot_collide() {
        let (mut state, alice, ..) = make_state();
        // Enough liquid AML for two escrows, so only the id can fail.
        state
            .accounts
            .modify_by_key(&alice, |a| a.balance = aml(20_000))
            .unwrap();
        let op = transfer_op(&state, &alice);
        escrow_transfer(&mut state, &op).unwrap();
        let err = escrow_transfer(&mut state, &op).unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_transfer_needs_both_balances() {
        let (mut state, alice, ..) = make_state();
        let mut op = transfer_op(&state, &alice);
        op.abd_amount = abd(2_000);
        let err = escrow_transfer(&mut state, &op).unwrap_err();
        assert!(matches!(err, ChainError::InsufficientBalance { .. }));
        assert_eq!(state.get_account(&alice).unwrap().balance, aml(10_000));
    }

    #[test]
    fn test_full_ratification_pays_the_agent() {
        let (mut state, alice, _, judge) = make_state();
        let op = transfer_op(&state, &alice);
        escrow_transfer(&mut state, &op).unwrap();

        escrow_approve(&mut state, &approve_op("bobby", true)).unwrap();
        assert_eq!(state.get_account(&judge).unwrap().balance, aml(0));

        escrow_approve(&mut state, &approve_op("judge", true)).unwrap();
        assert_eq!(state.get_account(&judge).unwrap().balance, aml(100));
        let escrow = state.get_escrow(&alice, 7).unwrap();
        assert!(escrow.is_approved());
        assert!(escrow.pending_fee.is_zero());
        assert_eq!(escrow.pending_fee.symbol, Symbol::Aml);
    }

    #[test]
    fn test_one_refusal_cancels_and_refunds() {
        let (mut state, alice, ..) = make_state();
        let op = transfer_op(&state, &alice);
        escrow_transfer(&mut state, &op).unwrap();
        escrow_approve(&mut state, &approve_op("bobby", true)).unwrap();

        escrow_approve(&mut state, &approve_op("judge", false)).unwrap();

        assert!(state.get_escrow(&alice, 7).is_err());
        assert_eq!(state.get_account(&alice).unwrap().balance, aml(10_000));
    }

    #[test]
    fn test_a_party_cannot_ratify_twice() {
        let (mut state, alice, ..) = make_state();
        let op = transfer_op(&state, &alice);
        escrow_transfer(&mut state, &op).unwrap();
        escrow_approve(&mut state, &approve_op("bobby", true)).unwrap();
        let err = escrow_approve(&mut state, &approve_op("bobby", true)).unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_ratification_closes_at_the_deadline() {
        let (mut state, alice, ..) = make_state();
        let op = transfer_op(&state, &alice);
        escrow_transfer(&mut state, &op).unwrap();
        advance(&mut state, 101);
        let err = escrow_approve(&mut state, &approve_op("bobby", true)).unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_dispute_requires_ratification() {
        let (mut state, alice, ..) = make_state();
        let op = transfer_op(&state, &alice);
        escrow_transfer(&mut state, &op).unwrap();

        let dispute = EscrowDisputeOp {
            from: alice.clone(),
            to: name("bobby"),
            agent: name("judge"),
            who: name("bobby"),
            escrow_id: 7,
        };
        let err = escrow_dispute(&mut state, &dispute).unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));

        ratify(&mut state);
        escrow_dispute(&mut state, &dispute).unwrap();
        assert!(state.get_escrow(&alice, 7).unwrap().disputed);

        // Raising it twice is an error.
        let err = escrow_dispute(&mut state, &dispute).unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_release_before_expiration_pays_the_other_side() {
        let (mut state, alice, bobby, _) = make_state();
        let op = transfer_op(&state, &alice);
        escrow_transfer(&mut state, &op).unwrap();
        ratify(&mut state);

        // The sender cannot pull funds back to itself before expiration.
        let err =
            escrow_release(&mut state, &release_op("alice", "alice", aml(1_000))).unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));

        escrow_release(&mut state, &release_op("alice", "bobby", aml(1_000))).unwrap();
        assert_eq!(state.get_account(&bobby).unwrap().balance, aml(1_000));
        assert_eq!(state.get_escrow(&alice, 7).unwrap().aml_balance, aml(4_000));

        escrow_release(&mut state, &release_op("bobby", "alice", aml(4_000))).unwrap();
        // Fully drained escrows disappear.
        assert!(state.get_escrow(&alice, 7).is_err());
    }

    #[test]
    fn test_release_needs_ratification() {
        let (mut state, alice, ..) = make_state();
        let op = transfer_op(&state, &alice);
        escrow_transfer(&mut state, &op).unwrap();
        let err =
            escrow_release(&mut state, &release_op("alice", "bobby", aml(1_000))).unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_disputed_release_is_the_agents_call() {
        let (mut state, alice, bobby, _) = make_state();
        let op = transfer_op(&state, &alice);
        escrow_transfer(&mut state, &op).unwrap();
        ratify(&mut state);
        escrow_dispute(
            &mut state,
            &EscrowDisputeOp {
                from: alice.clone(),
                to: bobby.clone(),
                agent: name("judge"),
                who: name("alice"),
                escrow_id: 7,
            },
        )
        .unwrap();

        let err =
            escrow_release(&mut state, &release_op("alice", "bobby", aml(1_000))).unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));

        // The agent can send either way, including back to the sender.
        escrow_release(&mut state, &release_op("judge", "alice", aml(2_000))).unwrap();
        escrow_release(&mut state, &release_op("judge", "bobby", aml(3_000))).unwrap();
        assert_eq!(state.get_account(&alice).unwrap().balance, aml(6_900));
        assert_eq!(state.get_account(&bobby).unwrap().balance, aml(3_000));
        assert!(state.get_escrow(&alice, 7).is_err());
    }

    #[test]
    fn test_expired_release_can_go_either_way() {
        let (mut state, alice, ..) = make_state();
        let op = transfer_op(&state, &alice);
        escrow_transfer(&mut state, &op).unwrap();
        ratify(&mut state);
        advance(&mut state, 1_001);

        // After expiration the sender can reclaim directly.
        escrow_release(&mut state, &release_op("alice", "alice", aml(5_000))).unwrap();
        assert_eq!(state.get_account(&alice).unwrap().balance, aml(9_900));
        assert!(state.get_escrow(&alice, 7).is_err());
    }

    #[test]
    fn test_release_cannot_exceed_the_escrow_balance() {
        let (mut state, alice, ..) = make_state();
        let op = transfer_op(&state, &alice);
        escrow_transfer(&mut state, &op).unwrap();
        ratify(&mut state);

        let err =
            escrow_release(&mut state, &release_op("alice", "bobby", aml(5_001))).unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }
}
