//! Witness registration, property updates, price feeds, votes and
//! vote proxies.

use std::collections::BTreeSet;

use amalgam_protocol::config;
use amalgam_protocol::operations::{
    AccountWitnessProxyOp, AccountWitnessVoteOp, WitnessSetPropertiesOp, WitnessUpdateOp,
};
use amalgam_types::AccountName;

use crate::error::{ensure, ChainError};
use crate::objects::{WitnessObject, WitnessVoteObject};
use crate::state::{State, PROXY_VOTE_BUCKETS};

pub(super) fn witness_update(state: &mut State, op: &WitnessUpdateOp) -> Result<(), ChainError> {
    state.get_account(&op.owner)?;
    if state.witnesses.contains(&op.owner) {
        state.witnesses.modify_by_key(&op.owner, |w| {
            w.url = op.url.clone();
            w.signing_key = op.block_signing_key;
            w.props = op.props.clone();
        })?;
    } else {
        let created = state.head_block_time();
        state.witnesses.create(|id| {
            let mut witness = WitnessObject::new(id, op.owner.clone(), created);
            witness.url = op.url.clone();
            witness.signing_key = op.block_signing_key;
            witness.props = op.props.clone();
            witness
        })?;
    }
    Ok(())
}

/// Apply the decoded subset of properties. The declared key must be the
/// witness's current signing key, which is also what signed the
/// transaction.
pub(super) fn witness_set_properties(
    state: &mut State,
    op: &WitnessSetPropertiesOp,
) -> Result<(), ChainError> {
    let decoded = op.decode()?;
    let signing_key = state.get_witness(&op.owner)?.signing_key;
    ensure(decoded.key == signing_key, || {
        format!(
            "the declared key does not match \"{}\"'s signing key",
            op.owner
        )
    })?;

    let now = state.head_block_time();
    state.witnesses.modify_by_key(&op.owner, |w| {
        if let Some(fee) = decoded.account_creation_fee {
            w.props.account_creation_fee = fee;
        }
        if let Some(size) = decoded.maximum_block_size {
            w.props.maximum_block_size = size;
        }
        if let Some(rate) = decoded.abd_interest_rate {
            w.props.abd_interest_rate = rate;
        }
        if let Some(key) = decoded.new_signing_key {
            w.signing_key = key;
        }
        if let Some(rate) = decoded.abd_exchange_rate {
            w.abd_exchange_rate = Some(rate);
            w.last_abd_exchange_update = now;
        }
        if let Some(ref url) = decoded.url {
            w.url = url.clone();
        }
    })?;
    Ok(())
}

pub(super) fn account_witness_vote(
    state: &mut State,
    op: &AccountWitnessVoteOp,
) -> Result<(), ChainError> {
    let (has_proxy, can_vote, weight, voted_for) = {
        let account = state.get_account(&op.account)?;
        (
            account.has_proxy(),
            account.can_vote,
            account.witness_vote_weight(),
            account.witnesses_voted_for,
        )
    };
    ensure(!has_proxy, || {
        format!("\"{}\" votes through a proxy", op.account)
    })?;
    state.get_witness(&op.witness)?;

    let key = (op.account.clone(), op.witness.clone());
    if state.witness_votes.contains(&key) {
        ensure(!op.approve, || {
            format!("\"{}\" already approves \"{}\"", op.account, op.witness)
        })?;
        state.adjust_witness_vote(&op.witness, -weight)?;
        state.witness_votes.remove_by_key(&key)?;
        state
            .accounts
            .modify_by_key(&op.account, |a| a.witnesses_voted_for -= 1)?;
    } else {
        ensure(op.approve, || {
            format!("\"{}\" does not approve \"{}\"", op.account, op.witness)
        })?;
        ensure(can_vote, || {
            format!("\"{}\" has declined its voting rights", op.account)
        })?;
        ensure(
            u32::from(voted_for) < config::MAX_ACCOUNT_WITNESS_VOTES,
            || format!("\"{}\" already casts the maximum number of witness votes", op.account),
        )?;
        state.witness_votes.create(|id| WitnessVoteObject {
            id,
            account: op.account.clone(),
            witness: op.witness.clone(),
        })?;
        state.adjust_witness_vote(&op.witness, weight)?;
        state
            .accounts
            .modify_by_key(&op.account, |a| a.witnesses_voted_for += 1)?;
    }
    Ok(())
}

/// Redirect witness voting through another account, or clear the proxy.
///
/// The account's stake first leaves whatever it currently backs, then
/// re-enters through the new chain. Direct approvals are wiped when a
/// proxy is set.
pub(super) fn account_witness_proxy(
    state: &mut State,
    op: &AccountWitnessProxyOp,
) -> Result<(), ChainError> {
    let (current_proxy, can_vote, vesting, proxied) = {
        let account = state.get_account(&op.account)?;
        (
            account.proxy.clone(),
            account.can_vote,
            account.vesting_shares.amount,
            account.proxied_vsf_votes,
        )
    };
    ensure(current_proxy != op.proxy, || {
        format!("the proxy of \"{}\" is unchanged", op.account)
    })?;
    ensure(can_vote, || {
        format!("\"{}\" has declined its voting rights", op.account)
    })?;

    let mut delta = [0i64; PROXY_VOTE_BUCKETS];
    delta[0] = -vesting;
    for (i, p) in proxied.iter().enumerate() {
        delta[i + 1] = -p;
    }
    state.adjust_proxied_witness_vote_buckets(&op.account, &delta)?;

    if !op.proxy.is_empty() {
        let mut chain = BTreeSet::from([op.account.clone(), op.proxy.clone()]);
        let mut cursor = state.get_account(&op.proxy)?.proxy.clone();
        while !cursor.is_empty() {
            let next = state.get_account(&cursor)?.proxy.clone();
            ensure(chain.insert(cursor.clone()), || {
                format!("proxying through \"{cursor}\" would create a loop")
            })?;
            ensure(
                chain.len() <= config::MAX_PROXY_RECURSION_DEPTH as usize,
                || "the proxy chain is too long".to_string(),
            )?;
            cursor = next;
        }

        state.clear_witness_votes(&op.account)?;
        state
            .accounts
            .modify_by_key(&op.account, |a| a.proxy = op.proxy.clone())?;
        for d in delta.iter_mut() {
            *d = -*d;
        }
        state.adjust_proxied_witness_vote_buckets(&op.account, &delta)?;
    } else {
        // Clearing a proxy only detaches the stake; the account has no
        // direct approvals left to re-credit.
        state
            .accounts
            .modify_by_key(&op.account, |a| a.proxy = AccountName::empty())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::AccountObject;
    use amalgam_protocol::operations::ChainProperties;
    use amalgam_types::{Asset, Price, PublicKey, Symbol};
    use serde::Serialize;
    use std::collections::BTreeMap;

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn key(byte: u8) -> PublicKey {
        PublicKey([byte; 32])
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

    fn add_witness(state: &mut State, s: &str) -> AccountName {
        let owner = add_account(state, s);
        let created = state.head_block_time();
        state
            .witnesses
            .create(|id| {
                let mut w = WitnessObject::new(id, owner.clone(), created);
                w.signing_key = key(200);
                w
            })
            .unwrap();
        owner
    }

    fn vest(state: &mut State, who: &AccountName, shares: i64) {
        state
            .accounts
            .modify_by_key(who, |a| a.vesting_shares = Asset::new(shares, Symbol::Amlv))
            .unwrap();
    }

    fn encode<T: Serialize>(value: &T) -> Vec<u8> {
        bincode::serialize(value).unwrap()
    }

    #[test]
    fn test_update_registers_and_reregisters() {
        let mut state = State::new();
        let wit = add_account(&mut state, "wit");

        witness_update(
            &mut state,
            &WitnessUpdateOp {
                owner: wit.clone(),
                url: "https://wit.example".to_string(),
                block_signing_key: key(1),
                props: ChainProperties::default(),
                fee: Asset::new(0, Symbol::Aml),
            },
        )
        .unwrap();

        let w = state.get_witness(&wit).unwrap();
        assert_eq!(w.url, "https://wit.example");
        assert_eq!(w.signing_key, key(1));
        assert!(w.is_active());

        // Re-registering with a zero key withdraws from contention.
        witness_update(
            &mut state,
            &WitnessUpdateOp {
                owner: wit.clone(),
                url: "https://wit.example".to_string(),
                block_signing_key: PublicKey::ZERO,
                props: ChainProperties::default(),
                fee: Asset::new(0, Symbol::Aml),
            },
        )
        .unwrap();
        assert!(!state.get_witness(&wit).unwrap().is_active());
    }

    #[test]
    fn test_set_properties_needs_the_current_signing_key() {
        let mut state = State::new();
        let wit = add_witness(&mut state, "wit");

        let mut props = BTreeMap::new();
        props.insert("key".to_string(), encode(&key(7)));
        let err = witness_set_properties(
            &mut state,
            &WitnessSetPropertiesOp {
                owner: wit.clone(),
                props: props.clone(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));

        props.insert("key".to_string(), encode(&key(200)));
        props.insert("url".to_string(), encode(&"https://new.example".to_string()));
        props.insert("new_signing_key".to_string(), encode(&key(201)));
        witness_set_properties(
            &mut state,
            &WitnessSetPropertiesOp {
                owner: wit.clone(),
                props,
            },
        )
        .unwrap();

        let w = state.get_witness(&wit).unwrap();
        assert_eq!(w.url, "https://new.example");
        assert_eq!(w.signing_key, key(201));
    }

    #[test]
    fn test_set_properties_can_publish_a_feed() {
        let mut state = State::new();
        let wit = add_witness(&mut state, "wit");
        let rate = Price::new(
            Asset::new(400, Symbol::Abd),
            Asset::new(1_000, Symbol::Aml),
        );

        let mut props = BTreeMap::new();
        props.insert("key".to_string(), encode(&key(200)));
        props.insert("abd_exchange_rate".to_string(), encode(&rate));
        witness_set_properties(&mut state, &WitnessSetPropertiesOp { owner: wit.clone(), props })
            .unwrap();

        let w = state.get_witness(&wit).unwrap();
        assert_eq!(w.abd_exchange_rate, Some(rate));
        assert_eq!(w.last_abd_exchange_update, state.head_block_time());
    }

    #[test]
    fn test_vote_moves_stake_on_and_off_a_witness() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let wit = add_witness(&mut state, "wit");
        vest(&mut state, &alice, 5_000);

        account_witness_vote(
            &mut state,
            &AccountWitnessVoteOp {
                account: alice.clone(),
                witness: wit.clone(),
                approve: true,
            },
        )
        .unwrap();
        assert_eq!(state.get_witness(&wit).unwrap().votes, 5_000);
        assert_eq!(state.get_account(&alice).unwrap().witnesses_voted_for, 1);

        // Approving twice is an error.
        let err = account_witness_vote(
            &mut state,
            &AccountWitnessVoteOp {
                account: alice.clone(),
                witness: wit.clone(),
                approve: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));

        account_witness_vote(
            &mut state,
            &AccountWitnessVoteOp {
                account: alice.clone(),
                witness: wit.clone(),
                approve: false,
            },
        )
        .unwrap();
        assert_eq!(state.get_witness(&wit).unwrap().votes, 0);
        assert_eq!(state.get_account(&alice).unwrap().witnesses_voted_for, 0);
    }

    #[test]
    fn test_the_vote_cap_is_enforced() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        vest(&mut state, &alice, 100);
        for i in 0..config::MAX_ACCOUNT_WITNESS_VOTES {
            let wit = add_witness(&mut state, &format!("wit{i}"));
            account_witness_vote(
                &mut state,
                &AccountWitnessVoteOp {
                    account: alice.clone(),
                    witness: wit,
                    approve: true,
                },
            )
            .unwrap();
        }

        let extra = add_witness(&mut state, "extrawit");
        let err = account_witness_vote(
            &mut state,
            &AccountWitnessVoteOp {
                account: alice,
                witness: extra,
                approve: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_setting_a_proxy_moves_stake_and_clears_votes() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        let wit = add_witness(&mut state, "wit");
        vest(&mut state, &alice, 5_000);
        vest(&mut state, &bob, 1_000);

        // Bob votes directly; alice votes, then proxies to bob.
        account_witness_vote(
            &mut state,
            &AccountWitnessVoteOp {
                account: bob.clone(),
                witness: wit.clone(),
                approve: true,
            },
        )
        .unwrap();
        account_witness_vote(
            &mut state,
            &AccountWitnessVoteOp {
                account: alice.clone(),
                witness: wit.clone(),
                approve: true,
            },
        )
        .unwrap();
        assert_eq!(state.get_witness(&wit).unwrap().votes, 6_000);

        account_witness_proxy(
            &mut state,
            &AccountWitnessProxyOp {
                account: alice.clone(),
                proxy: bob.clone(),
            },
        )
        .unwrap();

        // Alice's direct approval is gone; her stake now rides bob's vote.
        assert_eq!(state.get_account(&alice).unwrap().witnesses_voted_for, 0);
        assert_eq!(state.get_account(&bob).unwrap().proxied_vsf_votes[0], 5_000);
        assert_eq!(state.get_witness(&wit).unwrap().votes, 6_000);

        // Clearing the proxy pulls the stake back off bob.
        account_witness_proxy(
            &mut state,
            &AccountWitnessProxyOp {
                account: alice.clone(),
                proxy: AccountName::empty(),
            },
        )
        .unwrap();
        assert_eq!(state.get_account(&bob).unwrap().proxied_vsf_votes[0], 0);
        assert_eq!(state.get_witness(&wit).unwrap().votes, 1_000);
    }

    #[test]
    fn test_proxy_loops_are_rejected() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        let carol = add_account(&mut state, "carol");

        let proxy = |state: &mut State, from: &AccountName, to: &AccountName| {
            account_witness_proxy(
                state,
                &AccountWitnessProxyOp {
                    account: from.clone(),
                    proxy: to.clone(),
                },
            )
        };

        proxy(&mut state, &alice, &bob).unwrap();
        proxy(&mut state, &bob, &carol).unwrap();
        let err = proxy(&mut state, &carol, &alice).unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_proxy_chains_are_depth_limited() {
        let mut state = State::new();
        let names: Vec<AccountName> = (0..5)
            .map(|i| add_account(&mut state, &format!("acct{i}")))
            .collect();

        // acct1 → acct2 → acct3 → acct4 sits at the depth limit.
        for i in (1..4).rev() {
            account_witness_proxy(
                &mut state,
                &AccountWitnessProxyOp {
                    account: names[i].clone(),
                    proxy: names[i + 1].clone(),
                },
            )
            .unwrap();
        }

        // Prepending one more hop pushes the walk past the limit.
        let err = account_witness_proxy(
            &mut state,
            &AccountWitnessProxyOp {
                account: names[0].clone(),
                proxy: names[1].clone(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }

    #[test]
    fn test_votes_through_a_proxy_are_rejected() {
        let mut state = State::new();
        let alice = add_account(&mut state, "alice");
        let bob = add_account(&mut state, "bob");
        let wit = add_witness(&mut state, "wit");

        account_witness_proxy(
            &mut state,
            &AccountWitnessProxyOp {
                account: alice.clone(),
                proxy: bob,
            },
        )
        .unwrap();

        let err = account_witness_vote(
            &mut state,
            &AccountWitnessVoteOp {
                account: alice,
                witness: wit,
                approve: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, ChainError::Precondition(_)));
    }
}
