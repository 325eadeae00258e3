//! Property suites for the signature-checking machinery.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use amalgam_protocol::config::MAX_SIG_CHECK_DEPTH;
use amalgam_protocol::{
    verify_authority, Authority, AuthorityLevel, AuthorityProvider, ProtocolError,
    RequiredAuthorities, SignState,
};
use amalgam_types::{AccountName, PublicKey};

fn name(s: &str) -> AccountName {
    AccountName::new(s).unwrap()
}

fn key(byte: u8) -> PublicKey {
    PublicKey([byte; 32])
}

#[derive(Default)]
struct MockProvider {
    docs: BTreeMap<(AccountName, AuthorityLevel), Authority>,
}

impl MockProvider {
    fn insert(&mut self, account: &str, level: AuthorityLevel, auth: Authority) {
        self.docs.insert((name(account), level), auth);
    }
}

impl AuthorityProvider for MockProvider {
    fn authority(
        &self,
        account: &AccountName,
        level: AuthorityLevel,
    ) -> Result<Authority, ProtocolError> {
        self.docs
            .get(&(account.clone(), level))
            .cloned()
            .ok_or_else(|| ProtocolError::UnknownAuthorityAccount(account.clone()))
    }
}

proptest! {
    /// A flat key authority is satisfied exactly when the signing
    /// members' combined weight reaches the threshold.
    #[test]
    fn flat_authority_follows_the_weight_sum(
        members in prop::collection::vec((1u16..10, any::<bool>()), 1..8),
        threshold in 1u32..30,
    ) {
        let provider = MockProvider::default();
        let mut auth = Authority::new(threshold);
        let mut signers = BTreeSet::new();
        let mut signed_weight: u64 = 0;
        for (i, (weight, signs)) in members.iter().enumerate() {
            let k = key(0x10 + i as u8);
            auth.add_key(k, *weight);
            if *signs {
                signers.insert(k);
                signed_weight += u64::from(*weight);
            }
        }
        let mut state = SignState::new(&signers, &provider);
        let satisfied = state.check_authority(&auth, 0, AuthorityLevel::Active).unwrap();
        prop_assert_eq!(satisfied, signed_weight >= u64::from(threshold));
    }

    /// Adding signatures never turns a satisfied authority unsatisfied.
    #[test]
    fn extra_signatures_never_unsatisfy(
        members in prop::collection::vec((1u16..10, 0u8..3), 1..8),
        threshold in 1u32..30,
    ) {
        // 0 = silent, 1 = signs in both sets, 2 = signs only in the larger.
        let provider = MockProvider::default();
        let mut auth = Authority::new(threshold);
        let mut small = BTreeSet::new();
        let mut large = BTreeSet::new();
        for (i, (weight, role)) in members.iter().enumerate() {
            let k = key(0x10 + i as u8);
            auth.add_key(k, *weight);
            if *role >= 1 {
                large.insert(k);
            }
            if *role == 1 {
                small.insert(k);
            }
        }
        let small_ok = SignState::new(&small, &provider)
            .check_authority(&auth, 0, AuthorityLevel::Active)
            .unwrap();
        let large_ok = SignState::new(&large, &provider)
            .check_authority(&auth, 0, AuthorityLevel::Active)
            .unwrap();
        prop_assert!(!small_ok || large_ok);
    }

    /// When the threshold needs every member's weight, the full key set
    /// verifies and dropping any single key fails.
    #[test]
    fn unanimous_threshold_needs_every_key(weights in prop::collection::vec(1u16..10, 1..6)) {
        let mut provider = MockProvider::default();
        let total: u32 = weights.iter().map(|w| u32::from(*w)).sum();
        let mut auth = Authority::new(total);
        let mut all = BTreeSet::new();
        for (i, weight) in weights.iter().enumerate() {
            let k = key(0x10 + i as u8);
            auth.add_key(k, *weight);
            all.insert(k);
        }
        provider.insert("vault", AuthorityLevel::Active, auth);
        let mut required = RequiredAuthorities::default();
        required.active.insert(name("vault"));

        prop_assert!(verify_authority(&required, &all, &provider).is_ok());
        for dropped in &all {
            let mut partial = all.clone();
            partial.remove(dropped);
            prop_assert!(verify_authority(&required, &partial, &provider).is_err());
        }
    }

    /// A key reached through a chain of account members satisfies the
    /// root exactly when it sits within the recursion bound.
    #[test]
    fn member_chains_respect_the_depth_bound(chain_len in 0u32..5) {
        let mut provider = MockProvider::default();
        let account_at = |i: u32| format!("chain{i}");
        for i in 0..chain_len {
            let mut auth = Authority::new(1);
            auth.add_account(name(&account_at(i + 1)), 1);
            provider.insert(&account_at(i), AuthorityLevel::Active, auth);
        }
        provider.insert(
            &account_at(chain_len),
            AuthorityLevel::Active,
            Authority::single_key(key(0x42)),
        );
        let mut required = RequiredAuthorities::default();
        required.active.insert(name("chain0"));

        let signers: BTreeSet<PublicKey> = [key(0x42)].into_iter().collect();
        let reached = verify_authority(&required, &signers, &provider).is_ok();
        prop_assert_eq!(reached, chain_len <= MAX_SIG_CHECK_DEPTH);
    }

    /// A signature no authority consumes fails verification outright.
    #[test]
    fn stray_signatures_are_rejected(stray in 0x80u8..) {
        let mut provider = MockProvider::default();
        provider.insert("alice", AuthorityLevel::Active, Authority::single_key(key(0x11)));
        let mut required = RequiredAuthorities::default();
        required.active.insert(name("alice"));

        let signers: BTreeSet<PublicKey> = [key(0x11), key(stray)].into_iter().collect();
        let err = verify_authority(&required, &signers, &provider);
        prop_assert!(matches!(
            err,
            Err(ProtocolError::IrrelevantSignature(k)) if k == key(stray)
        ));
    }
}
