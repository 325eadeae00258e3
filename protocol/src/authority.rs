//! Weighted multi-signature account permissions.
//!
//! An authority is satisfied when the weights of its signing keys plus the
//! weights of its satisfied member accounts reach `weight_threshold`.
//! Member accounts are resolved recursively by the sign-state walker, up to
//! [`crate::config::MAX_SIG_CHECK_DEPTH`].

use amalgam_types::{AccountName, PublicKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ProtocolError;

/// Maximum combined number of keys and member accounts in one authority.
pub const MAX_AUTHORITY_MEMBERSHIP: usize = 10;

/// A weighted threshold over keys and member accounts.
///
/// Maps are ordered so serialization is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub weight_threshold: u32,
    pub account_auths: BTreeMap<AccountName, u16>,
    pub key_auths: BTreeMap<PublicKey, u16>,
}

impl Authority {
    /// An empty authority with the given threshold. A zero threshold is
    /// open: it is satisfied by any signature set, including none.
    pub fn new(weight_threshold: u32) -> Self {
        Self {
            weight_threshold,
            account_auths: BTreeMap::new(),
            key_auths: BTreeMap::new(),
        }
    }

    /// An authority requiring a single key signature.
    pub fn single_key(key: PublicKey) -> Self {
        let mut key_auths = BTreeMap::new();
        key_auths.insert(key, 1);
        Self {
            weight_threshold: 1,
            account_auths: BTreeMap::new(),
            key_auths,
        }
    }

    /// An authority satisfied by a single member account.
    pub fn single_account(name: AccountName) -> Self {
        let mut account_auths = BTreeMap::new();
        account_auths.insert(name, 1);
        Self {
            weight_threshold: 1,
            account_auths,
            key_auths: BTreeMap::new(),
        }
    }

    /// An authority nobody can satisfy. Produced by declining voting rights
    /// and by clearing an account during recovery rejection.
    pub fn impossible() -> Self {
        Self {
            weight_threshold: 1,
            account_auths: BTreeMap::new(),
            key_auths: BTreeMap::new(),
        }
    }

    pub fn add_key(&mut self, key: PublicKey, weight: u16) {
        self.key_auths.insert(key, weight);
    }

    pub fn add_account(&mut self, name: AccountName, weight: u16) {
        self.account_auths.insert(name, weight);
    }

    pub fn num_auths(&self) -> usize {
        self.account_auths.len() + self.key_auths.len()
    }

    /// True when no combination of members can reach the threshold.
    pub fn is_impossible(&self) -> bool {
        let mut total: u64 = 0;
        for w in self.account_auths.values() {
            total += u64::from(*w);
        }
        for w in self.key_auths.values() {
            total += u64::from(*w);
        }
        total < u64::from(self.weight_threshold)
    }

    /// Stateless shape checks: member account names must be well formed and
    /// the membership count bounded.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.num_auths() > MAX_AUTHORITY_MEMBERSHIP {
            return Err(ProtocolError::validation(format!(
                "authority membership exceeded, max {} got {}",
                MAX_AUTHORITY_MEMBERSHIP,
                self.num_auths()
            )));
        }
        for name in self.account_auths.keys() {
            if !AccountName::is_valid_name(name.as_str()) {
                return Err(ProtocolError::validation(format!(
                    "authority references invalid account name \"{name}\""
                )));
            }
        }
        Ok(())
    }
}
