//! Account name type with chain-wide validation grammar.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TypeError;

/// Minimum length of a valid account name.
pub const MIN_ACCOUNT_NAME_LENGTH: usize = 3;
/// Maximum length of a valid account name.
pub const MAX_ACCOUNT_NAME_LENGTH: usize = 16;

/// A chain account name.
///
/// Valid names are 3–16 characters of dot-separated segments, each segment
/// at least three characters, starting with a lowercase letter, ending with
/// a letter or digit, with letters, digits and hyphens in between.
///
/// The empty name is representable (serialization defaults, authority
/// probes) but never passes [`AccountName::is_valid_name`]; operation
/// validation rejects it where a real account is required.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountName(String);

impl AccountName {
    /// Create a validated account name.
    pub fn new(raw: impl Into<String>) -> Result<Self, TypeError> {
        let s = raw.into();
        if Self::is_valid_name(&s) {
            Ok(Self(s))
        } else {
            Err(TypeError::InvalidAccountName(s))
        }
    }

    /// Create an account name from a compile-time constant.
    ///
    /// # Panics
    /// Panics if the literal does not satisfy the name grammar. Reserved for
    /// the chain's built-in account constants.
    pub fn from_static(raw: &'static str) -> Self {
        assert!(
            Self::is_valid_name(raw),
            "built-in account name \"{raw}\" violates the name grammar"
        );
        Self(raw.to_string())
    }

    /// The empty sentinel name.
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check a string against the account name grammar.
    pub fn is_valid_name(name: &str) -> bool {
        let len = name.len();
        if !(MIN_ACCOUNT_NAME_LENGTH..=MAX_ACCOUNT_NAME_LENGTH).contains(&len) {
            return false;
        }
        for segment in name.split('.') {
            let bytes = segment.as_bytes();
            if bytes.len() < 3 {
                return false;
            }
            if !bytes[0].is_ascii_lowercase() {
                return false;
            }
            let last = bytes[bytes.len() - 1];
            if !(last.is_ascii_lowercase() || last.is_ascii_digit()) {
                return false;
            }
            if !bytes[1..bytes.len() - 1]
                .iter()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
            {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AccountName {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
