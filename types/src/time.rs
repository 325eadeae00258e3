//! Chain timestamps.
//!
//! Consensus time is Unix epoch seconds in a u32, matching the wire format.
//! All arithmetic saturates; the chain never runs backwards and the sentinel
//! [`Timestamp::MAX`] means "never".

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the Unix epoch (UTC).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u32);

impl Timestamp {
    /// Time zero.
    pub const EPOCH: Self = Self(0);
    /// The "never happens" sentinel.
    pub const MAX: Self = Self(u32::MAX);

    pub const fn new(secs: u32) -> Self {
        Self(secs)
    }

    pub fn as_secs(&self) -> u32 {
        self.0
    }

    /// This timestamp advanced by `secs`, saturating at the sentinel.
    pub fn plus_secs(&self, secs: u32) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Seconds from `earlier` to this timestamp (zero if `earlier` is later).
    pub fn secs_since(&self, earlier: Timestamp) -> u32 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}
