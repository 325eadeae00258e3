//! Crypto-layer errors.

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// Canonical serialization for hashing failed.
    #[error("cannot encode value for hashing: {0}")]
    Encode(String),
}
