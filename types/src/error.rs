//! Errors raised by the value types themselves.

use thiserror::Error;

/// Failures constructing or combining the basic value types.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("invalid account name \"{0}\"")]
    InvalidAccountName(String),

    #[error("cannot parse asset from \"{0}\"")]
    InvalidAssetString(String),

    #[error("cannot parse public key from \"{0}\"")]
    InvalidPublicKey(String),

    #[error("asset symbols do not match: {0} vs {1}")]
    SymbolMismatch(&'static str, &'static str),

    #[error("asset amount overflow")]
    AmountOverflow,

    #[error("price must have two different symbols with positive amounts")]
    InvalidPrice,

    #[error("asset {0} cannot be converted with a {1}:{2} price")]
    PriceSymbolMismatch(&'static str, &'static str, &'static str),
}
