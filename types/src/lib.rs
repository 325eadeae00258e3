//! Fundamental types for the Amalgam chain.
//!
//! This crate defines the value types shared across every other crate in the
//! workspace: account names, assets and prices, timestamps, digests, and
//! cryptographic key material. Everything here is plain data with
//! deterministic ordering and arithmetic; no chain state, no I/O.

pub mod account_name;
pub mod asset;
pub mod digest;
pub mod error;
pub mod keys;
pub mod price;
pub mod time;

pub use account_name::AccountName;
pub use asset::{Asset, Symbol};
pub use digest::{BlockId, Digest, TransactionId};
pub use error::TypeError;
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use price::Price;
pub use time::Timestamp;
