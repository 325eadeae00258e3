//! Cryptographic primitives for the Amalgam chain.
//!
//! Ed25519 key handling and signing plus BLAKE2b digests over canonical
//! bincode bytes. Nothing in here touches chain state.

pub mod error;
pub mod hash;
pub mod keys;
pub mod sign;

pub use error::CryptoError;
pub use hash::{blake2b_256, blake2b_256_multi, digest_of};
pub use keys::{generate_keypair, keypair_from_seed, public_from_private};
pub use sign::{sign_message, verify_signature};
