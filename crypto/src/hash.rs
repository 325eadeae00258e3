//! BLAKE2b hashing over raw bytes and canonically encoded values.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest as _};
use serde::Serialize;

use amalgam_types::Digest;

use crate::error::CryptoError;

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit BLAKE2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash multiple byte slices in sequence (avoids concatenation allocation).
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Digest of a value's canonical bincode encoding.
///
/// This is the one hashing path for consensus data: two nodes that disagree
/// on these bytes disagree on the value itself.
pub fn digest_of<T: Serialize>(value: &T) -> Result<Digest, CryptoError> {
    let bytes = bincode::serialize(value).map_err(|e| CryptoError::Encode(e.to_string()))?;
    Ok(Digest::new(blake2b_256(&bytes)))
}
