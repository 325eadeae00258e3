//! The chain error taxonomy.
//!
//! Every failure an evaluator or the driver can produce is a typed,
//! deterministic value: the same transaction against the same state fails
//! identically on every node. A failure aborts the enclosing transaction
//! (or block) and the driver rolls its effects back in full.

use amalgam_protocol::ProtocolError;
use amalgam_store::StoreError;
use amalgam_types::{AccountName, Asset, Timestamp, TransactionId, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    /// Structural validation and authority failures, raised below the
    /// state layer.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    // ── State preconditions ─────────────────────────────────────────────
    #[error("unknown account \"{0}\"")]
    UnknownAccount(AccountName),

    #[error("account \"{0}\" already exists")]
    AccountAlreadyExists(AccountName),

    #[error("\"{0}\" is not a witness")]
    UnknownWitness(AccountName),

    #[error("\"{account}\" has {available}, needs {required}")]
    InsufficientBalance {
        account: AccountName,
        available: Asset,
        required: Asset,
    },

    #[error("{0} not found")]
    ObjectNotFound(String),

    /// A deterministic rule failure with its own message; the catch-all
    /// for evaluator preconditions that need no structured payload.
    #[error("{0}")]
    Precondition(String),

    // ── Transaction admission ───────────────────────────────────────────
    #[error("transaction {0} is already included")]
    DuplicateTransaction(TransactionId),

    #[error("transaction expired at {expiration}, head time is {now}")]
    TransactionExpired {
        expiration: Timestamp,
        now: Timestamp,
    },

    #[error("expiration {expiration} is beyond the admission horizon {horizon}")]
    ExpirationTooFar {
        expiration: Timestamp,
        horizon: Timestamp,
    },

    #[error("transaction does not reference a known recent block")]
    TaposMismatch,

    // ── Resource guards ─────────────────────────────────────────────────
    #[error("bandwidth exceeded for \"{account}\"")]
    BandwidthExceeded { account: AccountName },

    #[error("account \"{0}\" already submitted a custom operation in this block")]
    DuplicateCustomOperation(AccountName),

    // ── Block admission ─────────────────────────────────────────────────
    #[error("block at height {num} does not link to head {head}")]
    UnlinkedBlock { num: u32, head: u32 },

    #[error("block timestamp {stamp} is not after head time {head}")]
    InvalidBlockTime { stamp: Timestamp, head: Timestamp },

    #[error("block merkle root does not match its transactions")]
    MerkleMismatch,

    #[error("block is not signed with \"{witness}\"'s signing key")]
    InvalidBlockSignature { witness: AccountName },
}

/// Evaluator precondition guard, the moral equivalent of an assertion
/// that rejects the transaction instead of crashing the node.
pub(crate) fn ensure<F: FnOnce() -> String>(cond: bool, msg: F) -> Result<(), ChainError> {
    if cond {
        Ok(())
    } else {
        Err(ChainError::Precondition(msg()))
    }
}
