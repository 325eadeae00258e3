use amalgam_types::{AccountName, PublicKey, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid operation: {0}")]
    Validation(String),

    #[error("missing required owner authority for {0}")]
    MissingOwnerAuthority(AccountName),

    #[error("missing required active authority for {0}")]
    MissingActiveAuthority(AccountName),

    #[error("missing required posting authority for {0}")]
    MissingPostingAuthority(AccountName),

    #[error("an authority declared by the operation itself is not satisfied")]
    MissingOtherAuthority,

    #[error("signature from {0} is not required by this transaction")]
    IrrelevantSignature(PublicKey),

    #[error("duplicate signature from {0}")]
    DuplicateSignature(PublicKey),

    #[error("signature from {0} does not verify against the transaction digest")]
    InvalidSignature(PublicKey),

    #[error("authority references unknown account {0}")]
    UnknownAuthorityAccount(AccountName),

    #[error("transaction contains no operations")]
    EmptyTransaction,

    #[error("virtual operation {0} cannot appear in a transaction")]
    VirtualOperationInTransaction(&'static str),

    #[error("encoding failed: {0}")]
    Encode(#[from] amalgam_crypto::CryptoError),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl ProtocolError {
    /// Shorthand for a stateless validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
