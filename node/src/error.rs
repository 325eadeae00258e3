use thiserror::Error;

use amalgam_chain::ChainError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("config error: {0}")]
    Config(String),
}
