//! The transaction application engine.
//!
//! This crate turns signed blocks and transactions into deterministic
//! state mutation: authority checks, evaluator dispatch, bandwidth
//! rate-limiting and the per-block maintenance sweep. [`Database`] is
//! the single entry point; everything below it is bookkeeping.

mod bandwidth;
mod database;
mod error;
mod evaluators;
mod genesis;
mod market;
mod reward;
mod state;

pub mod objects;

pub use database::{
    BlockListener, Database, DatabaseOptions, OperationListener, OperationNotification,
    TransactionListener,
};
pub use error::ChainError;
pub use genesis::GenesisParams;
pub use reward::{claim_payout, evaluate_reward_curve, is_payout_dust};
pub use state::State;
