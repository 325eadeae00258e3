//! Shared utilities for the Amalgam chain.

pub mod logging;

pub use logging::{init_logging, LogFormat};
