//! Amalgam node lifecycle.
//!
//! Wires configuration, logging and the chain database into a single
//! handle. There is no peer-to-peer layer here: blocks reach the node
//! through [`Node::apply_block`] and pending transactions through
//! [`Node::validate_transaction`].

pub mod config;
pub mod error;
pub mod node;

pub use config::NodeConfig;
pub use error::NodeError;
pub use node::Node;
