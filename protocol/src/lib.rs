//! Consensus protocol for the Amalgam blockchain.
//!
//! Everything a node needs to agree on, independent of state storage:
//! - **Operations**: the closed set of user actions and the virtual
//!   operations the chain emits while applying them
//! - **Transactions**: signed bundles of operations with TaPoS anchoring
//! - **Blocks**: witness-signed containers of transactions
//! - **Authority**: weighted multi-sig account permissions and the
//!   signature-checking machinery that resolves them
//!
//! Stateless validation lives here ([`Operation::validate`]); stateful
//! application is the chain crate's job.

pub mod authority;
pub mod block;
pub mod config;
pub mod error;
pub mod operations;
pub mod sign_state;
pub mod transaction;

pub use authority::Authority;
pub use block::{BlockHeader, SignedBlock};
pub use error::ProtocolError;
pub use operations::{Operation, RequiredAuthorities};
pub use sign_state::{
    get_potential_signatures, get_required_signatures, verify_account_authority, verify_authority,
    AuthorityLevel, AuthorityProvider, SignState,
};
pub use transaction::{SignedTransaction, Transaction, TransactionSignature};
