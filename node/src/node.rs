//! The node handle: owns the chain database and exposes the
//! apply/read surface callers drive it through.

use amalgam_chain::{Database, GenesisParams, State};
use amalgam_protocol::{SignedBlock, SignedTransaction};
use amalgam_types::Timestamp;

use crate::config::NodeConfig;
use crate::error::NodeError;

/// A running Amalgam node.
pub struct Node {
    config: NodeConfig,
    db: Database,
}

impl Node {
    /// Open a node from its configuration, seeding the genesis state.
    pub fn open(config: NodeConfig) -> Result<Self, NodeError> {
        let options = config.database_options()?;
        let genesis = GenesisParams {
            initiator_key: config.initiator_key()?,
        };
        let db = Database::with_genesis(options, &genesis)?;
        tracing::info!(
            chain_id = %db.options().chain_id,
            head = db.head_block_num(),
            "chain database open"
        );
        Ok(Self { config, db })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The underlying chain database, for observer registration and
    /// anything the convenience surface below does not cover.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Apply a block on top of the current head.
    pub fn apply_block(&self, block: &SignedBlock) -> Result<(), NodeError> {
        self.db.apply_block(block)?;
        Ok(())
    }

    /// Rewind the most recent reversible block.
    pub fn pop_block(&self) -> Result<(), NodeError> {
        self.db.pop_block()?;
        Ok(())
    }

    /// Dry-run a pending transaction against the head state, leaving
    /// no trace.
    pub fn validate_transaction(&self, tx: &SignedTransaction) -> Result<(), NodeError> {
        self.db.validate_transaction(tx)?;
        Ok(())
    }

    pub fn head_block_num(&self) -> u32 {
        self.db.head_block_num()
    }

    pub fn head_block_time(&self) -> Timestamp {
        self.db.head_block_time()
    }

    /// Run `read` against a consistent snapshot of the chain state.
    pub fn read_state<R>(&self, read: impl FnOnce(&State) -> R) -> R {
        self.db.with_state(read)
    }
}
