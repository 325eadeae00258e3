//! Node configuration with TOML file support.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use amalgam_chain::DatabaseOptions;
use amalgam_protocol::config;
use amalgam_types::{Digest, PublicKey};
use amalgam_utils::LogFormat;

use crate::error::NodeError;

/// Configuration for an Amalgam node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Every field has a default,
/// so an empty file is a valid configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Chain id as 64 hex characters. Empty selects the built-in
    /// Amalgam chain id.
    #[serde(default)]
    pub chain_id: String,

    /// Public key for the genesis initiator account, as 64 hex
    /// characters. Empty leaves the initiator with a zero key, which is
    /// fine for inspecting state but cannot sign anything.
    #[serde(default)]
    pub initiator_key: String,

    /// Charge stake-weighted bandwidth on incoming transactions. Turn
    /// this off only when replaying trusted history.
    #[serde(default = "default_true")]
    pub enforce_bandwidth: bool,

    /// Number of reversible blocks to retain before they harden into
    /// the irreversible baseline.
    #[serde(default = "default_max_undo_history")]
    pub max_undo_history: u32,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_max_undo_history() -> u32 {
    config::MAX_UNDO_HISTORY
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    /// The chain id transaction signatures must commit to.
    pub fn chain_id(&self) -> Result<Digest, NodeError> {
        if self.chain_id.is_empty() {
            return Ok(config::chain_id());
        }
        Ok(Digest::new(decode_hex32("chain_id", &self.chain_id)?))
    }

    /// The public key the genesis initiator account is created with.
    pub fn initiator_key(&self) -> Result<PublicKey, NodeError> {
        if self.initiator_key.is_empty() {
            return Ok(PublicKey::ZERO);
        }
        Ok(PublicKey(decode_hex32("initiator_key", &self.initiator_key)?))
    }

    /// The parsed log format.
    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        LogFormat::from_str(&self.log_format).map_err(NodeError::Config)
    }

    /// The chain database options this configuration selects.
    pub fn database_options(&self) -> Result<DatabaseOptions, NodeError> {
        Ok(DatabaseOptions {
            chain_id: self.chain_id()?,
            enforce_bandwidth: self.enforce_bandwidth,
            max_undo_history: self.max_undo_history,
        })
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain_id: String::new(),
            initiator_key: String::new(),
            enforce_bandwidth: default_true(),
            max_undo_history: default_max_undo_history(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

fn decode_hex32(field: &str, s: &str) -> Result<[u8; 32], NodeError> {
    let bytes =
        hex::decode(s).map_err(|e| NodeError::Config(format!("{field} is not hex: {e}")))?;
    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| NodeError::Config(format!("{field} must be 32 bytes")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string();
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.enforce_bandwidth, config.enforce_bandwidth);
        assert_eq!(parsed.max_undo_history, config.max_undo_history);
        assert_eq!(parsed.log_format, config.log_format);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let parsed = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert!(parsed.enforce_bandwidth);
        assert_eq!(parsed.max_undo_history, config::MAX_UNDO_HISTORY);
        assert_eq!(parsed.log_format, "human");
        assert_eq!(parsed.chain_id().unwrap(), config::chain_id());
        assert_eq!(parsed.initiator_key().unwrap(), PublicKey::ZERO);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            enforce_bandwidth = false
            max_undo_history = 50
        "#;
        let parsed = NodeConfig::from_toml_str(toml).expect("should parse");
        assert!(!parsed.enforce_bandwidth);
        assert_eq!(parsed.max_undo_history, 50);
        assert_eq!(parsed.log_level, "info"); // default
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/amalgam.toml");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn hex_fields_must_be_well_formed() {
        let mut config = NodeConfig::default();
        config.chain_id = "zz".to_string();
        assert!(config.chain_id().is_err());

        config.chain_id = "ab".repeat(31);
        assert!(config.chain_id().is_err());

        config.chain_id = "ab".repeat(32);
        assert_eq!(config.chain_id().unwrap(), Digest::new([0xab; 32]));

        config.initiator_key = hex::encode([7u8; 32]);
        assert_eq!(config.initiator_key().unwrap(), PublicKey([7u8; 32]));
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        let mut config = NodeConfig::default();
        assert_eq!(config.log_format().unwrap(), LogFormat::Human);
        config.log_format = "xml".to_string();
        assert!(matches!(config.log_format(), Err(NodeError::Config(_))));
    }
}
