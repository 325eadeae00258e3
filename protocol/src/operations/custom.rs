//! Application-defined operations.
//!
//! The chain gives these no semantics beyond authority checking and
//! bandwidth charging; plugins and off-chain consumers interpret the
//! payloads.

use amalgam_types::AccountName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::authority::Authority;
use crate::error::ProtocolError;

const MAX_CUSTOM_ID_LENGTH: usize = 32;

/// An opaque binary payload bound to a numeric app id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomOp {
    /// Accounts whose active authority signs, and whose bandwidth pays.
    pub required_auths: BTreeSet<AccountName>,
    pub id: u16,
    pub data: Vec<u8>,
}

impl CustomOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.required_auths.is_empty() {
            return Err(ProtocolError::validation(
                "at least one account must be specified",
            ));
        }
        Ok(())
    }
}

/// A JSON payload bound to a string app id, signable at either the active
/// or the posting level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomJsonOp {
    pub required_auths: BTreeSet<AccountName>,
    pub required_posting_auths: BTreeSet<AccountName>,
    pub id: String,
    pub json: String,
}

impl CustomJsonOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.required_auths.is_empty() && self.required_posting_auths.is_empty() {
            return Err(ProtocolError::validation(
                "at least one account must be specified",
            ));
        }
        if self.id.len() > MAX_CUSTOM_ID_LENGTH {
            return Err(ProtocolError::validation("id is too long"));
        }
        serde_json::from_str::<serde_json::Value>(&self.json)
            .map(|_| ())
            .map_err(|e| ProtocolError::validation(format!("payload is not valid JSON: {e}")))
    }
}

/// A binary payload that may demand any mix of authority levels,
/// including literal authorities resolved against no account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomBinaryOp {
    pub required_owner_auths: BTreeSet<AccountName>,
    pub required_active_auths: BTreeSet<AccountName>,
    pub required_posting_auths: BTreeSet<AccountName>,
    pub required_auths: Vec<Authority>,
    pub id: String,
    pub data: Vec<u8>,
}

impl CustomBinaryOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let named = self.required_owner_auths.len()
            + self.required_active_auths.len()
            + self.required_posting_auths.len();
        if named == 0 {
            return Err(ProtocolError::validation(
                "at least one account must be specified",
            ));
        }
        if self.id.len() > MAX_CUSTOM_ID_LENGTH {
            return Err(ProtocolError::validation("id is too long"));
        }
        for auth in &self.required_auths {
            auth.validate()?;
        }
        Ok(())
    }
}
