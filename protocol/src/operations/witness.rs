//! Witness registration, tunable chain properties and witness voting.

use amalgam_types::{AccountName, Asset, Price, PublicKey, Symbol};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::check_account_name;
use crate::authority::Authority;
use crate::config;
use crate::error::ProtocolError;

/// The block-producer-tunable consensus parameters. Each elected witness
/// publishes its preferred values; the chain runs on the medians.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainProperties {
    /// Paid in AML on account creation and converted into vesting shares
    /// for the new account, so every account starts with a stake.
    pub account_creation_fee: Asset,
    pub maximum_block_size: u32,
    pub abd_interest_rate: u16,
}

impl Default for ChainProperties {
    fn default() -> Self {
        Self {
            account_creation_fee: Asset::new(config::MIN_ACCOUNT_CREATION_FEE, Symbol::Aml),
            maximum_block_size: config::MIN_BLOCK_SIZE_LIMIT * 2,
            abd_interest_rate: config::DEFAULT_ABD_INTEREST_RATE,
        }
    }
}

impl ChainProperties {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.account_creation_fee.symbol != Symbol::Aml {
            return Err(ProtocolError::validation(
                "account creation fee must be AML",
            ));
        }
        if self.account_creation_fee.amount < config::MIN_ACCOUNT_CREATION_FEE {
            return Err(ProtocolError::validation(
                "account creation fee is below the chain minimum",
            ));
        }
        if self.maximum_block_size < config::MIN_BLOCK_SIZE_LIMIT {
            return Err(ProtocolError::validation("maximum block size is too small"));
        }
        if self.abd_interest_rate > config::PERCENT_100 {
            return Err(ProtocolError::validation(
                "interest rate cannot exceed 100%",
            ));
        }
        Ok(())
    }
}

/// Register as a witness or update the witness record. A zero signing key
/// withdraws the witness from contention without unregistering it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WitnessUpdateOp {
    pub owner: AccountName,
    pub url: String,
    pub block_signing_key: PublicKey,
    pub props: ChainProperties,
    pub fee: Asset,
}

impl WitnessUpdateOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.owner)?;
        if self.url.is_empty() {
            return Err(ProtocolError::validation("witness URL cannot be empty"));
        }
        if self.url.len() > config::MAX_WITNESS_URL_LENGTH {
            return Err(ProtocolError::validation("witness URL is too long"));
        }
        if self.fee.symbol != Symbol::Aml || self.fee.is_negative() {
            return Err(ProtocolError::validation(
                "fee must be a non-negative AML amount",
            ));
        }
        self.props.validate()
    }
}

/// Update individual witness properties through a key-value map.
///
/// Values are bincode-encoded so new properties can ship without a new
/// operation: recognized keys are decoded and checked, unrecognized keys
/// pass through untouched for forward compatibility.
///
/// Signed with the witness's current block signing key, declared under
/// the `"key"` entry, rather than the account's active authority.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WitnessSetPropertiesOp {
    pub owner: AccountName,
    pub props: BTreeMap<String, Vec<u8>>,
}

fn decode_prop<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, ProtocolError> {
    bincode::deserialize(bytes)
        .map_err(|e| ProtocolError::validation(format!("property \"{key}\" failed to decode: {e}")))
}

/// The props map of a [`WitnessSetPropertiesOp`], decoded. Absent keys
/// leave the witness's current value untouched.
#[derive(Clone, Debug)]
pub struct DecodedWitnessProperties {
    /// Must match the witness's current signing key for the operation
    /// to apply.
    pub key: PublicKey,
    pub account_creation_fee: Option<Asset>,
    pub maximum_block_size: Option<u32>,
    pub abd_interest_rate: Option<u16>,
    pub new_signing_key: Option<PublicKey>,
    pub abd_exchange_rate: Option<Price>,
    pub url: Option<String>,
}

impl WitnessSetPropertiesOp {
    /// The authority this operation is checked against: the signing key
    /// named in the props map, or nothing satisfiable when it is absent.
    pub fn signing_authority(&self) -> Authority {
        match self.signing_key() {
            Some(key) => Authority::single_key(key),
            None => Authority::single_account(config::null_account()),
        }
    }

    fn signing_key(&self) -> Option<PublicKey> {
        let bytes = self.props.get("key")?;
        bincode::deserialize(bytes).ok()
    }

    /// Decode every recognized property. Unrecognized keys are ignored
    /// so future properties stay forward-compatible.
    pub fn decode(&self) -> Result<DecodedWitnessProperties, ProtocolError> {
        let key_bytes = self
            .props
            .get("key")
            .ok_or_else(|| ProtocolError::validation("no signing key provided"))?;
        let mut decoded = DecodedWitnessProperties {
            key: decode_prop("key", key_bytes)?,
            account_creation_fee: None,
            maximum_block_size: None,
            abd_interest_rate: None,
            new_signing_key: None,
            abd_exchange_rate: None,
            url: None,
        };
        if let Some(bytes) = self.props.get("account_creation_fee") {
            decoded.account_creation_fee = Some(decode_prop("account_creation_fee", bytes)?);
        }
        if let Some(bytes) = self.props.get("maximum_block_size") {
            decoded.maximum_block_size = Some(decode_prop("maximum_block_size", bytes)?);
        }
        if let Some(bytes) = self.props.get("abd_interest_rate") {
            decoded.abd_interest_rate = Some(decode_prop("abd_interest_rate", bytes)?);
        }
        if let Some(bytes) = self.props.get("new_signing_key") {
            decoded.new_signing_key = Some(decode_prop("new_signing_key", bytes)?);
        }
        if let Some(bytes) = self.props.get("abd_exchange_rate") {
            decoded.abd_exchange_rate = Some(decode_prop("abd_exchange_rate", bytes)?);
        }
        if let Some(bytes) = self.props.get("url") {
            decoded.url = Some(decode_prop("url", bytes)?);
        }
        Ok(decoded)
    }

    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.owner)?;

        let key_bytes = self
            .props
            .get("key")
            .ok_or_else(|| ProtocolError::validation("no signing key provided"))?;
        decode_prop::<PublicKey>("key", key_bytes)?;

        if let Some(bytes) = self.props.get("account_creation_fee") {
            let fee: Asset = decode_prop("account_creation_fee", bytes)?;
            if fee.symbol != Symbol::Aml {
                return Err(ProtocolError::validation(
                    "account creation fee must be AML",
                ));
            }
            if fee.amount < config::MIN_ACCOUNT_CREATION_FEE {
                return Err(ProtocolError::validation(
                    "account creation fee is below the chain minimum",
                ));
            }
        }

        if let Some(bytes) = self.props.get("maximum_block_size") {
            let size: u32 = decode_prop("maximum_block_size", bytes)?;
            if size < config::MIN_BLOCK_SIZE_LIMIT {
                return Err(ProtocolError::validation("maximum block size is too small"));
            }
        }

        if let Some(bytes) = self.props.get("abd_interest_rate") {
            let rate: u16 = decode_prop("abd_interest_rate", bytes)?;
            if rate > config::PERCENT_100 {
                return Err(ProtocolError::validation(
                    "interest rate cannot exceed 100%",
                ));
            }
        }

        if let Some(bytes) = self.props.get("new_signing_key") {
            decode_prop::<PublicKey>("new_signing_key", bytes)?;
        }

        if let Some(bytes) = self.props.get("abd_exchange_rate") {
            let rate: Price = decode_prop("abd_exchange_rate", bytes)?;
            if rate.base.symbol != Symbol::Abd || rate.quote.symbol != Symbol::Aml {
                return Err(ProtocolError::validation(
                    "exchange rate must quote ABD against AML",
                ));
            }
            rate.validate()
                .map_err(|_| ProtocolError::validation("exchange rate is degenerate"))?;
        }

        if let Some(bytes) = self.props.get("url") {
            let url: String = decode_prop("url", bytes)?;
            if url.is_empty() {
                return Err(ProtocolError::validation("witness URL cannot be empty"));
            }
            if url.len() > config::MAX_WITNESS_URL_LENGTH {
                return Err(ProtocolError::validation("witness URL is too long"));
            }
        }

        Ok(())
    }
}

/// Approve or withdraw approval of a witness.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountWitnessVoteOp {
    pub account: AccountName,
    pub witness: AccountName,
    pub approve: bool,
}

impl AccountWitnessVoteOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.account)?;
        check_account_name(&self.witness)
    }
}

/// Delegate witness voting to a proxy account, or clear the proxy with an
/// empty name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountWitnessProxyOp {
    pub account: AccountName,
    pub proxy: AccountName,
}

impl AccountWitnessProxyOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.account)?;
        if !self.proxy.is_empty() {
            check_account_name(&self.proxy)?;
        }
        if self.proxy == self.account {
            return Err(ProtocolError::validation("cannot proxy to yourself"));
        }
        Ok(())
    }
}
