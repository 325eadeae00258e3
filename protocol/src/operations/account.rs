//! Account creation and authority updates.

use amalgam_types::{AccountName, Asset, PublicKey, Symbol};
use serde::{Deserialize, Serialize};

use super::{check_account_name, check_json_metadata};
use crate::authority::Authority;
use crate::error::ProtocolError;

/// Register a new account. The fee, paid in AML by the creator, is
/// converted into vesting shares for the new account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountCreateOp {
    pub fee: Asset,
    pub creator: AccountName,
    pub new_account_name: AccountName,
    pub owner: Authority,
    pub active: Authority,
    pub posting: Authority,
    pub memo_key: PublicKey,
    pub json_metadata: String,
}

impl AccountCreateOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.new_account_name)?;
        if self.fee.symbol != Symbol::Aml {
            return Err(ProtocolError::validation(
                "account creation fee must be AML",
            ));
        }
        if self.fee.is_negative() {
            return Err(ProtocolError::validation(
                "account creation fee cannot be negative",
            ));
        }
        self.owner.validate()?;
        self.active.validate()?;
        self.posting.validate()?;
        check_json_metadata(&self.json_metadata)
    }
}

/// Replace any subset of an account's authorities, its memo key or its
/// metadata. Absent fields keep their current value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdateOp {
    pub account: AccountName,
    pub owner: Option<Authority>,
    pub active: Option<Authority>,
    pub posting: Option<Authority>,
    pub memo_key: PublicKey,
    pub json_metadata: String,
}

impl AccountUpdateOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.account)?;
        if let Some(owner) = &self.owner {
            owner.validate()?;
        }
        if let Some(active) = &self.active {
            active.validate()?;
        }
        if let Some(posting) = &self.posting {
            posting.validate()?;
        }
        check_json_metadata(&self.json_metadata)
    }
}
