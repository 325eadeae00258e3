//! Balance movement: transfers, vesting deposits and withdrawals, routes
//! and delegation.

use amalgam_types::{AccountName, Asset, Symbol};
use serde::{Deserialize, Serialize};

use super::{check_account_name, check_memo};
use crate::config;
use crate::error::ProtocolError;

/// Move liquid AML or ABD between accounts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferOp {
    pub from: AccountName,
    pub to: AccountName,
    pub amount: Asset,
    /// Plain-text note, visible on chain.
    pub memo: String,
}

impl TransferOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.from)?;
        check_account_name(&self.to)?;
        if self.amount.symbol == Symbol::Amlv {
            return Err(ProtocolError::validation(
                "vesting shares cannot be transferred directly",
            ));
        }
        if self.amount.amount <= 0 {
            return Err(ProtocolError::validation("must transfer a positive amount"));
        }
        check_memo(&self.memo)
    }
}

/// Convert liquid AML into vesting shares for `to` (or `from` itself when
/// `to` is empty), at the current chain-wide vesting price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferToVestingOp {
    pub from: AccountName,
    /// Empty means the shares vest to `from`.
    pub to: AccountName,
    pub amount: Asset,
    pub memo: String,
}

impl TransferToVestingOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.from)?;
        if self.amount.symbol != Symbol::Aml {
            return Err(ProtocolError::validation("amount must be AML"));
        }
        if !self.to.is_empty() {
            check_account_name(&self.to)?;
        }
        if self.amount.amount <= 0 {
            return Err(ProtocolError::validation("must transfer a positive amount"));
        }
        check_memo(&self.memo)
    }
}

/// Begin (or reset) powering down: `vesting_shares` is paid back as AML in
/// thirteen equal weekly installments. Zero cancels a pending withdrawal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WithdrawVestingOp {
    pub account: AccountName,
    pub vesting_shares: Asset,
}

impl WithdrawVestingOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.account)?;
        if self.vesting_shares.symbol != Symbol::Amlv {
            return Err(ProtocolError::validation("amount must be AMLV"));
        }
        Ok(())
    }
}

/// Route a percentage of future vesting withdrawals to another account,
/// optionally re-vesting them on arrival. Percent zero removes the route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SetWithdrawVestingRouteOp {
    pub from_account: AccountName,
    pub to_account: AccountName,
    pub percent: u16,
    pub auto_vest: bool,
}

impl SetWithdrawVestingRouteOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.from_account)?;
        check_account_name(&self.to_account)?;
        if self.percent > config::PERCENT_100 {
            return Err(ProtocolError::validation(
                "route percent cannot exceed 100%",
            ));
        }
        Ok(())
    }
}

/// Lend vesting influence to another account. Zero shares removes the
/// delegation; the returned shares stay locked for a cool-down first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelegateVestingSharesOp {
    pub delegator: AccountName,
    pub delegatee: AccountName,
    pub vesting_shares: Asset,
}

impl DelegateVestingSharesOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.delegator)?;
        check_account_name(&self.delegatee)?;
        if self.delegator == self.delegatee {
            return Err(ProtocolError::validation("cannot delegate to yourself"));
        }
        if self.vesting_shares.symbol != Symbol::Amlv {
            return Err(ProtocolError::validation("delegation must be AMLV"));
        }
        if self.vesting_shares.is_negative() {
            return Err(ProtocolError::validation("delegation cannot be negative"));
        }
        Ok(())
    }
}
