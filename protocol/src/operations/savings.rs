//! Savings balances with a withdrawal delay.
//!
//! Funds in savings cannot leave for three days after a withdrawal is
//! requested, giving a stolen active key a limited blast radius.

use amalgam_types::{AccountName, Asset, Symbol};
use serde::{Deserialize, Serialize};

use super::{check_account_name, check_memo};
use crate::error::ProtocolError;

fn check_savings_amount(amount: &Asset) -> Result<(), ProtocolError> {
    if amount.amount <= 0 {
        return Err(ProtocolError::validation("must transfer a positive amount"));
    }
    if amount.symbol == Symbol::Amlv {
        return Err(ProtocolError::validation("savings hold AML or ABD only"));
    }
    Ok(())
}

/// Move liquid funds into the `to` account's savings, effective at once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferToSavingsOp {
    pub from: AccountName,
    pub to: AccountName,
    pub amount: Asset,
    pub memo: String,
}

impl TransferToSavingsOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.from)?;
        check_account_name(&self.to)?;
        check_savings_amount(&self.amount)?;
        check_memo(&self.memo)
    }
}

/// Request a delayed withdrawal from savings to `to`'s liquid balance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransferFromSavingsOp {
    pub from: AccountName,
    /// Sender-chosen id, unique among the sender's pending withdrawals.
    pub request_id: u32,
    pub to: AccountName,
    pub amount: Asset,
    pub memo: String,
}

impl TransferFromSavingsOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.from)?;
        check_account_name(&self.to)?;
        check_savings_amount(&self.amount)?;
        check_memo(&self.memo)
    }
}

/// Cancel a pending savings withdrawal and return the funds to savings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CancelTransferFromSavingsOp {
    pub from: AccountName,
    pub request_id: u32,
}

impl CancelTransferFromSavingsOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    #[test]
    fn test_savings_transfer_valid() {
        let op = TransferToSavingsOp {
            from: name("alice"),
            to: name("alice"),
            amount: Asset::new(1_000, Symbol::Abd),
            memo: String::new(),
        };
        assert!(op.validate().is_ok());
    }

    #[test]
    fn test_savings_reject_vests_and_zero() {
        let mut op = TransferToSavingsOp {
            from: name("alice"),
            to: name("alice"),
            amount: Asset::new(1_000, Symbol::Amlv),
            memo: String::new(),
        };
        assert!(op.validate().is_err());
        op.amount = Asset::new(0, Symbol::Aml);
        assert!(op.validate().is_err());
    }

    #[test]
    fn test_withdraw_from_savings_valid() {
        let op = TransferFromSavingsOp {
            from: name("alice"),
            request_id: 3,
            to: name("bobby"),
            amount: Asset::new(500, Symbol::Aml),
            memo: "out".to_string(),
        };
        assert!(op.validate().is_ok());
    }
}
