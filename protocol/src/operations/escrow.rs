//! Three-party escrow.
//!
//! `from` locks funds that `agent` holds in trust for `to`. Both `to` and
//! `agent` must ratify before the deadline; after that funds move only by
//! release, or by agent decision once a dispute is raised.

use amalgam_types::{AccountName, Asset, Symbol, Timestamp};
use serde::{Deserialize, Serialize};

use super::{check_account_name, check_json_metadata};
use crate::error::ProtocolError;

fn check_escrow_amounts(abd_amount: &Asset, aml_amount: &Asset) -> Result<(), ProtocolError> {
    if abd_amount.symbol != Symbol::Abd {
        return Err(ProtocolError::validation("abd amount must be ABD"));
    }
    if aml_amount.symbol != Symbol::Aml {
        return Err(ProtocolError::validation("aml amount must be AML"));
    }
    if abd_amount.is_negative() || aml_amount.is_negative() {
        return Err(ProtocolError::validation(
            "escrow amounts cannot be negative",
        ));
    }
    if abd_amount.is_zero() && aml_amount.is_zero() {
        return Err(ProtocolError::validation(
            "escrow must move a non-zero amount",
        ));
    }
    Ok(())
}

/// Open an escrow, locking the amounts plus the agent's fee.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscrowTransferOp {
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    /// Sender-chosen id, unique among the sender's open escrows.
    pub escrow_id: u32,
    pub abd_amount: Asset,
    pub aml_amount: Asset,
    /// Paid to the agent once both parties have approved.
    pub fee: Asset,
    pub ratification_deadline: Timestamp,
    pub escrow_expiration: Timestamp,
    pub json_meta: String,
}

impl EscrowTransferOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.from)?;
        check_account_name(&self.to)?;
        check_account_name(&self.agent)?;
        if self.fee.is_negative() {
            return Err(ProtocolError::validation("fee cannot be negative"));
        }
        if self.fee.symbol == Symbol::Amlv {
            return Err(ProtocolError::validation("fee must be AML or ABD"));
        }
        check_escrow_amounts(&self.abd_amount, &self.aml_amount)?;
        if self.from == self.agent || self.to == self.agent {
            return Err(ProtocolError::validation("agent must be a third party"));
        }
        if self.ratification_deadline >= self.escrow_expiration {
            return Err(ProtocolError::validation(
                "ratification deadline must precede escrow expiration",
            ));
        }
        check_json_metadata(&self.json_meta)
    }
}

/// Ratify (or refuse) an escrow as its receiver or agent. A single
/// refusal cancels the escrow and refunds `from`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscrowApproveOp {
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    pub who: AccountName,
    pub escrow_id: u32,
    pub approve: bool,
}

impl EscrowApproveOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.from)?;
        check_account_name(&self.to)?;
        check_account_name(&self.agent)?;
        check_account_name(&self.who)?;
        if self.who != self.to && self.who != self.agent {
            return Err(ProtocolError::validation(
                "only the receiver or the agent ratifies an escrow",
            ));
        }
        Ok(())
    }
}

/// Escalate an approved escrow to the agent's judgment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscrowDisputeOp {
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    pub who: AccountName,
    pub escrow_id: u32,
}

impl EscrowDisputeOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.from)?;
        check_account_name(&self.to)?;
        check_account_name(&self.agent)?;
        check_account_name(&self.who)?;
        if self.who != self.from && self.who != self.to {
            return Err(ProtocolError::validation(
                "only the sender or the receiver may dispute",
            ));
        }
        Ok(())
    }
}

/// Pay part or all of an escrow's funds out to `from` or `to`. Who may
/// release, and to whom, depends on the escrow's dispute and expiration
/// state; those rules are enforced at application time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EscrowReleaseOp {
    pub from: AccountName,
    pub to: AccountName,
    pub agent: AccountName,
    pub who: AccountName,
    pub receiver: AccountName,
    pub escrow_id: u32,
    pub abd_amount: Asset,
    pub aml_amount: Asset,
}

impl EscrowReleaseOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.from)?;
        check_account_name(&self.to)?;
        check_account_name(&self.agent)?;
        check_account_name(&self.who)?;
        check_account_name(&self.receiver)?;
        if self.who != self.from && self.who != self.to && self.who != self.agent {
            return Err(ProtocolError::validation(
                "release must come from a party to the escrow",
            ));
        }
        if self.receiver != self.from && self.receiver != self.to {
            return Err(ProtocolError::validation(
                "funds can only be released to the sender or the receiver",
            ));
        }
        check_escrow_amounts(&self.abd_amount, &self.aml_amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> AccountName {
        AccountName::new(s).unwrap()
    }

    fn make_transfer() -> EscrowTransferOp {
        EscrowTransferOp {
            from: name("alice"),
            to: name("bobby"),
            agent: name("judge"),
            escrow_id: 1,
            abd_amount: Asset::new(0, Symbol::Abd),
            aml_amount: Asset::new(5_000, Symbol::Aml),
            fee: Asset::new(100, Symbol::Aml),
            ratification_deadline: Timestamp::new(1_000),
            escrow_expiration: Timestamp::new(2_000),
            json_meta: String::new(),
        }
    }

    #[test]
    fn test_escrow_transfer_valid() {
        assert!(make_transfer().validate().is_ok());
    }

    #[test]
    fn test_escrow_agent_must_be_third_party() {
        let mut op = make_transfer();
        op.agent = name("alice");
        assert!(op.validate().is_err());
        op.agent = name("bobby");
        assert!(op.validate().is_err());
    }

    #[test]
    fn test_escrow_needs_some_amount() {
        let mut op = make_transfer();
        op.aml_amount = Asset::new(0, Symbol::Aml);
        assert!(op.validate().is_err());
        op.abd_amount = Asset::new(10, Symbol::Abd);
        assert!(op.validate().is_ok());
    }

    #[test]
    fn test_escrow_deadline_ordering() {
        let mut op = make_transfer();
        op.ratification_deadline = op.escrow_expiration;
        assert!(op.validate().is_err());
    }

    #[test]
    fn test_escrow_fee_cannot_be_vests() {
        let mut op = make_transfer();
        op.fee = Asset::new(100, Symbol::Amlv);
        assert!(op.validate().is_err());
    }

    #[test]
    fn test_approve_who_is_constrained() {
        let mut op = EscrowApproveOp {
            from: name("alice"),
            to: name("bobby"),
            agent: name("judge"),
            who: name("bobby"),
            escrow_id: 1,
            approve: true,
        };
        assert!(op.validate().is_ok());
        op.who = name("judge");
        assert!(op.validate().is_ok());
        op.who = name("alice");
        assert!(op.validate().is_err());
    }

    #[test]
    fn test_dispute_who_is_constrained() {
        let mut op = EscrowDisputeOp {
            from: name("alice"),
            to: name("bobby"),
            agent: name("judge"),
            who: name("alice"),
            escrow_id: 1,
        };
        assert!(op.validate().is_ok());
        op.who = name("judge");
        assert!(op.validate().is_err());
    }

    #[test]
    fn test_release_receiver_is_constrained() {
        let mut op = EscrowReleaseOp {
            from: name("alice"),
            to: name("bobby"),
            agent: name("judge"),
            who: name("judge"),
            receiver: name("bobby"),
            escrow_id: 1,
            abd_amount: Asset::new(0, Symbol::Abd),
            aml_amount: Asset::new(1_000, Symbol::Aml),
        };
        assert!(op.validate().is_ok());
        op.receiver = name("judge");
        assert!(op.validate().is_err());
    }
}
