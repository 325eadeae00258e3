//! Two-phase account recovery and voting-rights surrender.
//!
//! Recovery takes both the account's recovery partner and proof of a
//! recent owner key: the partner files a request naming the new owner
//! authority, then the account holder confirms it by signing with both
//! the new authority and a recent one.

use amalgam_types::AccountName;
use serde::{Deserialize, Serialize};

use super::check_account_name;
use crate::authority::Authority;
use crate::error::ProtocolError;

/// Filed by the recovery partner on behalf of a compromised account.
/// Expires after a day if not acted on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequestAccountRecoveryOp {
    pub recovery_account: AccountName,
    pub account_to_recover: AccountName,
    /// The owner authority the account will have after recovery. Listing
    /// it here commits to it without yet revealing any signature.
    pub new_owner_authority: Authority,
}

impl RequestAccountRecoveryOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.recovery_account)?;
        check_account_name(&self.account_to_recover)?;
        self.new_owner_authority.validate()
    }
}

/// Completes a pending recovery request. Must be signed by both the new
/// owner authority and an owner authority used within the recent-history
/// window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecoverAccountOp {
    pub account_to_recover: AccountName,
    pub new_owner_authority: Authority,
    pub recent_owner_authority: Authority,
}

impl RecoverAccountOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.account_to_recover)?;
        if self.new_owner_authority == self.recent_owner_authority {
            return Err(ProtocolError::validation(
                "new owner authority must differ from the recent one",
            ));
        }
        if self.new_owner_authority.is_impossible() {
            return Err(ProtocolError::validation(
                "new owner authority cannot be impossible",
            ));
        }
        if self.recent_owner_authority.is_impossible() {
            return Err(ProtocolError::validation(
                "recent owner authority cannot be impossible",
            ));
        }
        if self.new_owner_authority.weight_threshold == 0 {
            return Err(ProtocolError::validation(
                "new owner authority cannot be trivial",
            ));
        }
        self.new_owner_authority.validate()?;
        self.recent_owner_authority.validate()
    }
}

/// Designate which account may file recovery requests in the future.
/// Takes effect after the owner-history window has elapsed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecoveryAccountOp {
    pub account_to_recover: AccountName,
    pub new_recovery_account: AccountName,
}

impl ChangeRecoveryAccountOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.account_to_recover)?;
        check_account_name(&self.new_recovery_account)
    }
}

/// Irrevocably give up witness voting, proxying and vote-carrying power.
/// Takes effect after a delay; `decline = false` cancels a pending
/// request within that window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeclineVotingRightsOp {
    pub account: AccountName,
    pub decline: bool,
}

impl DeclineVotingRightsOp {
    pub fn validate(&self) -> Result<(), ProtocolError> {
        check_account_name(&self.account)
    }
}
