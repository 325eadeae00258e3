//! Custom operations: application-defined payloads that consensus
//! carries but does not interpret.
//!
//! Validation and authority checks happen before dispatch; applying one
//! touches no state. Downstream consumers pick the payloads up through
//! the operation notification stream.

use amalgam_protocol::operations::{CustomBinaryOp, CustomJsonOp, CustomOp};

use crate::error::ChainError;
use crate::state::State;

pub(super) fn custom(_state: &mut State, _op: &CustomOp) -> Result<(), ChainError> {
    Ok(())
}

pub(super) fn custom_json(_state: &mut State, _op: &CustomJsonOp) -> Result<(), ChainError> {
    Ok(())
}

pub(super) fn custom_binary(_state: &mut State, _op: &CustomBinaryOp) -> Result<(), ChainError> {
    Ok(())
}
