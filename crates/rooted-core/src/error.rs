// SPDX-License-Identifier: AGPL-3.0-only
//! Rejection reasons surfaced by the launch contracts.
//!
//! `Display` is the exact reason string callers match on ("Owner only",
//! "Distribution not active", ...). Host-level failures (balances, AMM) are
//! wrapped unchanged.

use rooted_vm::{Address, VmError};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    /// Caller is not the owner / bound controller for this entry point.
    #[error("{0}")]
    Unauthorized(&'static str),
    /// Entry point called outside its lifecycle window.
    #[error("{0}")]
    InvalidState(&'static str),
    #[error("{0}")]
    InvalidInput(&'static str),
    /// Missing supply, nothing to pay, nothing to claim.
    #[error("{0}")]
    Precondition(&'static str),
    #[error("{0}")]
    AlreadyClaimed(&'static str),
    #[error("Unknown contract {0}")]
    UnknownContract(Address),
    #[error("Config error: {0}")]
    Config(String),
    #[error(transparent)]
    Vm(#[from] VmError),
}

impl LaunchError {
    /// The bare reason string (same as `to_string()`).
    pub fn reason(&self) -> String {
        self.to_string()
    }
}
