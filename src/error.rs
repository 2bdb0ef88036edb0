// SPDX-License-Identifier: MIT
//! Public error taxonomy for the sync core.

use crate::gateway::GatewayError;

/// Errors surfaced by store mutations.
///
/// `Validation` is rejected before any network call — nothing was applied,
/// so there is nothing to roll back. `Transport` and `NotFound` arrive from
/// the gateway after an optimistic apply and always follow a full rollback
/// of that transaction's effect.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{0}")]
    Validation(String),
    #[error("network error: {0}")]
    Transport(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<GatewayError> for SyncError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transport(msg) => SyncError::Transport(msg),
            GatewayError::NotFound(id) => SyncError::NotFound(id),
            GatewayError::Validation(msg) => SyncError::Validation(msg),
        }
    }
}
