// SPDX-License-Identifier: MIT
//! Remote Gateway — the consumed contract to the authoritative store.
//!
//! The core never speaks a wire format; it calls this trait and maps the
//! typed failures into its own taxonomy. Two implementations ship with
//! the crate: [`memory::InMemoryGateway`] (tests, demos, failure
//! injection) and [`local::LocalGateway`] (the JSON-blob fallback used
//! when no remote is configured).

pub mod local;
pub mod memory;

use async_trait::async_trait;

use crate::model::{Filter, Patch, Task, TaskPage};

/// Failures a gateway operation can raise. Messages are human-readable;
/// they flow to the user through the feedback dispatcher unchanged.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    /// Network unreachable, non-2xx, malformed response.
    #[error("network error: {0}")]
    Transport(String),
    /// The server no longer has the id — e.g. already deleted by
    /// another client.
    #[error("not found: {0}")]
    NotFound(String),
    /// The server rejected the payload.
    #[error("{0}")]
    Validation(String),
}

/// Opaque credential holder attached to gateway implementations that
/// need one. The core never inspects the contents.
#[derive(Clone, Default)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AuthToken {
    // Never leak the token into logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// Operations against the authoritative task store.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetch one filtered page plus the collection-wide totals.
    async fn list(&self, filter: Filter, page: u32, limit: u32) -> Result<TaskPage, GatewayError>;

    /// Create a task from trimmed text; the server assigns the id.
    async fn create(&self, text: &str) -> Result<Task, GatewayError>;

    /// Apply a partial update, returning the authoritative record.
    async fn update(&self, id: &str, patch: Patch) -> Result<Task, GatewayError>;

    /// Delete one task.
    async fn remove(&self, id: &str) -> Result<(), GatewayError>;

    /// Delete every completed task.
    async fn clear_completed(&self) -> Result<(), GatewayError>;

    /// Apply a patch to the given ids, or to every task when `ids` is
    /// `None`.
    async fn bulk_update(&self, patch: Patch, ids: Option<Vec<String>>)
        -> Result<(), GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_token_debug_never_prints_the_secret() {
        let token = AuthToken::new("hunter2");
        assert_eq!(format!("{:?}", token), "AuthToken(***)");
        assert_eq!(token.as_str(), "hunter2");
    }
}
