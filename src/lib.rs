// SPDX-License-Identifier: MIT
//! todosync — client-resident sync core for a shared task list.
//!
//! Keeps a local canonical cache consistent with a remote authoritative
//! store under three concurrent influences: optimistic user mutations
//! (confirm-or-rollback), authoritative server responses, and realtime
//! push events from other sessions. The crate is a library consumed by
//! a UI layer; rendering, routing and the transport wire format live
//! elsewhere and plug in through the [`gateway::RemoteGateway`] and
//! [`realtime::RealtimeBus`] seams.
//!
//! Typical wiring:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use todosync::{SyncConfig, TaskStore};
//!
//! let store = TaskStore::new(Arc::new(my_gateway), SyncConfig::default());
//! store.attach_realtime(my_bus.subscribe());
//! store.refresh().await?;
//! store.add("buy milk").await?;
//! let page = store.project(todosync::Filter::Active, 1)?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod feedback;
pub mod gateway;
pub mod metrics;
pub mod model;
pub mod projection;
pub mod realtime;
pub mod stats;
pub mod store;
pub mod sync;

pub use config::SyncConfig;
pub use error::SyncError;
pub use feedback::{FeedbackEvent, Severity, Toast};
pub use gateway::{AuthToken, GatewayError, RemoteGateway};
pub use model::{Counts, Filter, Page, Patch, Task, TaskPage};
pub use projection::{PagePolicy, ProjectionError};
pub use realtime::{RealtimeBus, RealtimeEvent};
pub use store::TaskStore;
pub use sync::{MutationIntent, StoreEvent};
