// SPDX-License-Identifier: MIT
//! Session-scoped store façade.
//!
//! One `TaskStore` is constructed per session and torn down on
//! logout/unmount. It wires the sync engine, feedback bus, metrics and
//! reconciler together and is the only surface the UI layer talks to:
//! subscribe to change notifications, read projections, invoke
//! mutations. The canonical cache is owned by the engine; nothing
//! outside the engine and the reconciler writes to it.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::feedback::{FeedbackDispatcher, FeedbackEvent};
use crate::gateway::local::LocalGateway;
use crate::gateway::RemoteGateway;
use crate::metrics::{MetricsSnapshot, StoreMetrics};
use crate::model::{Counts, Filter, Page, Task};
use crate::projection::{self, ProjectionError};
use crate::realtime::{reconciler, RealtimeEvent};
use crate::stats::{self, TaskStats};
use crate::sync::{StoreEvent, SyncEngine};

pub struct TaskStore {
    engine: Arc<SyncEngine>,
    feedback: FeedbackDispatcher,
    config: SyncConfig,
    metrics: Arc<StoreMetrics>,
    reconciler: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStore").finish_non_exhaustive()
    }
}

impl TaskStore {
    /// Build a store over any gateway implementation.
    pub fn new(gateway: Arc<dyn RemoteGateway>, config: SyncConfig) -> Self {
        let feedback = FeedbackDispatcher::new(config.toast_duration());
        let metrics = Arc::new(StoreMetrics::new());
        let engine = Arc::new(SyncEngine::new(
            gateway,
            feedback.clone(),
            metrics.clone(),
            config.refresh_limit,
        ));
        Self {
            engine,
            feedback,
            config,
            metrics,
            reconciler: Mutex::new(None),
        }
    }

    /// Build a store over the local JSON-blob gateway named by
    /// `config.data_path` — the "no remote configured" mode.
    pub async fn with_local_fallback(config: SyncConfig) -> Result<Self> {
        let path = config
            .data_path
            .clone()
            .context("config.data_path is required for the local fallback")?;
        let gateway = LocalGateway::open(path).await?;
        Ok(Self::new(Arc::new(gateway), config))
    }

    // ── Subscriptions ────────────────────────────────────────────────────

    /// Cache change notifications. Re-project after each one.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.engine.subscribe()
    }

    /// Toast stream (shown + auto-dismissed).
    pub fn toasts(&self) -> broadcast::Receiver<FeedbackEvent> {
        self.feedback.subscribe()
    }

    /// Attach a realtime channel; events flow into the cache through
    /// the reconciler. Re-attaching replaces the previous channel.
    pub fn attach_realtime(&self, events: broadcast::Receiver<RealtimeEvent>) {
        let handle = reconciler::spawn(self.engine.clone(), events);
        let mut slot = self.reconciler.lock().expect("reconciler slot poisoned");
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    // ── Reads ────────────────────────────────────────────────────────────

    /// Snapshot of the full ordered task set.
    pub fn all(&self) -> Vec<Task> {
        self.engine.snapshot()
    }

    pub fn counts(&self) -> Counts {
        self.engine.counts()
    }

    /// Project the visible page with the configured page size and page
    /// policy.
    pub fn project(&self, filter: Filter, page: u32) -> Result<Page, ProjectionError> {
        self.project_with(filter, page, self.config.page_size)
    }

    /// Project with an explicit page size (policy still from config).
    pub fn project_with(
        &self,
        filter: Filter,
        page: u32,
        limit: u32,
    ) -> Result<Page, ProjectionError> {
        let snapshot = self.engine.snapshot();
        projection::project(&snapshot, filter, page, limit, self.config.page_policy)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Advisory stats computed on the blocking pool; may be stale by
    /// arrival.
    pub async fn stats(&self) -> Result<TaskStats> {
        stats::compute_stats_blocking(self.engine.snapshot()).await
    }

    /// CSV export of the current snapshot, computed on the blocking pool.
    pub async fn export_csv(&self) -> Result<String> {
        stats::export_csv_blocking(self.engine.snapshot()).await
    }

    // ── Mutations ────────────────────────────────────────────────────────

    /// Fetch the authoritative set and replace the cache. Used for the
    /// initial load and after invalidate.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        self.engine.refresh().await
    }

    pub async fn add(&self, text: &str) -> Result<(), SyncError> {
        self.engine.add(text).await
    }

    pub async fn toggle(&self, id: &str) -> Result<(), SyncError> {
        self.engine.toggle(id).await
    }

    pub async fn edit(&self, id: &str, text: &str) -> Result<(), SyncError> {
        self.engine.edit(id, text).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
        self.engine.delete(id).await
    }

    pub async fn clear_completed(&self) -> Result<(), SyncError> {
        self.engine.clear_completed().await
    }

    pub async fn toggle_all(&self) -> Result<(), SyncError> {
        self.engine.toggle_all().await
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Tear the session down: stop the reconciler and drop any
    /// late-arriving mutation resolutions. Idempotent.
    pub fn shutdown(&self) {
        if self.engine.is_alive() {
            info!("task store shutting down");
        }
        self.engine.shutdown();
        if let Some(handle) = self
            .reconciler
            .lock()
            .expect("reconciler slot poisoned")
            .take()
        {
            handle.abort();
        }
    }
}

impl Drop for TaskStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
