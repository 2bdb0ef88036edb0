// SPDX-License-Identifier: MIT
//! Local fallback gateway — a JSON blob on disk.
//!
//! When no remote is configured, this substitutes for the authoritative
//! store: one document holding the full task list, the user's current
//! filter, and a save timestamp. Read once on open, rewritten after
//! every mutation it serves. It is an implementation of the gateway
//! contract, not part of the core's contract surface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use super::{GatewayError, RemoteGateway};
use crate::model::{Filter, Patch, Task, TaskPage};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Blob {
    tasks: Vec<Task>,
    #[serde(default)]
    filter: Filter,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
}

pub struct LocalGateway {
    path: PathBuf,
    state: Arc<Mutex<Blob>>,
}

impl LocalGateway {
    /// Open the blob at `path`, starting empty if the file is absent.
    /// A malformed blob is logged and replaced rather than failing the
    /// session.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let blob = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Blob>(&bytes) {
                Ok(blob) => blob,
                Err(e) => {
                    warn!(path = %path.display(), err = %e, "malformed task blob — starting empty");
                    Blob::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Blob::default(),
            Err(e) => return Err(e).context("reading task blob"),
        };
        Ok(Self {
            path,
            state: Arc::new(Mutex::new(blob)),
        })
    }

    /// The filter persisted with the blob (defaults to `All`).
    pub async fn load_filter(&self) -> Filter {
        self.state.lock().await.filter
    }

    pub async fn save_filter(&self, filter: Filter) -> Result<()> {
        let mut blob = self.state.lock().await;
        blob.filter = filter;
        self.persist(&mut blob).await
    }

    async fn persist(&self, blob: &mut Blob) -> Result<()> {
        blob.saved_at = Some(Utc::now());
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(&*blob)?;
        let mut file = tokio::fs::File::create(&self.path)
            .await
            .context("creating task blob")?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }
}

fn transport(err: anyhow::Error) -> GatewayError {
    GatewayError::Transport(format!("{err:#}"))
}

#[async_trait]
impl RemoteGateway for LocalGateway {
    async fn list(&self, filter: Filter, page: u32, limit: u32) -> Result<TaskPage, GatewayError> {
        let blob = self.state.lock().await;
        let completed_total = blob.tasks.iter().filter(|t| t.completed).count();
        let active_total = blob.tasks.len() - completed_total;
        let filtered: Vec<Task> = blob
            .tasks
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        let total = filtered.len();
        let start = (page.saturating_sub(1) * limit) as usize;
        let items = filtered
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .collect();
        Ok(TaskPage {
            items,
            total,
            page,
            limit,
            active_total,
            completed_total,
        })
    }

    async fn create(&self, text: &str) -> Result<Task, GatewayError> {
        if text.trim().is_empty() {
            return Err(GatewayError::Validation("text must not be empty".into()));
        }
        let task = Task::new(uuid::Uuid::new_v4().to_string(), text.trim(), false);
        let mut blob = self.state.lock().await;
        blob.tasks.insert(0, task.clone());
        self.persist(&mut blob).await.map_err(transport)?;
        Ok(task)
    }

    async fn update(&self, id: &str, patch: Patch) -> Result<Task, GatewayError> {
        if patch.is_empty() {
            return Err(GatewayError::Validation("empty patch".into()));
        }
        let mut blob = self.state.lock().await;
        let task = blob
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        patch.apply_to(task);
        let updated = task.clone();
        self.persist(&mut blob).await.map_err(transport)?;
        Ok(updated)
    }

    async fn remove(&self, id: &str) -> Result<(), GatewayError> {
        let mut blob = self.state.lock().await;
        let before = blob.tasks.len();
        blob.tasks.retain(|t| t.id != id);
        if blob.tasks.len() == before {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        self.persist(&mut blob).await.map_err(transport)
    }

    async fn clear_completed(&self) -> Result<(), GatewayError> {
        let mut blob = self.state.lock().await;
        blob.tasks.retain(|t| !t.completed);
        self.persist(&mut blob).await.map_err(transport)
    }

    async fn bulk_update(
        &self,
        patch: Patch,
        ids: Option<Vec<String>>,
    ) -> Result<(), GatewayError> {
        if patch.is_empty() {
            return Err(GatewayError::Validation("empty patch".into()));
        }
        let mut blob = self.state.lock().await;
        for task in blob.tasks.iter_mut() {
            let selected = ids.as_ref().map_or(true, |ids| ids.contains(&task.id));
            if selected {
                patch.apply_to(task);
            }
        }
        self.persist(&mut blob).await.map_err(transport)
    }
}
