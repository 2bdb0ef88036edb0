// SPDX-License-Identifier: MIT
//! In-process reference gateway.
//!
//! Behaves like the real authoritative store over an in-memory vec, with
//! two test affordances: scripted failures (`fail_next`) and a pause
//! gate (`pause` / `resume`) that holds every call until released, for
//! exercising in-flight interleavings deterministically.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use super::{GatewayError, RemoteGateway};
use crate::model::{Filter, Patch, Task, TaskPage};

#[derive(Clone)]
pub struct InMemoryGateway {
    tasks: Arc<Mutex<Vec<Task>>>,
    failures: Arc<Mutex<VecDeque<GatewayError>>>,
    paused: Arc<watch::Sender<bool>>,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            tasks: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(VecDeque::new())),
            paused: Arc::new(paused),
        }
    }

    pub async fn seed(&self, tasks: Vec<Task>) {
        *self.tasks.lock().await = tasks;
    }

    /// Snapshot of the authoritative set, newest first.
    pub async fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().await.clone()
    }

    /// Queue an error; the next gateway call consumes it and fails.
    pub async fn fail_next(&self, err: GatewayError) {
        self.failures.lock().await.push_back(err);
    }

    /// Hold every subsequent call until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    async fn gate(&self) -> Result<(), GatewayError> {
        let mut rx = self.paused.subscribe();
        rx.wait_for(|paused| !*paused)
            .await
            .map_err(|_| GatewayError::Transport("gateway shut down".into()))?;
        if let Some(err) = self.failures.lock().await.pop_front() {
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteGateway for InMemoryGateway {
    async fn list(&self, filter: Filter, page: u32, limit: u32) -> Result<TaskPage, GatewayError> {
        self.gate().await?;
        let tasks = self.tasks.lock().await;
        let completed_total = tasks.iter().filter(|t| t.completed).count();
        let active_total = tasks.len() - completed_total;
        let filtered: Vec<Task> = tasks
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
        self.gate().await?;
        if text.trim().is_empty() {
            return Err(GatewayError::Validation("text must not be empty".into()));
        }
        let task = Task::new(uuid::Uuid::new_v4().to_string(), text.trim(), false);
        self.tasks.lock().await.insert(0, task.clone());
        Ok(task)
    }

    async fn update(&self, id: &str, patch: Patch) -> Result<Task, GatewayError> {
        self.gate().await?;
        if patch.is_empty() {
            return Err(GatewayError::Validation("empty patch".into()));
        }
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        patch.apply_to(task);
        Ok(task.clone())
    }

    async fn remove(&self, id: &str) -> Result<(), GatewayError> {
        self.gate().await?;
        let mut tasks = self.tasks.lock().await;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Err(GatewayError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn clear_completed(&self) -> Result<(), GatewayError> {
        self.gate().await?;
        self.tasks.lock().await.retain(|t| !t.completed);
        Ok(())
    }

    async fn bulk_update(
        &self,
        patch: Patch,
        ids: Option<Vec<String>>,
    ) -> Result<(), GatewayError> {
        self.gate().await?;
        if patch.is_empty() {
            return Err(GatewayError::Validation("empty patch".into()));
        }
        let mut tasks = self.tasks.lock().await;
        for task in tasks.iter_mut() {
            let selected = ids.as_ref().map_or(true, |ids| ids.contains(&task.id));
            if selected {
                patch.apply_to(task);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_reports_setwide_totals_and_filtered_total() {
        let gw = InMemoryGateway::new();
        gw.seed(vec![
            Task::new("a", "one", false),
            Task::new("b", "two", true),
            Task::new("c", "three", true),
        ])
        .await;

        let page = gw.list(Filter::Completed, 1, 10).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.active_total, 1);
        assert_eq!(page.completed_total, 2);
        assert_eq!(page.items.len(), 2);
    }

    #[tokio::test]
    async fn create_assigns_a_fresh_id_and_prepends() {
        let gw = InMemoryGateway::new();
        gw.seed(vec![Task::new("a", "old", false)]).await;
        let created = gw.create("  new task  ").await.unwrap();
        assert_eq!(created.text, "new task");
        assert!(!created.id.is_empty());
        let tasks = gw.tasks().await;
        assert_eq!(tasks[0].id, created.id);
    }

    #[tokio::test]
    async fn scripted_failure_fires_once() {
        let gw = InMemoryGateway::new();
        gw.fail_next(GatewayError::Transport("down".into())).await;
        assert!(gw.create("x").await.is_err());
        assert!(gw.create("x").await.is_ok());
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let gw = InMemoryGateway::new();
        let err = gw.update("ghost", Patch::completed(true)).await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(_)));
    }

    #[tokio::test]
    async fn pause_holds_calls_until_resume() {
        let gw = InMemoryGateway::new();
        gw.pause();
        let gw2 = gw.clone();
        let call = tokio::spawn(async move { gw2.create("held").await });
        // The call must still be pending while paused.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!call.is_finished());
        gw.resume();
        assert!(call.await.unwrap().is_ok());
    }
}
