// SPDX-License-Identifier: MIT
//! Background-computed derived data: stats and CSV export.
//!
//! These run on the blocking pool so a large export never stalls the
//! event loop. Results are advisory — the cache may have moved on by
//! the time they arrive; callers recompute on demand when staleness
//! matters.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::model::Task;

/// Derived totals over a task snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

/// Count totals over a snapshot.
pub fn compute_stats(tasks: &[Task]) -> TaskStats {
    let total = tasks.len();
    let completed = tasks.iter().filter(|t| t.completed).count();
    TaskStats {
        total,
        active: total - completed,
        completed,
    }
}

/// Render a snapshot as CSV: header `id,text,completed`, text quoted
/// with `""` escaping.
pub fn export_csv(tasks: &[Task]) -> String {
    let mut lines = Vec::with_capacity(tasks.len() + 1);
    lines.push("id,text,completed".to_string());
    for task in tasks {
        let text = task.text.replace('"', "\"\"");
        lines.push(format!("{},\"{}\",{}", task.id, text, task.completed));
    }
    lines.join("\n")
}

/// Compute stats off the hot path.
pub async fn compute_stats_blocking(tasks: Vec<Task>) -> Result<TaskStats> {
    tokio::task::spawn_blocking(move || compute_stats(&tasks))
        .await
        .context("stats worker failed")
}

/// Render CSV off the hot path.
pub async fn export_csv_blocking(tasks: Vec<Task>) -> Result<String> {
    tokio::task::spawn_blocking(move || export_csv(&tasks))
        .await
        .context("export worker failed")
}
