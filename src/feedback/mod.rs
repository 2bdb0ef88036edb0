// SPDX-License-Identifier: MIT
//! Feedback Dispatcher — transient toast notifications.
//!
//! Backed by a `tokio::sync::broadcast` channel so any number of UI
//! subscribers can consume the same stream. `show` is fire-and-forget:
//! it never blocks the sync path, and each toast is independently
//! auto-dismissed by a spawned timer. No coalescing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;

const BUS_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Success,
    Error,
    Info,
}

/// One notification, identified so its dismissal can be matched up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub id: String,
    pub text: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedbackEvent {
    Shown { toast: Toast },
    Dismissed { id: String },
}

/// Clone cheaply — the underlying sender is `Arc`-backed.
#[derive(Clone)]
pub struct FeedbackDispatcher {
    tx: broadcast::Sender<FeedbackEvent>,
    duration: Duration,
}

impl FeedbackDispatcher {
    pub fn new(duration: Duration) -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx, duration }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedbackEvent> {
        self.tx.subscribe()
    }

    /// Emit a toast and schedule its dismissal. Returns the toast id.
    pub fn show(&self, text: impl Into<String>, severity: Severity) -> String {
        let toast = Toast {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            severity,
            created_at: Utc::now(),
        };
        let id = toast.id.clone();

        // send() errors only when there are 0 subscribers — that's fine.
        let _ = self.tx.send(FeedbackEvent::Shown { toast });

        let tx = self.tx.clone();
        let dismiss_id = id.clone();
        let duration = self.duration;
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(FeedbackEvent::Dismissed { id: dismiss_id });
        });

        id
    }

    pub fn success(&self, text: impl Into<String>) -> String {
        self.show(text, Severity::Success)
    }

    pub fn error(&self, text: impl Into<String>) -> String {
        self.show(text, Severity::Error)
    }

    pub fn info(&self, text: impl Into<String>) -> String {
        self.show(text, Severity::Info)
    }
}
