// SPDX-License-Identifier: MIT
//! Realtime Channel — push events from other sessions.
//!
//! The channel delivers unsolicited notifications, independent of any
//! local request/response: incremental record patches, a coarse
//! `invalidate` ("refetch everything"), and connection lifecycle
//! events. [`RealtimeBus`] is the standard producer; any
//! `broadcast::Receiver<RealtimeEvent>` can feed the reconciler, so a
//! transport adapter only needs to translate its frames into this enum.

pub mod reconciler;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::Task;

/// Capacity of the broadcast channel. Slow consumers lag and the
/// reconciler recovers with a full refetch.
const BUS_CAPACITY: usize = 256;

/// Events pushed by the server or the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// Transport (re)connected.
    Connected,
    /// Transport dropped; events may have been missed.
    Disconnected,
    /// Another client created a task.
    TaskCreated { task: Task },
    /// Another client changed a task; the payload is authoritative.
    TaskUpdated { task: Task },
    /// Another client removed a task.
    TaskRemoved { id: String },
    /// The local cache may be arbitrarily stale — refetch in full.
    Invalidate,
}

impl RealtimeEvent {
    /// The task id an incremental event touches, if any.
    pub fn touched_id(&self) -> Option<&str> {
        match self {
            RealtimeEvent::TaskCreated { task } | RealtimeEvent::TaskUpdated { task } => {
                Some(&task.id)
            }
            RealtimeEvent::TaskRemoved { id } => Some(id),
            _ => None,
        }
    }
}

/// Shared broadcast bus for realtime events.
///
/// Clone cheaply — the underlying `broadcast::Sender` is `Arc`-backed.
#[derive(Clone)]
pub struct RealtimeBus {
    sender: broadcast::Sender<RealtimeEvent>,
}

impl RealtimeBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the event stream. Only events emitted after the
    /// call are received.
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all current subscribers.
    ///
    /// Silently drops the event if there are no subscribers (no error).
    pub fn emit(&self, event: RealtimeEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for RealtimeBus {
    fn default() -> Self {
        Self::new()
    }
}
