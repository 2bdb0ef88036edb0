// SPDX-License-Identifier: MIT
//! Realtime Reconciler — drives channel events into the sync engine.
//!
//! A spawned loop owning one broadcast receiver. Incremental events go
//! through [`SyncEngine::apply_remote`], which handles deferral behind
//! in-flight local mutations; `invalidate` (and a reconnect, and a
//! lagged receiver — both mean events were missed) trigger a full
//! refetch.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::RealtimeEvent;
use crate::sync::{RemoteApply, SyncEngine};

/// Spawn the reconciler loop. The handle is aborted on store shutdown;
/// the loop also exits on its own once the engine is torn down or the
/// channel closes.
pub fn spawn(
    engine: Arc<SyncEngine>,
    mut events: broadcast::Receiver<RealtimeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut was_disconnected = false;
        loop {
            match events.recv().await {
                Ok(event) => {
                    if !engine.is_alive() {
                        break;
                    }
                    handle(&engine, event, &mut was_disconnected).await;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "realtime receiver lagged — refetching in full");
                    let _ = engine.refresh().await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("reconciler stopped");
    })
}

async fn handle(engine: &SyncEngine, event: RealtimeEvent, was_disconnected: &mut bool) {
    match event {
        RealtimeEvent::Disconnected => {
            debug!("realtime channel disconnected");
            *was_disconnected = true;
        }
        RealtimeEvent::Connected => {
            // A reconnect means pushes were missed; treat it as invalidate.
            if std::mem::take(was_disconnected) {
                debug!("realtime channel reconnected — refetching in full");
                run_invalidate(engine).await;
            }
        }
        RealtimeEvent::Invalidate => run_invalidate(engine).await,
        incremental => {
            engine.apply_remote(incremental);
        }
    }
}

async fn run_invalidate(engine: &SyncEngine) {
    if engine.apply_remote(RealtimeEvent::Invalidate) == RemoteApply::RefetchNeeded {
        // Failures are already toasted inside refresh.
        let _ = engine.refresh().await;
    }
}
