// SPDX-License-Identifier: MIT
//! Sync Engine — turns each user intent into an optimistic-apply /
//! confirm-or-rollback transaction against the canonical cache.
//!
//! Phase 1 (synchronous): validate, apply the new cache state, and
//! register the transaction with a rollback plan scoped to exactly the
//! entities it touched. Phase 2: the gateway round trip — the only
//! suspension point. Phase 3 (synchronous): reconcile the authoritative
//! response, or surgically undo this transaction's own effect.
//!
//! Multiple transactions may be in flight at once; the pending registry
//! is keyed by transaction id, never a single "previous state" slot, so
//! concurrent rollbacks cannot clobber each other's restoration.
//! Realtime events touching an in-flight id are deferred here and
//! replayed after the local resolution (the incoming event is then the
//! most recent writer for that id and wins).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::TaskCache;
use crate::error::SyncError;
use crate::feedback::FeedbackDispatcher;
use crate::gateway::RemoteGateway;
use crate::metrics::StoreMetrics;
use crate::model::{normalize_text, Counts, Filter, Patch, Task};
use crate::realtime::RealtimeEvent;

const CHANGE_BUS_CAPACITY: usize = 256;

const TOAST_ADDED: &str = "Task added";
const TOAST_UPDATED: &str = "Task updated";
const TOAST_DELETED: &str = "Task deleted";
const TOAST_CLEARED: &str = "Completed tasks cleared";
const TOAST_BULK_UPDATED: &str = "Tasks updated";

/// Cache change notification fanned out to UI subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Changed { generation: u64 },
}

/// Transient description of one user intent. Exists only for the
/// duration of its pending round trip; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationIntent {
    Add { temp_id: String, text: String },
    Toggle { id: String, completed: bool },
    Edit { id: String, text: String },
    Delete { id: String },
    ClearCompleted,
    /// Converge every task to one state, decided by "any active exists".
    ToggleAll { completed: bool },
}

impl MutationIntent {
    pub fn kind(&self) -> &'static str {
        match self {
            MutationIntent::Add { .. } => "add",
            MutationIntent::Toggle { .. } => "toggle",
            MutationIntent::Edit { .. } => "edit",
            MutationIntent::Delete { .. } => "delete",
            MutationIntent::ClearCompleted => "clear_completed",
            MutationIntent::ToggleAll { .. } => "toggle_all",
        }
    }
}

/// Exactly how to undo one transaction's optimistic effect. Scoped to
/// the touched entities, not a whole-cache snapshot, so transactions
/// stay independent.
#[derive(Debug, Clone)]
enum RollbackPlan {
    /// Undo an add: drop the locally fabricated record.
    RemoveTemp { temp_id: String },
    /// Undo a field change: put the prior record back (skipped if some
    /// other writer removed the record meanwhile).
    RestoreRecord { prior: Task },
    /// Undo a delete: reinsert at the original position.
    Reinsert { index: usize, task: Task },
    /// Undo a clear: reinsert everything, ascending original positions.
    ReinsertMany { entries: Vec<(usize, Task)> },
    /// Undo a bulk flip: restore each touched task's prior flag.
    RestoreFlags { prior: Vec<(String, bool)> },
}

impl RollbackPlan {
    /// Ids this transaction holds in flight — realtime events for these
    /// are deferred until the transaction resolves.
    fn touched_ids(&self) -> Vec<&str> {
        match self {
            RollbackPlan::RemoveTemp { temp_id } => vec![temp_id],
            RollbackPlan::RestoreRecord { prior } => vec![&prior.id],
            RollbackPlan::Reinsert { task, .. } => vec![&task.id],
            RollbackPlan::ReinsertMany { entries } => {
                entries.iter().map(|(_, t)| t.id.as_str()).collect()
            }
            RollbackPlan::RestoreFlags { prior } => {
                prior.iter().map(|(id, _)| id.as_str()).collect()
            }
        }
    }
}

struct PendingTxn {
    intent: MutationIntent,
    rollback: RollbackPlan,
}

/// Authoritative result of a successful gateway call.
enum Confirmation {
    /// Server-created record replacing the temporary one.
    Created(Task),
    /// Authoritative record replacing the optimistic guess.
    Updated(Task),
    /// No payload (delete / clear / bulk).
    Acknowledged,
}

/// What the engine did with a realtime event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteApply {
    /// Applied to the cache immediately.
    Applied,
    /// Queued behind an in-flight local transaction.
    Deferred,
    /// Caller should run [`SyncEngine::refresh`].
    RefetchNeeded,
    /// Lifecycle event or dead engine — nothing to do.
    Ignored,
}

struct EngineState {
    cache: TaskCache,
    pending: HashMap<Uuid, PendingTxn>,
    deferred: VecDeque<RealtimeEvent>,
    /// An invalidate arrived while transactions were pending; run one
    /// refetch once the last of them resolves.
    invalidate_deferred: bool,
}

impl EngineState {
    fn id_in_flight(&self, id: &str) -> bool {
        self.pending
            .values()
            .any(|txn| txn.rollback.touched_ids().contains(&id))
    }

    fn apply_incremental(&mut self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::TaskCreated { task } | RealtimeEvent::TaskUpdated { task } => {
                self.cache.upsert(task);
            }
            RealtimeEvent::TaskRemoved { id } => {
                self.cache.remove(&id);
            }
            _ => {}
        }
    }
}

pub struct SyncEngine {
    gateway: Arc<dyn RemoteGateway>,
    state: Mutex<EngineState>,
    changes: broadcast::Sender<StoreEvent>,
    feedback: FeedbackDispatcher,
    metrics: Arc<StoreMetrics>,
    /// Cleared on teardown; late-arriving resolutions check it before
    /// touching the cache.
    alive: AtomicBool,
    refresh_limit: u32,
}

impl SyncEngine {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        feedback: FeedbackDispatcher,
        metrics: Arc<StoreMetrics>,
        refresh_limit: u32,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUS_CAPACITY);
        Self {
            gateway,
            state: Mutex::new(EngineState {
                cache: TaskCache::new(),
                pending: HashMap::new(),
                deferred: VecDeque::new(),
                invalidate_deferred: false,
            }),
            changes,
            feedback,
            metrics,
            alive: AtomicBool::new(true),
            refresh_limit,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.changes.subscribe()
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Stop applying late-arriving resolutions and realtime events.
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Snapshot of the full ordered task set.
    pub fn snapshot(&self) -> Vec<Task> {
        self.lock_state().cache.all()
    }

    pub fn counts(&self) -> Counts {
        self.lock_state().cache.counts()
    }

    pub fn generation(&self) -> u64 {
        self.lock_state().cache.generation()
    }

    pub fn pending_count(&self) -> usize {
        self.lock_state().pending.len()
    }

    // ── Mutations ────────────────────────────────────────────────────────

    /// Create a task. Empty text is rejected before any network call; a
    /// duplicate (case- and whitespace-insensitive) is a deliberate
    /// silent no-op.
    pub async fn add(&self, text: &str) -> Result<(), SyncError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(self.reject("task text must not be empty"));
        }

        let temp_id = format!("tmp-{}", Uuid::new_v4());
        let txn_id = {
            let mut st = self.lock_state();
            let normalized = normalize_text(trimmed);
            if st
                .cache
                .tasks()
                .iter()
                .any(|t| normalize_text(&t.text) == normalized)
            {
                debug!(text = trimmed, "duplicate add ignored");
                return Ok(());
            }
            st.cache.upsert(Task::new(temp_id.as_str(), trimmed, false));
            self.register(
                &mut st,
                MutationIntent::Add {
                    temp_id: temp_id.clone(),
                    text: trimmed.to_string(),
                },
                RollbackPlan::RemoveTemp { temp_id },
            )
        };
        self.notify_changed();

        match self.gateway.create(trimmed).await {
            Ok(created) => {
                let refetch = self.confirm(txn_id, Confirmation::Created(created));
                self.metrics.inc_adds();
                self.feedback.success(TOAST_ADDED);
                self.maybe_refetch(refetch).await;
                Ok(())
            }
            Err(e) => self.rolled_back(txn_id, e.into()).await,
        }
    }

    /// Flip one task's `completed`. Unknown id is a no-op.
    pub async fn toggle(&self, id: &str) -> Result<(), SyncError> {
        let (txn_id, target) = {
            let mut st = self.lock_state();
            let Some(prior) = st.cache.get(id).cloned() else {
                debug!(id, "toggle on unknown id — no-op");
                return Ok(());
            };
            let target = !prior.completed;
            let mut updated = prior.clone();
            updated.completed = target;
            st.cache.upsert(updated);
            let txn_id = self.register(
                &mut st,
                MutationIntent::Toggle {
                    id: id.to_string(),
                    completed: target,
                },
                RollbackPlan::RestoreRecord { prior },
            );
            (txn_id, target)
        };
        self.notify_changed();

        match self.gateway.update(id, Patch::completed(target)).await {
            Ok(task) => {
                let refetch = self.confirm(txn_id, Confirmation::Updated(task));
                self.metrics.inc_updates();
                self.feedback.success(TOAST_UPDATED);
                self.maybe_refetch(refetch).await;
                Ok(())
            }
            Err(e) => self.rolled_back(txn_id, e.into()).await,
        }
    }

    /// Reassign one task's text. Empty text and duplicates of another
    /// task's text are rejected before any network call; unknown id is
    /// a no-op.
    pub async fn edit(&self, id: &str, text: &str) -> Result<(), SyncError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(self.reject("task text must not be empty"));
        }

        let txn_id = {
            let mut st = self.lock_state();
            let Some(prior) = st.cache.get(id).cloned() else {
                debug!(id, "edit on unknown id — no-op");
                return Ok(());
            };
            let normalized = normalize_text(trimmed);
            let duplicate = st
                .cache
                .tasks()
                .iter()
                .any(|t| t.id != id && normalize_text(&t.text) == normalized);
            if duplicate {
                drop(st);
                return Err(self.reject("a task with that text already exists"));
            }
            let mut updated = prior.clone();
            updated.text = trimmed.to_string();
            st.cache.upsert(updated);
            self.register(
                &mut st,
                MutationIntent::Edit {
                    id: id.to_string(),
                    text: trimmed.to_string(),
                },
                RollbackPlan::RestoreRecord { prior },
            )
        };
        self.notify_changed();

        match self.gateway.update(id, Patch::text(trimmed)).await {
            Ok(task) => {
                let refetch = self.confirm(txn_id, Confirmation::Updated(task));
                self.metrics.inc_updates();
                self.feedback.success(TOAST_UPDATED);
                self.maybe_refetch(refetch).await;
                Ok(())
            }
            Err(e) => self.rolled_back(txn_id, e.into()).await,
        }
    }

    /// Delete one task. Unknown id is a no-op; a failed call reinserts
    /// the task at its original position.
    pub async fn delete(&self, id: &str) -> Result<(), SyncError> {
        let txn_id = {
            let mut st = self.lock_state();
            let Some((index, task)) = st.cache.remove(id) else {
                debug!(id, "delete on unknown id — no-op");
                return Ok(());
            };
            self.register(
                &mut st,
                MutationIntent::Delete { id: id.to_string() },
                RollbackPlan::Reinsert { index, task },
            )
        };
        self.notify_changed();

        match self.gateway.remove(id).await {
            Ok(()) => {
                let refetch = self.confirm(txn_id, Confirmation::Acknowledged);
                self.metrics.inc_deletes();
                self.feedback.info(TOAST_DELETED);
                self.maybe_refetch(refetch).await;
                Ok(())
            }
            Err(e) => self.rolled_back(txn_id, e.into()).await,
        }
    }

    /// Remove every completed task. No-op when none are completed; a
    /// failed call restores the full prior set.
    pub async fn clear_completed(&self) -> Result<(), SyncError> {
        let txn_id = {
            let mut st = self.lock_state();
            let entries: Vec<(usize, Task)> = st
                .cache
                .tasks()
                .iter()
                .enumerate()
                .filter(|(_, t)| t.completed)
                .map(|(i, t)| (i, t.clone()))
                .collect();
            if entries.is_empty() {
                debug!("clear_completed with nothing completed — no-op");
                return Ok(());
            }
            for (_, task) in &entries {
                st.cache.remove(&task.id);
            }
            self.register(
                &mut st,
                MutationIntent::ClearCompleted,
                RollbackPlan::ReinsertMany { entries },
            )
        };
        self.notify_changed();

        match self.gateway.clear_completed().await {
            Ok(()) => {
                let refetch = self.confirm(txn_id, Confirmation::Acknowledged);
                self.metrics.inc_clears();
                self.feedback.info(TOAST_CLEARED);
                self.maybe_refetch(refetch).await;
                Ok(())
            }
            Err(e) => self.rolled_back(txn_id, e.into()).await,
        }
    }

    /// Converge all tasks to one state: completed if any task is still
    /// active, active if every task is completed. Empty set is a no-op.
    /// The optimistic flip is atomic and the rollback restores every
    /// touched flag, so a failed call never leaves a partial flip.
    pub async fn toggle_all(&self) -> Result<(), SyncError> {
        let (txn_id, target) = {
            let mut st = self.lock_state();
            if st.cache.is_empty() {
                debug!("toggle_all on empty set — no-op");
                return Ok(());
            }
            let target = st.cache.tasks().iter().any(|t| !t.completed);
            let prior: Vec<(String, bool)> = st
                .cache
                .tasks()
                .iter()
                .filter(|t| t.completed != target)
                .map(|t| (t.id.clone(), t.completed))
                .collect();
            for (id, _) in &prior {
                if let Some(task) = st.cache.get(id).cloned() {
                    let mut updated = task;
                    updated.completed = target;
                    st.cache.upsert(updated);
                }
            }
            let txn_id = self.register(
                &mut st,
                MutationIntent::ToggleAll { completed: target },
                RollbackPlan::RestoreFlags { prior },
            );
            (txn_id, target)
        };
        self.notify_changed();

        match self
            .gateway
            .bulk_update(Patch::completed(target), None)
            .await
        {
            Ok(()) => {
                let refetch = self.confirm(txn_id, Confirmation::Acknowledged);
                self.metrics.inc_bulk_updates();
                self.feedback.success(TOAST_BULK_UPDATED);
                self.maybe_refetch(refetch).await;
                Ok(())
            }
            Err(e) => self.rolled_back(txn_id, e.into()).await,
        }
    }

    // ── Refetch ──────────────────────────────────────────────────────────

    /// Fetch the full authoritative set and replace the cache. With
    /// transactions pending, the refetch is deferred until the last of
    /// them resolves (replacing the cache mid-flight would race their
    /// rollback plans).
    pub async fn refresh(&self) -> Result<(), SyncError> {
        {
            let mut st = self.lock_state();
            if !st.pending.is_empty() {
                debug!("refresh deferred behind pending transactions");
                st.invalidate_deferred = true;
                return Ok(());
            }
        }

        match self
            .gateway
            .list(Filter::All, 1, self.refresh_limit)
            .await
        {
            Ok(page) => {
                if !self.is_alive() {
                    return Ok(());
                }
                {
                    let mut st = self.lock_state();
                    // A transaction may have started while we were fetching.
                    if !st.pending.is_empty() {
                        st.invalidate_deferred = true;
                        return Ok(());
                    }
                    st.cache.replace_all(page.items);
                }
                self.notify_changed();
                Ok(())
            }
            Err(e) => {
                let err: SyncError = e.into();
                warn!(err = %err, "refresh failed");
                self.feedback.error(err.to_string());
                Err(err)
            }
        }
    }

    // ── Realtime ─────────────────────────────────────────────────────────

    /// Apply one realtime event, deferring it if it touches an id with
    /// an in-flight local transaction.
    pub fn apply_remote(&self, event: RealtimeEvent) -> RemoteApply {
        if !self.is_alive() {
            return RemoteApply::Ignored;
        }
        let outcome = {
            let mut st = self.lock_state();
            match &event {
                RealtimeEvent::Connected | RealtimeEvent::Disconnected => RemoteApply::Ignored,
                RealtimeEvent::Invalidate => {
                    if st.pending.is_empty() {
                        RemoteApply::RefetchNeeded
                    } else {
                        debug!("invalidate deferred behind pending transactions");
                        st.invalidate_deferred = true;
                        RemoteApply::Deferred
                    }
                }
                RealtimeEvent::TaskCreated { task } | RealtimeEvent::TaskUpdated { task } => {
                    if st.id_in_flight(&task.id) {
                        debug!(id = %task.id, "realtime event deferred behind local mutation");
                        st.deferred.push_back(event.clone());
                        RemoteApply::Deferred
                    } else {
                        st.apply_incremental(event.clone());
                        self.metrics.inc_realtime_applied();
                        RemoteApply::Applied
                    }
                }
                RealtimeEvent::TaskRemoved { id } => {
                    if st.id_in_flight(id) {
                        debug!(id = %id, "realtime remove deferred behind local mutation");
                        st.deferred.push_back(event.clone());
                        RemoteApply::Deferred
                    } else {
                        st.apply_incremental(event.clone());
                        self.metrics.inc_realtime_applied();
                        RemoteApply::Applied
                    }
                }
            }
        };
        if outcome == RemoteApply::Applied {
            self.notify_changed();
        }
        outcome
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn lock_state(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().expect("engine state poisoned")
    }

    /// Surface a validation rejection: nothing was applied, so there is
    /// nothing to roll back.
    fn reject(&self, msg: &str) -> SyncError {
        let err = SyncError::Validation(msg.to_string());
        self.feedback.error(err.to_string());
        err
    }

    fn register(
        &self,
        st: &mut EngineState,
        intent: MutationIntent,
        rollback: RollbackPlan,
    ) -> Uuid {
        let txn_id = Uuid::new_v4();
        debug!(txn = %txn_id, kind = intent.kind(), "optimistic apply");
        st.pending.insert(txn_id, PendingTxn { intent, rollback });
        txn_id
    }

    /// Phase 3, success path. Returns whether a deferred refetch is due.
    fn confirm(&self, txn_id: Uuid, confirmation: Confirmation) -> bool {
        if !self.is_alive() {
            return false;
        }
        let refetch = {
            let mut st = self.lock_state();
            let Some(txn) = st.pending.remove(&txn_id) else {
                return false;
            };
            match confirmation {
                Confirmation::Created(task) => {
                    if let MutationIntent::Add { temp_id, .. } = &txn.intent {
                        match st.cache.remove(temp_id) {
                            Some((index, _)) => st.cache.insert_at(index, task),
                            // Temp record already gone — e.g. our own create
                            // echoed back through the realtime channel.
                            None => st.cache.upsert(task),
                        }
                    }
                }
                Confirmation::Updated(task) => st.cache.upsert(task),
                Confirmation::Acknowledged => {}
            }
            debug!(txn = %txn_id, kind = txn.intent.kind(), "confirmed");
            self.drain_deferred(&mut st)
        };
        self.notify_changed();
        refetch
    }

    /// Phase 3, failure path: roll back, toast, and hand the error back
    /// to the caller.
    async fn rolled_back(&self, txn_id: Uuid, err: SyncError) -> Result<(), SyncError> {
        if !self.is_alive() {
            return Err(err);
        }
        let refetch = {
            let mut st = self.lock_state();
            let Some(txn) = st.pending.remove(&txn_id) else {
                return Err(err);
            };
            warn!(txn = %txn_id, kind = txn.intent.kind(), err = %err, "mutation failed — rolling back");
            Self::apply_rollback(&mut st, txn.rollback);
            self.drain_deferred(&mut st)
        };
        self.metrics.inc_rollbacks();
        self.notify_changed();
        self.feedback.error(err.to_string());
        self.maybe_refetch(refetch).await;
        Err(err)
    }

    fn apply_rollback(st: &mut EngineState, plan: RollbackPlan) {
        match plan {
            RollbackPlan::RemoveTemp { temp_id } => {
                st.cache.remove(&temp_id);
            }
            RollbackPlan::RestoreRecord { prior } => {
                // Skip if another writer removed the record meanwhile;
                // restoring it would resurrect a deleted task.
                if st.cache.contains(&prior.id) {
                    st.cache.upsert(prior);
                }
            }
            RollbackPlan::Reinsert { index, task } => {
                st.cache.insert_at(index, task);
            }
            RollbackPlan::ReinsertMany { entries } => {
                // Ascending original positions restore the exact order.
                for (index, task) in entries {
                    st.cache.insert_at(index, task);
                }
            }
            RollbackPlan::RestoreFlags { prior } => {
                for (id, completed) in prior {
                    if let Some(task) = st.cache.get(&id).cloned() {
                        let mut restored = task;
                        restored.completed = completed;
                        st.cache.upsert(restored);
                    }
                }
            }
        }
    }

    /// Replay deferred events whose ids are no longer in flight.
    /// Returns whether a deferred invalidate is now due.
    fn drain_deferred(&self, st: &mut EngineState) -> bool {
        let queued = std::mem::take(&mut st.deferred);
        for event in queued {
            let still_in_flight = event
                .touched_id()
                .is_some_and(|id| st.id_in_flight(id));
            if still_in_flight {
                st.deferred.push_back(event);
            } else {
                debug!(event = ?event.touched_id(), "replaying deferred realtime event");
                st.apply_incremental(event);
                self.metrics.inc_realtime_applied();
            }
        }
        if st.pending.is_empty() && st.invalidate_deferred {
            st.invalidate_deferred = false;
            return true;
        }
        false
    }

    /// Run the refetch a deferred invalidate asked for. Errors were
    /// already surfaced by `refresh`.
    async fn maybe_refetch(&self, due: bool) {
        if due {
            let _ = self.refresh().await;
        }
    }

    fn notify_changed(&self) {
        let generation = self.lock_state().cache.generation();
        // send() errors only when there are 0 subscribers — that's fine.
        let _ = self.changes.send(StoreEvent::Changed { generation });
    }
}
