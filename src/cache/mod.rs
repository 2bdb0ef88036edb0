// SPDX-License-Identifier: MIT
//! Canonical Cache — the single in-memory source of truth for all known
//! task records on this client.
//!
//! The cache itself is a plain data structure with synchronous,
//! deterministic mutators; the owning [`TaskStore`](crate::store::TaskStore)
//! serializes access behind one lock so no mutation can interleave its
//! reads with another's writes. Ordering is newest-first: a task unknown
//! to the cache is prepended on upsert.

use crate::model::{Counts, Task};

/// Ordered set of task records, keyed by id. No two entries ever share
/// an id.
#[derive(Debug, Default)]
pub struct TaskCache {
    tasks: Vec<Task>,
    /// Bumped on every mutation; lets readers detect staleness cheaply.
    generation: u64,
}

impl TaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from an already-ordered task list. Later duplicates
    /// of an id are dropped.
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut cache = Self::new();
        cache.replace_all(tasks);
        cache.generation = 0;
        cache
    }

    /// Snapshot of the full ordered set.
    pub fn all(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    /// Borrowed view for read-only passes (projection, duplicate scan).
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Idempotent insert-or-replace: an existing id is replaced in place
    /// (full record, keeping its position); an unknown id is prepended.
    pub fn upsert(&mut self, task: Task) {
        match self.position(&task.id) {
            Some(i) => self.tasks[i] = task,
            None => self.tasks.insert(0, task),
        }
        self.generation += 1;
    }

    /// Remove a task, returning it with the position it occupied so a
    /// rollback can reinsert it exactly where it was.
    pub fn remove(&mut self, id: &str) -> Option<(usize, Task)> {
        let i = self.position(id)?;
        let task = self.tasks.remove(i);
        self.generation += 1;
        Some((i, task))
    }

    /// Reinsert a task at a given position (clamped to the current
    /// length). If the id is already present — e.g. a realtime event
    /// recreated it while a rollback was pending — the existing record
    /// is replaced in place instead, preserving the no-duplicate-id
    /// invariant.
    pub fn insert_at(&mut self, index: usize, task: Task) {
        match self.position(&task.id) {
            Some(i) => self.tasks[i] = task,
            None => self.tasks.insert(index.min(self.tasks.len()), task),
        }
        self.generation += 1;
    }

    /// Replace the entire set, preserving the given order. Later
    /// duplicates of an id are dropped.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        let mut seen = std::collections::HashSet::new();
        self.tasks = tasks
            .into_iter()
            .filter(|t| seen.insert(t.id.clone()))
            .collect();
        self.generation += 1;
    }

    /// Derived totals, recomputed on demand.
    pub fn counts(&self) -> Counts {
        let total = self.tasks.len();
        let completed = self.tasks.iter().filter(|t| t.completed).count();
        Counts {
            total,
            active: total - completed,
            completed,
        }
    }
}
