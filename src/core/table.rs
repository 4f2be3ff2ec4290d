//! # TaskTable - ref-indexed registry of live tasks.
//!
//! Each scope owns one table; only the owning scope mutates it. The
//! secondary scope-id filter exists because aborting walks "every task
//! of this scope", and the authority's teardown clears tables wholesale
//! after the scopes themselves are disposed.

use std::sync::Arc;

use dashmap::DashMap;

use crate::ids::{Ref, ScopeId};

use super::task::Task;

/// `Ref -> Task` map with secondary filtering by scope id.
pub struct TaskTable {
    tasks: DashMap<Ref, Arc<Task>>,
}

impl TaskTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    /// Registers a task under its ref.
    pub fn register(&self, task: Arc<Task>) {
        self.tasks.insert(task.task_ref().clone(), task);
    }

    /// Removes and returns the task with the given ref.
    pub fn unregister(&self, task_ref: &Ref) -> Option<Arc<Task>> {
        self.tasks.remove(task_ref).map(|(_, task)| task)
    }

    /// Looks a task up by ref.
    pub fn get(&self, task_ref: &Ref) -> Option<Arc<Task>> {
        self.tasks.get(task_ref).map(|e| Arc::clone(e.value()))
    }

    /// True when a task with the given ref is registered.
    pub fn has(&self, task_ref: &Ref) -> bool {
        self.tasks.contains_key(task_ref)
    }

    /// All registered tasks of the given scope.
    pub fn get_by_scope(&self, scope_id: &ScopeId) -> Vec<Arc<Task>> {
        self.tasks
            .iter()
            .filter(|e| e.value().scope_id() == scope_id)
            .map(|e| Arc::clone(e.value()))
            .collect()
    }

    /// Number of still-active tasks of the given scope.
    pub fn active_count(&self, scope_id: &ScopeId) -> usize {
        self.tasks
            .iter()
            .filter(|e| e.value().scope_id() == scope_id && e.value().is_active())
            .count()
    }

    /// Aborts every task of the given scope. Entries stay registered.
    pub fn abort_all(&self, scope_id: &ScopeId) {
        for task in self.get_by_scope(scope_id) {
            task.abort();
        }
    }

    /// Empties the table **without** aborting.
    ///
    /// Used only on authority teardown, after the owning scopes were
    /// disposed (which already aborted their tasks).
    pub fn clear(&self) {
        self.tasks.clear();
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when no tasks are registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}
