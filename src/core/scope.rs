//! # Scope - an FSM-gated execution lane.
//!
//! A [`Scope`] groups related tasks and bounds their lifetime. Every
//! execution request passes the scope's state machine first; once the
//! scope is disposed, every task it registered has been aborted and
//! nothing new can start.
//!
//! ## Rules
//! - `mount` is callable from any state; outside `Init` it silently
//!   returns `false` (idempotency).
//! - The first successful task creation promotes `Attached` to
//!   `Running`.
//! - `effect` runs without creating a task; it is the one execution
//!   path that bypasses the task registry, kept cheap on purpose.
//! - `dispose` aborts all registered tasks, then drives the machine
//!   through `Disposing` into `Disposed`. Idempotent.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::ScopeConfig;
use crate::error::{KernelError, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::ids::{Ref, ScopeId};
use crate::pool::WorkerPool;

use super::fsm::{ScopeEvent, ScopeFsm, ScopeState};
use super::table::TaskTable;
use super::task::{Task, TaskContext, TaskRunOptions};

/// Named execution lane owned by an authority.
pub struct Scope {
    id: ScopeId,
    name: String,
    workers: Option<usize>,
    fsm: Mutex<ScopeFsm>,
    table: TaskTable,
    pool: Arc<WorkerPool>,
    bus: Bus,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl Scope {
    /// Creates the scope in `Init` and reports it on the bus.
    pub(crate) fn new(cfg: ScopeConfig, pool: Arc<WorkerPool>, bus: Bus) -> Arc<Self> {
        let scope = Arc::new(Self {
            id: cfg.id,
            name: cfg.name,
            workers: cfg.workers,
            fsm: Mutex::new(ScopeFsm::new()),
            table: TaskTable::new(),
            pool,
            bus,
        });
        scope.bus.publish(
            Event::now(EventKind::ScopeCreated)
                .with_scope(scope.id.as_str())
                .with_reason(scope.name.clone()),
        );
        scope
    }

    /// The scope's id.
    pub fn id(&self) -> &ScopeId {
        &self.id
    }

    /// The scope's human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ScopeState {
        self.fsm.lock().state()
    }

    /// True until teardown begins.
    pub fn is_alive(&self) -> bool {
        self.fsm.lock().is_alive()
    }

    /// True when the scope permits task creation and execution.
    pub fn can_execute(&self) -> bool {
        self.fsm.lock().can_execute()
    }

    /// Number of registered tasks (live table size).
    pub fn task_count(&self) -> usize {
        self.table.len()
    }

    /// Number of registered tasks that are still active.
    pub fn active_task_count(&self) -> usize {
        self.table.active_count(&self.id)
    }

    /// The scope's requested worker count, or the pool's current size
    /// when the scope made no request.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| self.pool.size())
    }

    /// Mounts the scope: `Init` to `Attached`.
    ///
    /// Callable from any state; returns `true` iff the state changed.
    pub fn mount(&self) -> bool {
        let changed = self.fsm.lock().transition(ScopeEvent::Mounted);
        if changed {
            self.bus
                .publish(Event::now(EventKind::ScopeMounted).with_scope(self.id.as_str()));
        }
        changed
    }

    /// Pauses execution: `Running` to `Suspended`.
    pub fn suspend(&self) -> bool {
        let changed = self.fsm.lock().transition(ScopeEvent::Suspend);
        if changed {
            self.bus
                .publish(Event::now(EventKind::ScopeSuspended).with_scope(self.id.as_str()));
        }
        changed
    }

    /// Resumes execution: `Suspended` to `Running`.
    pub fn resume(&self) -> bool {
        let changed = self.fsm.lock().transition(ScopeEvent::Resume);
        if changed {
            self.bus
                .publish(Event::now(EventKind::ScopeResumed).with_scope(self.id.as_str()));
        }
        changed
    }

    /// Creates a task bound to this scope and the authority's pool.
    ///
    /// Fails with `ScopeInactive { reason: "disposed" }` when teardown
    /// has begun and `{ reason: "not ready" }` when the scope does not
    /// permit execution. The first successful creation promotes
    /// `Attached` to `Running`.
    pub fn create_task(&self, explicit: Option<Ref>) -> Result<Arc<Task>, KernelError> {
        let mut fsm = self.fsm.lock();
        if !fsm.is_alive() {
            return Err(KernelError::ScopeInactive {
                scope_id: self.id.clone(),
                reason: "disposed",
            });
        }
        if !fsm.can_execute() {
            return Err(KernelError::ScopeInactive {
                scope_id: self.id.clone(),
                reason: "not ready",
            });
        }

        let task = Task::new(
            self.id.clone(),
            Some(Arc::clone(&self.pool)),
            self.bus.clone(),
            explicit,
        );
        self.table.register(Arc::clone(&task));

        if fsm.state() == ScopeState::Attached {
            fsm.transition(ScopeEvent::TaskStarted);
        }
        Ok(task)
    }

    /// Creates a task, runs it, and unregisters it on settlement.
    ///
    /// The unregister happens on success and on failure alike; the
    /// table only ever holds in-flight runs.
    pub async fn run<F, Fut, T>(&self, f: F, opts: TaskRunOptions) -> Result<Arc<T>, KernelError>
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        let task = self.create_task(None)?;
        let task_ref = task.task_ref().clone();
        let result = task.run(f, opts).await;
        self.table.unregister(&task_ref);
        result.map_err(KernelError::from)
    }

    /// Runs `f` directly. Requires the scope be alive.
    ///
    /// No task is created or registered; this is the lightweight path
    /// for side effects that need lifecycle gating but no identity.
    pub fn effect<T>(&self, f: impl FnOnce() -> T) -> Result<T, KernelError> {
        if !self.is_alive() {
            return Err(KernelError::ScopeInactive {
                scope_id: self.id.clone(),
                reason: "disposed",
            });
        }
        Ok(f())
    }

    /// Looks a registered task up by ref.
    pub fn get_task(&self, task_ref: &Ref) -> Option<Arc<Task>> {
        self.table.get(task_ref)
    }

    /// Aborts and unregisters the task with the given ref.
    ///
    /// Returns whether a task was found.
    pub fn abort_task(&self, task_ref: &Ref) -> bool {
        match self.table.unregister(task_ref) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Aborts every registered task. Entries stay registered.
    pub fn abort_all(&self) {
        self.table.abort_all(&self.id);
    }

    /// Tears the scope down: aborts all tasks, then drives the machine
    /// through `Disposing` into `Disposed`. Idempotent.
    pub fn dispose(&self) {
        if !self.is_alive() {
            return;
        }

        self.table.abort_all(&self.id);

        let disposed = {
            let mut fsm = self.fsm.lock();
            let entered = fsm.transition(ScopeEvent::Dispose);
            fsm.tick();
            entered
        };
        if disposed {
            self.bus
                .publish(Event::now(EventKind::ScopeDisposed).with_scope(self.id.as_str()));
        }
    }

    /// Empties the task table without aborting.
    ///
    /// Authority teardown only; the scope was disposed first.
    pub(crate) fn clear_tasks(&self) {
        self.table.clear();
    }
}
