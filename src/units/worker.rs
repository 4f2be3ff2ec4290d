//! # Task-bound cancelable worker.
//!
//! A [`Worker`] runs one async unit of work with its own cancellation
//! token, derived from the owning task's token. The work function **must**
//! check the token periodically; teardown is cooperative.
//!
//! ## Status flow
//! ```text
//! Idle ──► Running ──► Terminated   (normal return, or abort observed)
//!                └────► Failed      (non-abort error; recorded, reported)
//! ```
//!
//! ## Rules
//! - `terminate` is idempotent and never downgrades `Failed`.
//! - An error returned while the token is cancelled counts as a graceful
//!   exit: the worker lands in `Terminated` and the error is swallowed.
//! - Non-abort failures are recorded on the worker and reported as a
//!   [`WorkerFailed`](crate::events::EventKind::WorkerFailed) event.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::ids::{Ref, WorkerId};

/// Status of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Created, work not yet started.
    Idle,
    /// Work function is executing.
    Running,
    /// Finished or torn down.
    Terminated,
    /// Work function returned a non-abort error.
    Failed,
}

impl WorkerStatus {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Running => "running",
            WorkerStatus::Terminated => "terminated",
            WorkerStatus::Failed => "failed",
        }
    }
}

struct WorkerInner {
    id: WorkerId,
    task: Ref,
    token: CancellationToken,
    status: Mutex<WorkerStatus>,
    error: Mutex<Option<String>>,
}

/// Shared handle to a task-owned worker.
///
/// Clones share status, token, and error; the owning task keeps one clone
/// for teardown and the task context hands another to the caller.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

impl Worker {
    /// Creates the worker and starts its driver on the runtime.
    ///
    /// The driver claims the `Idle` state before invoking `f`; a
    /// `terminate` that lands first wins and the function never runs.
    pub(crate) fn spawn<F, Fut>(
        id: WorkerId,
        task: Ref,
        token: CancellationToken,
        f: F,
        bus: Bus,
    ) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let worker = Self {
            inner: Arc::new(WorkerInner {
                id,
                task,
                token,
                status: Mutex::new(WorkerStatus::Idle),
                error: Mutex::new(None),
            }),
        };

        let me = worker.clone();
        tokio::spawn(async move {
            me.drive(f, bus).await;
        });

        worker
    }

    async fn drive<F, Fut>(&self, f: F, bus: Bus)
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        {
            let mut status = self.inner.status.lock();
            if *status != WorkerStatus::Idle {
                return;
            }
            *status = WorkerStatus::Running;
        }

        let result = f(self.inner.token.clone()).await;

        match result {
            Ok(()) => {
                let mut status = self.inner.status.lock();
                if *status == WorkerStatus::Running {
                    *status = WorkerStatus::Terminated;
                }
            }
            Err(e) if e.is_abort() || self.inner.token.is_cancelled() => {
                // Graceful exit under cancellation; the error is swallowed.
                let mut status = self.inner.status.lock();
                if *status == WorkerStatus::Running {
                    *status = WorkerStatus::Terminated;
                }
            }
            Err(e) => {
                {
                    let mut status = self.inner.status.lock();
                    *status = WorkerStatus::Failed;
                }
                *self.inner.error.lock() = Some(e.to_string());
                bus.publish(
                    Event::now(EventKind::WorkerFailed)
                        .with_task(self.inner.task.as_str())
                        .with_unit(self.inner.id.as_str())
                        .with_error(e.to_string()),
                );
            }
        }
    }

    /// The worker's id within its task.
    pub fn id(&self) -> &WorkerId {
        &self.inner.id
    }

    /// The owning task's ref.
    pub fn task_ref(&self) -> &Ref {
        &self.inner.task
    }

    /// Current status.
    pub fn status(&self) -> WorkerStatus {
        *self.inner.status.lock()
    }

    /// True while the worker is `Idle` or `Running`.
    pub fn is_active(&self) -> bool {
        matches!(self.status(), WorkerStatus::Idle | WorkerStatus::Running)
    }

    /// The worker's cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// The recorded failure, if the worker failed.
    pub fn error(&self) -> Option<String> {
        self.inner.error.lock().clone()
    }

    /// Cancels the worker's token and marks it `Terminated`.
    ///
    /// Idempotent. A `Failed` worker stays failed.
    pub fn terminate(&self) {
        let mut status = self.inner.status.lock();
        match *status {
            WorkerStatus::Idle | WorkerStatus::Running => {
                self.inner.token.cancel();
                *status = WorkerStatus::Terminated;
            }
            WorkerStatus::Terminated | WorkerStatus::Failed => {}
        }
    }
}
