//! # Single-shot cancelable handler.
//!
//! A [`Handler`] wraps one async function, bound at construction, that
//! runs at most once via [`execute`](Handler::execute). Cancellation may
//! preempt a pending handler outright, or flag a running one so that its
//! final status becomes `Cancelled` on exit.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::ids::{HandlerId, Ref};

/// Status of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerStatus {
    /// Bound, not yet executed.
    Pending,
    /// Function is executing.
    Running,
    /// Function returned normally.
    Completed,
    /// Function returned a non-abort error.
    Failed,
    /// Cancelled before or during execution.
    Cancelled,
}

impl HandlerStatus {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerStatus::Pending => "pending",
            HandlerStatus::Running => "running",
            HandlerStatus::Completed => "completed",
            HandlerStatus::Failed => "failed",
            HandlerStatus::Cancelled => "cancelled",
        }
    }
}

type BoxHandlerFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send + 'static>>;
type HandlerFn = Box<dyn FnOnce(CancellationToken) -> BoxHandlerFuture + Send>;

struct HandlerInner {
    id: HandlerId,
    task: Ref,
    token: CancellationToken,
    status: Mutex<HandlerStatus>,
    error: Mutex<Option<String>>,
    func: Mutex<Option<HandlerFn>>,
    bus: Bus,
}

/// Shared handle to a task-owned handler.
#[derive(Clone)]
pub struct Handler {
    inner: Arc<HandlerInner>,
}

impl Handler {
    /// Binds the function and creates the handler in `Pending`.
    ///
    /// The function is set exactly once, here; there is no rebind.
    pub(crate) fn new<F, Fut>(
        id: HandlerId,
        task: Ref,
        token: CancellationToken,
        f: F,
        bus: Bus,
    ) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let func: HandlerFn = Box::new(move |tk| Box::pin(f(tk)));
        Self {
            inner: Arc::new(HandlerInner {
                id,
                task,
                token,
                status: Mutex::new(HandlerStatus::Pending),
                error: Mutex::new(None),
                func: Mutex::new(Some(func)),
                bus,
            }),
        }
    }

    /// The handler's id within its task.
    pub fn id(&self) -> &HandlerId {
        &self.inner.id
    }

    /// The owning task's ref.
    pub fn task_ref(&self) -> &Ref {
        &self.inner.task
    }

    /// Current status.
    pub fn status(&self) -> HandlerStatus {
        *self.inner.status.lock()
    }

    /// True while the handler is `Pending` or `Running`.
    pub fn is_active(&self) -> bool {
        matches!(self.status(), HandlerStatus::Pending | HandlerStatus::Running)
    }

    /// The recorded failure, if the handler failed.
    pub fn error(&self) -> Option<String> {
        self.inner.error.lock().clone()
    }

    /// Runs the bound function. Requires `Pending`.
    ///
    /// - Normal return with the cancel flag set during the run finalizes
    ///   `Cancelled` with no error surfaced.
    /// - An error with the flag set finalizes `Cancelled` and surfaces
    ///   [`TaskError::Canceled`] (graceful exit, not a failure).
    /// - Any other error finalizes `Failed`, records the error, and
    ///   re-raises it.
    /// - A preempted handler returns [`TaskError::Canceled`]; a second
    ///   `execute` on a settled handler is a developer error
    ///   ([`TaskError::Rejected`]) and leaves the status untouched.
    pub async fn execute(&self) -> Result<(), TaskError> {
        let func = {
            let mut status = self.inner.status.lock();
            match *status {
                HandlerStatus::Pending => {}
                HandlerStatus::Cancelled => return Err(TaskError::Canceled),
                _ => return Err(TaskError::rejected("handler is not pending")),
            }
            *status = HandlerStatus::Running;
            self.inner.func.lock().take()
        };

        // The function is present exactly when the handler never ran.
        let Some(func) = func else {
            return Err(TaskError::rejected("handler function already consumed"));
        };

        let result = func(self.inner.token.clone()).await;
        let cancelled = self.inner.token.is_cancelled();

        match result {
            Ok(()) => {
                *self.inner.status.lock() = if cancelled {
                    HandlerStatus::Cancelled
                } else {
                    HandlerStatus::Completed
                };
                Ok(())
            }
            Err(e) if cancelled || e.is_abort() => {
                *self.inner.status.lock() = HandlerStatus::Cancelled;
                Err(TaskError::Canceled)
            }
            Err(e) => {
                *self.inner.status.lock() = HandlerStatus::Failed;
                *self.inner.error.lock() = Some(e.to_string());
                self.inner.bus.publish(
                    Event::now(EventKind::HandlerFailed)
                        .with_task(self.inner.task.as_str())
                        .with_unit(self.inner.id.as_str())
                        .with_error(e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Sets the cancel flag.
    ///
    /// A `Pending` handler jumps straight to `Cancelled`; a `Running` one
    /// finalizes `Cancelled` on exit. Ignored for terminal statuses.
    pub fn cancel(&self) {
        let mut status = self.inner.status.lock();
        match *status {
            HandlerStatus::Pending => {
                self.inner.token.cancel();
                *status = HandlerStatus::Cancelled;
            }
            HandlerStatus::Running => {
                self.inner.token.cancel();
            }
            _ => {}
        }
    }
}
