//! # Task - a single execution instance.
//!
//! A [`Task`] carries an immutable [`Ref`], runs at most once, and owns
//! every worker, handler, and stream created during its run. Aborting
//! the task cancels its token and tears all owned units down
//! synchronously.
//!
//! ## Status flow
//! ```text
//! Pending ──► Running ──► Success | Error | Aborted
//! ```
//! Terminal statuses are final; the three outcomes are mutually
//! exclusive. Retry is a *new* task with a fresh ref; nothing is carried
//! over.
//!
//! ## Execution paths in [`run`](Task::run)
//! - `deferred`: yield one macrotask (zero-delay timer), then invoke.
//! - pooled: hand the function to the authority's
//!   [`WorkerPool`](crate::pool::WorkerPool).
//! - direct: invoke inline.
//!
//! The cancellation token is checked before dispatch and after
//! settlement; an abort observed at either point finalizes the task as
//! aborted, never as an error.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::ids::{HandlerId, Ref, ScopeId, StreamId, WorkerId};
use crate::pool::WorkerPool;
use crate::units::{Handler, Stream, StreamBuffer, StreamControl, Worker};

/// Erased chunk pushed through [`TaskContext::emit`].
pub type TaskChunk = Arc<dyn Any + Send + Sync>;

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Created, `run` not yet called.
    Pending,
    /// `run` is executing.
    Running,
    /// Finalized: the function returned normally.
    Success,
    /// Finalized: the function failed.
    Error,
    /// Finalized: the task was aborted.
    Aborted,
}

impl TaskStatus {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Error => "error",
            TaskStatus::Aborted => "aborted",
        }
    }
}

/// Final observable result of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Returned normally.
    Success,
    /// Failed with an error.
    Error,
    /// Torn down by abort.
    Aborted,
}

impl TaskOutcome {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskOutcome::Success => "success",
            TaskOutcome::Error => "error",
            TaskOutcome::Aborted => "aborted",
        }
    }
}

/// Options for [`Task::run`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskRunOptions {
    /// Yield to the event loop before invoking the function.
    pub deferred: bool,
    /// Enable [`TaskContext::emit`] backed by a task-owned
    /// [`StreamBuffer`].
    pub streaming: bool,
}

impl TaskRunOptions {
    /// Options with `deferred` set.
    pub fn deferred() -> Self {
        Self {
            deferred: true,
            ..Self::default()
        }
    }

    /// Options with `streaming` set.
    pub fn streaming() -> Self {
        Self {
            streaming: true,
            ..Self::default()
        }
    }
}

/// Execution instance with an immutable ref.
pub struct Task {
    task_ref: Ref,
    scope: ScopeId,
    token: CancellationToken,
    status: Mutex<TaskStatus>,
    outcome: Mutex<Option<TaskOutcome>>,
    result: Mutex<Option<TaskChunk>>,
    error: Mutex<Option<String>>,
    workers: Mutex<HashMap<WorkerId, Worker>>,
    handlers: Mutex<HashMap<HandlerId, Handler>>,
    streams: Mutex<HashMap<StreamId, Arc<dyn StreamControl>>>,
    chunks: Mutex<Option<StreamBuffer<TaskChunk>>>,
    unit_seq: AtomicU64,
    pool: Option<Arc<WorkerPool>>,
    bus: Bus,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("task_ref", &self.task_ref)
            .field("scope", &self.scope)
            .finish()
    }
}

impl Task {
    /// Creates a pending task bound to a scope.
    ///
    /// An explicit ref bypasses generation; the caller then owns
    /// uniqueness.
    pub(crate) fn new(
        scope: ScopeId,
        pool: Option<Arc<WorkerPool>>,
        bus: Bus,
        explicit: Option<Ref>,
    ) -> Arc<Self> {
        Arc::new(Self {
            task_ref: explicit.unwrap_or_else(Ref::generate),
            scope,
            token: CancellationToken::new(),
            status: Mutex::new(TaskStatus::Pending),
            outcome: Mutex::new(None),
            result: Mutex::new(None),
            error: Mutex::new(None),
            workers: Mutex::new(HashMap::new()),
            handlers: Mutex::new(HashMap::new()),
            streams: Mutex::new(HashMap::new()),
            chunks: Mutex::new(None),
            unit_seq: AtomicU64::new(0),
            pool,
            bus,
        })
    }

    /// The task's immutable ref.
    pub fn task_ref(&self) -> &Ref {
        &self.task_ref
    }

    /// The owning scope's id.
    pub fn scope_id(&self) -> &ScopeId {
        &self.scope
    }

    /// The task's cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Current status.
    pub fn status(&self) -> TaskStatus {
        *self.status.lock()
    }

    /// Final outcome; `None` while the task is active.
    pub fn outcome(&self) -> Option<TaskOutcome> {
        *self.outcome.lock()
    }

    /// The recorded failure, if the task failed.
    pub fn error(&self) -> Option<String> {
        self.error.lock().clone()
    }

    /// The captured result, type-erased.
    pub fn result(&self) -> Option<TaskChunk> {
        self.result.lock().clone()
    }

    /// The captured result, downcast to `T`.
    pub fn result_as<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.result.lock().clone().and_then(|r| r.downcast::<T>().ok())
    }

    /// True while the task is `Pending` or `Running`.
    pub fn is_active(&self) -> bool {
        matches!(self.status(), TaskStatus::Pending | TaskStatus::Running)
    }

    /// True once the task reached a terminal status.
    pub fn is_complete(&self) -> bool {
        !self.is_active()
    }

    /// Number of owned workers.
    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }

    /// Number of owned handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Number of owned streams.
    pub fn stream_count(&self) -> usize {
        self.streams.lock().len()
    }

    /// Fast-path execution with zero scheduling overhead.
    ///
    /// Invokes `f` directly and returns its result with the function's
    /// own shape: a closure returning a future is handed back unawaited.
    /// No pool, no queueing, no context.
    pub fn effect<T>(&self, f: impl FnOnce() -> T) -> Result<T, TaskError> {
        if !self.is_active() {
            return Err(TaskError::rejected("task is not active"));
        }
        Ok(f())
    }

    /// Runs the task function exactly once.
    ///
    /// Requires `Pending`; a second call fails fast with
    /// [`TaskError::Rejected`]. The function receives a [`TaskContext`]
    /// for spawning workers, registering handlers, creating streams, and
    /// (with `streaming`) emitting chunks.
    ///
    /// On success the value is captured on the task and returned shared;
    /// a failure finalizes the task as `Error` and re-raises; an abort
    /// observed before dispatch, during the run, or after settlement
    /// finalizes it as `Aborted` and surfaces [`TaskError::Canceled`].
    pub async fn run<F, Fut, T>(
        self: &Arc<Self>,
        f: F,
        opts: TaskRunOptions,
    ) -> Result<Arc<T>, TaskError>
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        {
            let mut status = self.status.lock();
            if *status != TaskStatus::Pending {
                return Err(TaskError::rejected("task is not pending"));
            }
            *status = TaskStatus::Running;
        }

        if opts.streaming {
            *self.chunks.lock() = Some(StreamBuffer::new());
        }

        self.bus.publish(
            Event::now(EventKind::TaskStarting)
                .with_scope(self.scope.as_str())
                .with_task(self.task_ref.as_str()),
        );

        if self.token.is_cancelled() {
            self.abort();
            return Err(TaskError::Canceled);
        }

        let ctx = TaskContext {
            task: Arc::clone(self),
        };

        let settled: Result<T, TaskError> = if opts.deferred {
            // Idle-callback semantics: yield one macrotask, then invoke.
            tokio::time::sleep(Duration::ZERO).await;
            if self.token.is_cancelled() {
                Err(TaskError::Canceled)
            } else {
                f(ctx).await
            }
        } else if let Some(pool) = &self.pool {
            let token = self.token.clone();
            pool.execute(move || async move {
                if token.is_cancelled() {
                    Err(TaskError::Canceled)
                } else {
                    f(ctx).await
                }
            })
            .await
            .and_then(|inner| inner)
        } else {
            f(ctx).await
        };

        if self.token.is_cancelled() {
            self.abort();
            return Err(TaskError::Canceled);
        }

        match settled {
            Ok(value) => {
                let shared = Arc::new(value);
                *self.result.lock() = Some(Arc::clone(&shared) as TaskChunk);
                self.settle(TaskStatus::Success, TaskOutcome::Success);
                self.bus.publish(
                    Event::now(EventKind::TaskCompleted)
                        .with_scope(self.scope.as_str())
                        .with_task(self.task_ref.as_str()),
                );
                Ok(shared)
            }
            Err(e) if e.is_abort() => {
                self.abort();
                Err(TaskError::Canceled)
            }
            Err(e) => {
                *self.error.lock() = Some(e.to_string());
                self.settle(TaskStatus::Error, TaskOutcome::Error);
                self.bus.publish(
                    Event::now(EventKind::TaskFailed)
                        .with_scope(self.scope.as_str())
                        .with_task(self.task_ref.as_str())
                        .with_error(e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Aborts the task and tears down everything it owns, synchronously.
    ///
    /// Cancels the token, terminates every worker, cancels every
    /// handler, aborts every stream, closes the chunk buffer, then
    /// finalizes the task as `Aborted`. No-op once terminal.
    pub fn abort(&self) {
        {
            let status = self.status.lock();
            if matches!(
                *status,
                TaskStatus::Success | TaskStatus::Error | TaskStatus::Aborted
            ) {
                return;
            }
        }

        self.token.cancel();

        for worker in self.workers.lock().values() {
            worker.terminate();
        }
        for handler in self.handlers.lock().values() {
            handler.cancel();
        }
        for stream in self.streams.lock().values() {
            stream.abort();
        }
        if let Some(buf) = self.chunks.lock().as_mut() {
            buf.close();
        }

        if self.settle(TaskStatus::Aborted, TaskOutcome::Aborted) {
            self.bus.publish(
                Event::now(EventKind::TaskAborted)
                    .with_scope(self.scope.as_str())
                    .with_task(self.task_ref.as_str()),
            );
        }
    }

    /// Spawns a worker owned by this task. Requires the task be active.
    ///
    /// The worker's token is a child of the task's token; aborting the
    /// task terminates the worker.
    pub fn spawn_worker<F, Fut>(&self, f: F) -> Result<Worker, TaskError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        if !self.is_active() {
            return Err(TaskError::rejected("task is not active"));
        }
        let id = WorkerId::from_seq(self.unit_seq.fetch_add(1, Ordering::Relaxed));
        let worker = Worker::spawn(
            id.clone(),
            self.task_ref.clone(),
            self.token.child_token(),
            f,
            self.bus.clone(),
        );
        self.workers.lock().insert(id, worker.clone());
        Ok(worker)
    }

    /// Registers a single-shot handler owned by this task. Requires the
    /// task be active.
    pub fn add_handler<F, Fut>(&self, f: F) -> Result<Handler, TaskError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        if !self.is_active() {
            return Err(TaskError::rejected("task is not active"));
        }
        let id = HandlerId::from_seq(self.unit_seq.fetch_add(1, Ordering::Relaxed));
        let handler = Handler::new(
            id.clone(),
            self.task_ref.clone(),
            self.token.child_token(),
            f,
            self.bus.clone(),
        );
        self.handlers.lock().insert(id, handler.clone());
        Ok(handler)
    }

    /// Creates a stream owned by this task. Requires the task be active.
    pub fn create_stream<T: Clone + Send + 'static>(&self) -> Result<Stream<T>, TaskError> {
        if !self.is_active() {
            return Err(TaskError::rejected("task is not active"));
        }
        let id = StreamId::from_seq(self.unit_seq.fetch_add(1, Ordering::Relaxed));
        let stream = Stream::new(id.clone(), self.task_ref.clone());
        self.streams
            .lock()
            .insert(id, Arc::new(stream.clone()) as Arc<dyn StreamControl>);
        Ok(stream)
    }

    /// Pushes a chunk into the task's stream buffer.
    ///
    /// Returns the buffer's backpressure verdict: `false` means the
    /// chunk was rejected and the producer should pause or shed work.
    pub fn emit_chunk(&self, chunk: TaskChunk) -> Result<bool, TaskError> {
        if !self.is_active() {
            return Err(TaskError::rejected("task is not active"));
        }
        match self.chunks.lock().as_mut() {
            Some(buf) => Ok(buf.push(chunk)),
            None => Err(TaskError::rejected("streaming is not enabled for this task")),
        }
    }

    /// Returns and clears the buffered chunks.
    pub fn drain_chunks(&self) -> Vec<TaskChunk> {
        self.chunks
            .lock()
            .as_mut()
            .map(StreamBuffer::drain)
            .unwrap_or_default()
    }

    /// Number of buffered chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().as_ref().map_or(0, StreamBuffer::len)
    }
}

/// Capability surface handed to the task function by [`Task::run`].
#[derive(Clone)]
pub struct TaskContext {
    task: Arc<Task>,
}

impl TaskContext {
    /// The running task's ref.
    pub fn task_ref(&self) -> &Ref {
        self.task.task_ref()
    }

    /// The running task's cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.task.token()
    }

    /// True once the task was aborted.
    pub fn is_cancelled(&self) -> bool {
        self.task.token.is_cancelled()
    }

    /// Emits a chunk into the task's stream buffer.
    ///
    /// Only available when the task was run with
    /// [`TaskRunOptions::streaming`]; rejected otherwise. The `bool`
    /// surfaces the buffer's backpressure verdict.
    pub fn emit<C: Any + Send + Sync>(&self, chunk: C) -> Result<bool, TaskError> {
        self.task.emit_chunk(Arc::new(chunk))
    }

    /// Spawns a worker owned by the running task.
    pub fn spawn_worker<F, Fut>(&self, f: F) -> Result<Worker, TaskError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.task.spawn_worker(f)
    }

    /// Registers a handler owned by the running task.
    pub fn add_handler<F, Fut>(&self, f: F) -> Result<Handler, TaskError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        self.task.add_handler(f)
    }

    /// Creates a stream owned by the running task.
    pub fn create_stream<T: Clone + Send + 'static>(&self) -> Result<Stream<T>, TaskError> {
        self.task.create_stream()
    }
}

impl Task {
    fn settle(&self, status: TaskStatus, outcome: TaskOutcome) -> bool {
        let mut current = self.status.lock();
        if matches!(
            *current,
            TaskStatus::Success | TaskStatus::Error | TaskStatus::Aborted
        ) {
            return false;
        }
        *current = status;
        *self.outcome.lock() = Some(outcome);
        true
    }
}
