//! # scopegate
//!
//! **Scopegate** is a deterministic execution-control kernel for
//! client-side applications.
//!
//! It offers three nested abstractions - a process-wide [`Authority`],
//! named execution [`Scope`]s with explicit lifecycles, and [`Task`]s
//! carrying immutable execution identity - and guarantees that no
//! user-supplied work ever runs outside a live, permitting scope. When a
//! scope is disposed, every in-flight task, spawned worker, registered
//! handler, and open stream bound to it is torn down synchronously; no
//! zombie computation or orphaned side-effect channel survives.
//!
//! ## Features
//!
//! | Area              | Description                                                      | Key types                                    |
//! |-------------------|------------------------------------------------------------------|----------------------------------------------|
//! | **Authority**     | Process-wide root: scope registry, pool owner, broadcast mediator | [`Authority`], [`EngineConfig`]              |
//! | **Scopes**        | FSM-gated execution lanes with explicit lifecycles               | [`Scope`], [`ScopeConfig`], [`ScopeState`]   |
//! | **Tasks**         | Run-once execution instances owning their units                  | [`Task`], [`TaskContext`], [`TaskRunOptions`]|
//! | **Units**         | Task-bound workers, handlers, and replaying streams              | [`Worker`], [`Handler`], [`Stream`]          |
//! | **Pool**          | Bounded cooperative executor with a FIFO queue                   | [`WorkerPool`]                               |
//! | **Backpressure**  | Bounded chunk buffer with a high-water mark                      | [`StreamBuffer`]                             |
//! | **Observability** | Kernel event plane with non-blocking subscriber fan-out          | [`Event`], [`Bus`], [`Subscribe`]            |
//! | **Errors**        | Typed failures for orchestration and execution                   | [`KernelError`], [`TaskError`]               |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogSubscriber`] _(demo/reference only)_.
//!
//! ```
//! use scopegate::{create_authority, ScopeConfig, TaskRunOptions};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let authority = create_authority(None);
//!     let scope = authority.create_scope(ScopeConfig::new("jobs", "Jobs"))?;
//!     scope.mount();
//!
//!     // Run a task: the function gets a context with the task's
//!     // cancellation token and unit constructors.
//!     let answer = scope
//!         .run(
//!             |ctx| async move {
//!                 if ctx.is_cancelled() {
//!                     return Err(scopegate::TaskError::Canceled);
//!                 }
//!                 Ok(42)
//!             },
//!             TaskRunOptions::default(),
//!         )
//!         .await?;
//!     assert_eq!(*answer, 42);
//!
//!     authority.dispose();
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency model
//!
//! Single-threaded cooperative: logical workers are event-loop tasks,
//! "parallelism" is bounded concurrency, and suspension happens only at
//! `await` points. Cancellation propagates through
//! `tokio_util::sync::CancellationToken`s; user code observes it
//! cooperatively. The kernel imposes no timeouts; callers race a timer
//! against `task.abort()`.

mod config;
mod core;
mod error;
mod events;
mod factory;
mod ids;
mod pool;
mod subscribers;
mod units;

// ---- Public re-exports ----

pub use config::{EngineConfig, ScopeConfig};
pub use crate::core::{
    Authority, BroadcastData, BroadcastSubscription, Scope, ScopeEvent, ScopeFsm, ScopeState,
    Task, TaskChunk, TaskContext, TaskOutcome, TaskRunOptions, TaskStatus, TaskTable,
};
pub use error::{KernelError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use factory::{
    create_authority, current_authority, install_authority, reset_authority, ScopeFactory,
    TaskFactory,
};
pub use ids::{HandlerId, Ref, ScopeId, StreamId, WorkerId};
pub use pool::WorkerPool;
pub use subscribers::{Subscribe, SubscriberSet, DEFAULT_LANE_CAPACITY};
pub use units::{
    Handler, HandlerStatus, Stream, StreamBuffer, StreamStatus, StreamSubscription, Worker,
    WorkerStatus, DEFAULT_HIGH_WATER,
};

// Optional: expose a simple built-in log subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogSubscriber;
