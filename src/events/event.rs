//! # Lifecycle events emitted by the kernel.
//!
//! The [`EventKind`] enum classifies events across the kernel's layers:
//! scope lifecycle, task lifecycle, unit failures, pool activity, and
//! delivery faults of the observer plane itself.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Events can therefore be re-ordered correctly even when
//! delivered through async channels.
//!
//! ## Example
//! ```rust
//! use scopegate::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::TaskFailed)
//!     .with_scope("downloads")
//!     .with_task("task-0-1f2e3d4c")
//!     .with_error("boom");
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.error.as_deref(), Some("boom"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of kernel events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Scope lifecycle ===
    /// Scope was registered with the authority.
    ScopeCreated,
    /// Scope moved from `Init` to `Attached`.
    ScopeMounted,
    /// Scope moved from `Running` to `Suspended`.
    ScopeSuspended,
    /// Scope moved from `Suspended` back to `Running`.
    ScopeResumed,
    /// Scope reached its terminal `Disposed` state.
    ScopeDisposed,

    // === Task lifecycle ===
    /// Task left `Pending` and is about to execute.
    TaskStarting,
    /// Task finalized as success.
    TaskCompleted,
    /// Task finalized as error.
    TaskFailed,
    /// Task finalized as aborted.
    TaskAborted,

    // === Owned units ===
    /// A task-owned worker failed with a non-abort error.
    WorkerFailed,
    /// A task-owned handler failed with a non-abort error.
    HandlerFailed,

    // === Worker pool ===
    /// Pool logical size changed via `scale` or idle retirement.
    PoolScaled,
    /// A job was queued because no idle worker existed.
    PoolSaturated,
    /// Pool was disposed; queued jobs were rejected.
    PoolDisposed,

    // === Delivery faults ===
    /// A broadcast listener panicked during synchronous delivery.
    ListenerPanicked,
    /// A subscriber panicked while processing an event.
    SubscriberPanicked,
    /// A subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,

    // === Authority ===
    /// Authority disposal cascade finished.
    AuthorityDisposed,
}

impl EventKind {
    /// True for faults of the delivery plane itself.
    ///
    /// Fault events are reported once and never re-reported when their
    /// own delivery fails: a congested subscriber lane must not feed
    /// itself more fault traffic.
    pub fn is_delivery_fault(self) -> bool {
        matches!(
            self,
            EventKind::ListenerPanicked
                | EventKind::SubscriberPanicked
                | EventKind::SubscriberOverflow
        )
    }
}

/// Kernel event with optional metadata.
///
/// ## Fields
/// - `seq`: unique sequence number (monotonically increasing)
/// - `at`: wall-clock timestamp (may go backwards under NTP; logging only)
/// - `kind`: event classification
/// - `scope`, `task`, `unit`, `error`: optional metadata
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Scope id, if applicable.
    pub scope: Option<String>,
    /// Task ref, if applicable.
    pub task: Option<String>,
    /// Worker/handler/stream id, if applicable.
    pub unit: Option<String>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
    /// Free-form detail (queue depths, scaling deltas).
    pub reason: Option<String>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp
    /// and the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            scope: None,
            task: None,
            unit: None,
            error: None,
            reason: None,
        }
    }

    /// Attaches a scope id.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Attaches a task ref.
    pub fn with_task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a unit id.
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Attaches free-form detail.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}
