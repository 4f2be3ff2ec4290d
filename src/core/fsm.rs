//! # Scope lifecycle state machine.
//!
//! Deterministic five-event, six-state machine. Every scope gate derives
//! from it; nothing else mutates scope state.
//!
//! ```text
//! Init ──mounted──► Attached ──task_started──► Running ──suspend──► Suspended
//!                      │                          │ ◄─────resume───────┘
//!                      │                          │                    │
//!                      └────────────────── dispose ───────────────────┘
//!                                             │
//!                                             ▼
//!                                        Disposing ──(any event / tick)──► Disposed
//! ```
//!
//! ## Rules
//! - Unspecified transitions are no-ops returning `false`.
//! - `Disposing` auto-advances to `Disposed` on any further event or an
//!   explicit `tick()`.
//! - `Disposed` is absorbing: no outgoing transitions.
//! - The only cycle is `Running` and `Suspended` toggling.

/// Lifecycle state of a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Created, not yet mounted.
    Init,
    /// Mounted; permits execution, no task created yet.
    Attached,
    /// At least one task was created.
    Running,
    /// Execution paused; tasks keep their state.
    Suspended,
    /// Teardown in progress.
    Disposing,
    /// Terminal.
    Disposed,
}

impl ScopeState {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            ScopeState::Init => "init",
            ScopeState::Attached => "attached",
            ScopeState::Running => "running",
            ScopeState::Suspended => "suspended",
            ScopeState::Disposing => "disposing",
            ScopeState::Disposed => "disposed",
        }
    }
}

/// Events driving the scope machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEvent {
    /// The scope was mounted by its owner.
    Mounted,
    /// The first task was created.
    TaskStarted,
    /// Execution paused.
    Suspend,
    /// Execution resumed.
    Resume,
    /// Teardown requested.
    Dispose,
}

/// Single-authority state gate for a scope.
#[derive(Debug)]
pub struct ScopeFsm {
    state: ScopeState,
}

impl ScopeFsm {
    /// Creates the machine in `Init`.
    pub fn new() -> Self {
        Self {
            state: ScopeState::Init,
        }
    }

    /// Current state.
    pub fn state(&self) -> ScopeState {
        self.state
    }

    /// Applies an event. Returns `true` iff the state changed.
    pub fn transition(&mut self, event: ScopeEvent) -> bool {
        use ScopeEvent::*;
        use ScopeState::*;

        let next = match (self.state, event) {
            (Init, Mounted) => Attached,
            (Attached, TaskStarted) => Running,
            (Running, Suspend) => Suspended,
            (Suspended, Resume) => Running,
            (Attached, Dispose) | (Running, Dispose) | (Suspended, Dispose) => Disposing,
            // Disposing absorbs any further event into the terminal state.
            (Disposing, _) => Disposed,
            _ => return false,
        };

        self.state = next;
        true
    }

    /// Advances `Disposing` to `Disposed`. Returns `true` iff it did.
    pub fn tick(&mut self) -> bool {
        if self.state == ScopeState::Disposing {
            self.state = ScopeState::Disposed;
            true
        } else {
            false
        }
    }

    /// True when the scope permits task creation and execution.
    pub fn can_execute(&self) -> bool {
        matches!(self.state, ScopeState::Attached | ScopeState::Running)
    }

    /// True until teardown begins.
    pub fn is_alive(&self) -> bool {
        !matches!(self.state, ScopeState::Disposing | ScopeState::Disposed)
    }
}

impl Default for ScopeFsm {
    fn default() -> Self {
        Self::new()
    }
}
