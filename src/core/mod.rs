//! Kernel core: lifecycle, execution, supervision.
//!
//! ## Files & responsibilities
//! - **fsm.rs**: the single authority on scope state; every gate
//!   (`can_execute`, `is_alive`) derives from it.
//! - **task.rs**: the execution instance; owns workers, handlers, and
//!   streams; exposes `effect`/`run`; cascades `abort` to everything it
//!   owns.
//! - **table.rs**: ref-indexed registry of live tasks with scope
//!   filtering; the scope's teardown walks it.
//! - **scope.rs**: FSM-gated lane; creates and supervises tasks; borrows
//!   pool capacity from the authority.
//! - **authority.rs**: process-wide root; scope registry, broadcast
//!   mediator, owner of the worker pool and the event bus.
//!
//! ## Ownership graph
//! ```text
//! Authority ──► Scope (registry, one live per id)
//!                 └──► Task (TaskTable, one per ref)
//!                        ├──► Worker  (own cancellation token)
//!                        ├──► Handler (single-shot)
//!                        └──► Stream  (multicast + replay)
//! ```
//! Disposal walks one level; each level cascades to its own owned set.

mod authority;
mod fsm;
mod scope;
mod table;
mod task;

pub use authority::{Authority, BroadcastData, BroadcastSubscription};
pub use fsm::{ScopeEvent, ScopeFsm, ScopeState};
pub use scope::Scope;
pub use table::TaskTable;
pub use task::{Task, TaskChunk, TaskContext, TaskOutcome, TaskRunOptions, TaskStatus};
