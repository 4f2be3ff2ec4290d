//! # Task-owned execution units.
//!
//! Everything in this module is strictly bound to a task: it carries the
//! task's [`Ref`](crate::ids::Ref), it is registered in the task's owned
//! maps, and it never outlives the task.
//!
//! - [`Worker`]: cancelable async unit with its own signal; runs until it
//!   finishes or the task tears it down.
//! - [`Handler`]: single-shot cancelable unit; runs at most once.
//! - [`Stream`]: live multicast channel with replay to late subscribers.
//! - [`StreamBuffer`]: bounded append-only chunk buffer with
//!   high-water-mark backpressure; decoupled from [`Stream`].

mod buffer;
mod handler;
mod stream;
mod worker;

pub use buffer::{StreamBuffer, DEFAULT_HIGH_WATER};
pub use handler::{Handler, HandlerStatus};
pub use stream::{Stream, StreamStatus, StreamSubscription};
pub(crate) use stream::StreamControl;
pub use worker::{Worker, WorkerStatus};
