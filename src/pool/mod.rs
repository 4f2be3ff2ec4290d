//! # Cooperative worker pool.
//!
//! The pool is a bounded concurrency limiter, not a thread pool: logical
//! workers are event-loop tasks, dispatch is deferred invocation, and
//! suspension happens only at `await` points inside supplied functions.
//! A future implementation may swap in OS threads by preserving the
//! `execute(fn)` contract.
//!
//! - [`WorkerPool`]: fixed-capacity executor with a FIFO queue of
//!   pending work.
//!
//! Slot states and dispatch rules live in the private `slot` module.

mod core;
mod slot;

pub use core::WorkerPool;
