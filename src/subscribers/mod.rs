//! # Event subscribers for the kernel.
//!
//! This module provides the [`Subscribe`] trait and the lane-based
//! fan-out that feeds kernel events to observers.
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   Scope/Task/Pool ── publish(Event) ──► Bus ──► authority pump
//!                                                    │
//!                                                    ▼
//!                                             SubscriberSet
//!                                  interest? ┌──────┼──────┐
//!                                            ▼      ▼      ▼
//!                                        [lane]  [lane]  [lane]
//!                                            │      │      │
//!                                         worker  worker  worker
//!                                            ▼      ▼      ▼
//!                                       on_event()  ...  on_event()
//! ```
//!
//! Lane overflow and subscriber panics surface back on the plane as
//! `SubscriberOverflow` / `SubscriberPanicked` events.
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use scopegate::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &Event) {
//!         let _ = event; // count it
//!     }
//!     fn interest(&self, kind: EventKind) -> bool {
//!         kind == EventKind::TaskFailed
//!     }
//!     fn name(&self) -> &'static str {
//!         "failure-counter"
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogSubscriber;
pub use set::SubscriberSet;
pub use subscribe::{Subscribe, DEFAULT_LANE_CAPACITY};
