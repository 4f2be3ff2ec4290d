//! # Kernel event plane.
//!
//! Every component of the kernel reports its lifecycle through a shared
//! [`Bus`]. The plane is strictly observational: nothing in the kernel
//! waits on it, and it keeps working with zero observers attached.
//!
//! ## Invariants
//! - `publish` never blocks and never fails. With no receivers the
//!   event is dropped on the floor.
//! - Events cross the channel as [`Arc<Event>`]: one allocation per
//!   event regardless of how many receivers tap the plane, and the
//!   subscriber fan-out re-shares the same allocation.
//! - Capacity comes from the (normalized) [`EngineConfig`]; a slow
//!   receiver observes `Lagged` and skips, it never stalls publishers.
//!
//! Raw taps via [`Bus::subscribe`] are for tests and ad-hoc probes.
//! Long-lived observers should go through
//! [`SubscriberSet`](crate::subscribers::SubscriberSet), which adds
//! per-subscriber isolation, interest filtering, and drop reporting.

mod event;

pub use event::{Event, EventKind};

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::EngineConfig;

/// Shared handle to the kernel's event plane.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Arc<Event>>,
}

impl Bus {
    /// Creates the event plane for an engine.
    ///
    /// Capacity is the config's `bus_capacity` after normalization.
    pub fn new(cfg: &EngineConfig) -> Self {
        let (tx, _rx) = broadcast::channel(cfg.normalized().bus_capacity);
        Self { tx }
    }

    /// Reports one kernel event.
    ///
    /// The event is wrapped once and shared to every current receiver.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(Arc::new(ev));
    }

    /// Opens an independent tap: the receiver sees every event
    /// published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Event>> {
        self.tx.subscribe()
    }

    /// Number of receivers currently tapping the plane.
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
