//! # SubscriberSet: isolated delivery lanes over the event plane.
//!
//! Each subscriber gets a bounded lane and a dedicated worker. Routing
//! an event never waits on a subscriber: interested lanes get a shared
//! handle to the event or, when full, nothing.
//!
//! ```text
//!    deliver(Arc<Event>)
//!        │  interest(kind)?
//!        ├──yes──► [lane S1] ─► worker S1 ─► on_event()
//!        ├──no───  (skipped, costs nothing)
//!        └──yes──► [lane SN] ─► worker SN ─► on_event()
//! ```
//!
//! ## Fault reporting
//! Overflowed lanes and panicking subscribers are reported back onto
//! the plane as [`SubscriberOverflow`](EventKind::SubscriberOverflow)
//! and [`SubscriberPanicked`](EventKind::SubscriberPanicked) events,
//! keyed by the subscriber's name. The one exception: when the event
//! being delivered is itself a delivery fault, a failure is swallowed
//! instead of reported, so a congested lane cannot feed itself.
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers (per-lane FIFO
//!   only).
//! - No retries: an overflowed event is gone for that subscriber.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::{Bus, Event, EventKind};

use super::Subscribe;

/// One subscriber's bounded delivery lane.
struct Lane {
    name: &'static str,
    subscriber: Arc<dyn Subscribe>,
    tx: mpsc::Sender<Arc<Event>>,
    worker: JoinHandle<()>,
}

impl Lane {
    /// Opens the lane and spawns its worker.
    ///
    /// The worker contains subscriber panics and reports them on the
    /// plane; the lane itself stays open afterwards.
    fn open(subscriber: Arc<dyn Subscribe>, bus: Bus) -> Self {
        let (tx, mut rx) = mpsc::channel::<Arc<Event>>(subscriber.lane_capacity().max(1));
        let name = subscriber.name();
        let sub = Arc::clone(&subscriber);

        let worker = tokio::spawn(async move {
            while let Some(ev) = rx.recv().await {
                let delivery = std::panic::AssertUnwindSafe(sub.on_event(&ev)).catch_unwind();
                if delivery.await.is_err() && !ev.kind.is_delivery_fault() {
                    bus.publish(
                        Event::now(EventKind::SubscriberPanicked)
                            .with_unit(name)
                            .with_reason(format!("while handling {:?}", ev.kind)),
                    );
                }
            }
        });

        Self {
            name,
            subscriber,
            tx,
            worker,
        }
    }
}

/// Fan-out of kernel events into per-subscriber lanes.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    bus: Bus,
}

impl SubscriberSet {
    /// Opens one lane per subscriber.
    ///
    /// The bus handle is where lane faults are reported.
    #[must_use]
    pub fn new(subscribers: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let lanes = subscribers
            .into_iter()
            .map(|s| Lane::open(s, bus.clone()))
            .collect();
        Self { lanes, bus }
    }

    /// Routes one event into every interested lane without waiting.
    ///
    /// A full or closed lane loses the event for that subscriber; the
    /// loss surfaces as a `SubscriberOverflow` event unless the event
    /// was itself a delivery fault.
    pub fn deliver(&self, ev: Arc<Event>) {
        for lane in &self.lanes {
            if !lane.subscriber.interest(ev.kind) {
                continue;
            }
            if lane.tx.try_send(Arc::clone(&ev)).is_err() && !ev.kind.is_delivery_fault() {
                self.bus.publish(
                    Event::now(EventKind::SubscriberOverflow)
                        .with_unit(lane.name)
                        .with_reason(format!("dropped {:?}", ev.kind)),
                );
            }
        }
    }

    /// Number of open lanes.
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// True when no lanes are open.
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Aborts all lane workers. Queued events are discarded.
    pub fn shutdown(&self) {
        for lane in &self.lanes {
            lane.worker.abort();
        }
    }
}
