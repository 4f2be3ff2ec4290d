//! # Subscriber contract
//!
//! `Subscribe` is the extension point for long-lived observers of the
//! kernel event plane. Each subscriber is served by its own bounded
//! delivery lane (see [`SubscriberSet`](super::SubscriberSet)), so a
//! slow or faulty subscriber never blocks publishers or its peers.
//!
//! ## Contract
//! - [`Subscribe::interest`] narrows the subscription by
//!   [`EventKind`]; declined events never enter the lane, so an
//!   uninterested subscriber costs nothing per event.
//! - [`Subscribe::lane_capacity`] bounds the lane. When it overflows,
//!   the kernel drops the event for that subscriber and reports the
//!   drop on the plane; it never applies backpressure to publishers.
//! - [`Subscribe::name`] identifies the subscriber in those fault
//!   reports, which is why it is required rather than defaulted.

use async_trait::async_trait;

use crate::events::{Event, EventKind};

/// Default depth of a subscriber's delivery lane.
///
/// A quarter of the default bus capacity: a subscriber that falls this
/// far behind is shedding load, and shedding with a reported drop beats
/// stalling the plane.
pub const DEFAULT_LANE_CAPACITY: usize = 256;

/// Contract for kernel event observers.
///
/// Called from a subscriber-dedicated worker task. Implementations
/// should avoid blocking the async runtime (prefer async I/O and
/// cooperative waits).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle one kernel event.
    async fn on_event(&self, event: &Event);

    /// Whether this subscriber wants events of the given kind.
    ///
    /// Defaults to everything. Checked before enqueueing, so declining
    /// a kind also shields the lane from its volume.
    fn interest(&self, kind: EventKind) -> bool {
        let _ = kind;
        true
    }

    /// Name used when the kernel reports drops and panics for this
    /// subscriber.
    fn name(&self) -> &'static str;

    /// Depth of this subscriber's delivery lane.
    fn lane_capacity(&self) -> usize {
        DEFAULT_LANE_CAPACITY
    }
}
