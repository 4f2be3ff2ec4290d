//! # Live multicast stream with replay.
//!
//! A [`Stream`] delivers emissions to every subscriber in insertion order
//! and replays its whole history to late subscribers at subscription
//! time, synchronously. Subscriber panics are caught and suppressed so
//! one faulty subscriber never starves the rest.
//!
//! ## Rules
//! - Emissions to a non-open stream are silently dropped.
//! - `close` and `abort` are idempotent and never convert one terminal
//!   status into the other.
//! - The replay buffer is unbounded. Callers that need bounded replay
//!   pair task streaming with a
//!   [`StreamBuffer`](crate::units::StreamBuffer) instead.
//!
//! Delivery snapshots the subscriber set before invoking callbacks, so a
//! callback that subscribes or unsubscribes never deadlocks delivery.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::ids::{Ref, StreamId};

/// Status of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// Accepting emissions and subscribers.
    Open,
    /// Ended normally; subscribers released.
    Closed,
    /// Torn down by its task; subscribers released.
    Aborted,
}

impl StreamStatus {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamStatus::Open => "open",
            StreamStatus::Closed => "closed",
            StreamStatus::Aborted => "aborted",
        }
    }
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct StreamState<T> {
    status: StreamStatus,
    replay: Vec<T>,
    subscribers: Vec<(u64, Callback<T>)>,
    next_sub: u64,
}

/// Task-owned multicast channel.
///
/// Cloning the stream clones the handle, not the channel: all clones
/// share status, replay buffer, and subscribers.
pub struct Stream<T> {
    id: StreamId,
    task: Ref,
    state: Arc<Mutex<StreamState<T>>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            task: self.task.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: Send + 'static> Stream<T> {
    pub(crate) fn new(id: StreamId, task: Ref) -> Self {
        Self {
            id,
            task,
            state: Arc::new(Mutex::new(StreamState {
                status: StreamStatus::Open,
                replay: Vec::new(),
                subscribers: Vec::new(),
                next_sub: 0,
            })),
        }
    }

    /// The stream's id within its task.
    pub fn id(&self) -> &StreamId {
        &self.id
    }

    /// The owning task's ref.
    pub fn task_ref(&self) -> &Ref {
        &self.task
    }

    /// Current status.
    pub fn status(&self) -> StreamStatus {
        self.state.lock().status
    }

    /// Number of chunks in the replay buffer.
    pub fn replay_len(&self) -> usize {
        self.state.lock().replay.len()
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Registers a subscriber and synchronously replays the buffered
    /// history to it, in emission order.
    ///
    /// When the stream is not open, nothing is registered and the
    /// returned subscription is inert.
    pub fn subscribe(&self, f: impl Fn(&T) + Send + Sync + 'static) -> StreamSubscription<T>
    where
        T: Clone,
    {
        let cb: Callback<T> = Arc::new(f);
        let (sub_id, replay) = {
            let mut state = self.state.lock();
            if state.status != StreamStatus::Open {
                return StreamSubscription { slot: None };
            }
            let sub_id = state.next_sub;
            state.next_sub += 1;
            state.subscribers.push((sub_id, Arc::clone(&cb)));
            (sub_id, state.replay.clone())
        };

        for chunk in &replay {
            let _ = catch_unwind(AssertUnwindSafe(|| cb(chunk)));
        }

        StreamSubscription {
            slot: Some((Arc::downgrade(&self.state), sub_id)),
        }
    }

    /// Emits a value: appends it to the replay buffer, then delivers it
    /// to every subscriber present at emission time, in insertion order.
    ///
    /// Dropped silently when the stream is not open. Subscriber panics
    /// are suppressed; delivery continues with the remaining subscribers.
    pub fn emit(&self, value: T)
    where
        T: Clone,
    {
        let targets: Vec<Callback<T>> = {
            let mut state = self.state.lock();
            if state.status != StreamStatus::Open {
                return;
            }
            state.replay.push(value.clone());
            state.subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };

        for cb in targets {
            let _ = catch_unwind(AssertUnwindSafe(|| cb(&value)));
        }
    }

    /// Ends the stream normally and releases subscribers. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.status == StreamStatus::Open {
            state.status = StreamStatus::Closed;
            state.subscribers.clear();
        }
    }

    /// Tears the stream down and releases subscribers. Idempotent.
    ///
    /// A closed stream stays closed; abort never re-labels it.
    pub fn abort(&self) {
        let mut state = self.state.lock();
        if state.status == StreamStatus::Open {
            state.status = StreamStatus::Aborted;
            state.subscribers.clear();
        }
    }
}

/// Unsubscribe guard returned by [`Stream::subscribe`].
///
/// Dropping the guard does **not** unsubscribe; call
/// [`unsubscribe`](StreamSubscription::unsubscribe) explicitly.
pub struct StreamSubscription<T> {
    slot: Option<(Weak<Mutex<StreamState<T>>>, u64)>,
}

impl<T> StreamSubscription<T> {
    /// True when this subscription registered a live subscriber.
    pub fn is_registered(&self) -> bool {
        self.slot.is_some()
    }

    /// Removes the subscriber from the stream.
    ///
    /// Returns `true` when a registration was actually removed. Calling
    /// this on an inert subscription, or after the stream closed, is a
    /// no-op returning `false`.
    pub fn unsubscribe(self) -> bool {
        let Some((state, sub_id)) = self.slot else {
            return false;
        };
        let Some(state) = state.upgrade() else {
            return false;
        };
        let mut state = state.lock();
        let before = state.subscribers.len();
        state.subscribers.retain(|(id, _)| *id != sub_id);
        state.subscribers.len() != before
    }
}

/// Type-erased control surface a task keeps for each owned stream.
///
/// Lets a single task own streams of different payload types while still
/// cascading `abort` during teardown.
pub(crate) trait StreamControl: Send + Sync {
    fn id(&self) -> &StreamId;
    fn status(&self) -> StreamStatus;
    fn abort(&self);
}

impl<T: Clone + Send + 'static> StreamControl for Stream<T> {
    fn id(&self) -> &StreamId {
        &self.id
    }

    fn status(&self) -> StreamStatus {
        Stream::status(self)
    }

    fn abort(&self) {
        Stream::abort(self);
    }
}
