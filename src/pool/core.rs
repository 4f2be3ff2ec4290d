//! # WorkerPool - bounded cooperative executor.
//!
//! ## Dispatch rules
//! - Disposed pool: reject immediately.
//! - Idle slot available: mark it busy and run the job on the runtime;
//!   the caller's future resolves with the job's own result.
//! - No idle slot: enqueue FIFO; a settling job drains exactly one
//!   queued item into its freed slot.
//!
//! ## Rules
//! - A job failure resolves the caller and returns the slot to idle;
//!   slots are never killed by job errors.
//! - A panicking job is contained and resolves its caller with a
//!   distinct `Fail("job panicked")` error; only disposal produces
//!   `Rejected`. The slot settles and returns to service either way.
//! - `scale` is eager and silent: it only ever retires **idle** slots.
//!   When the target sits below the busy count the pool temporarily
//!   exceeds it and drifts back down as busy slots settle.
//! - Slots above `default_workers` that stay idle past `idle_timeout`
//!   are retired opportunistically on the next pool interaction.
//! - `dispose` rejects every queued item, terminates all slots, and is
//!   idempotent.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::config::EngineConfig;
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};

use super::slot::{Slot, SlotStatus};

/// A queued unit of work: invoked once, drives its own completion
/// channel.
type Job = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

struct PoolState {
    slots: Vec<Slot>,
    queue: VecDeque<Job>,
    /// Logical size last requested via `scale` (or the initial default).
    target: usize,
    next_slot: u64,
    disposed: bool,
}

impl PoolState {
    fn add_slot(&mut self) {
        let slot = Slot::new(self.next_slot);
        self.next_slot += 1;
        self.slots.push(slot);
    }

    fn idle_pos(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.status == SlotStatus::Idle)
    }
}

/// Fixed-capacity cooperative executor with a FIFO pending queue.
pub struct WorkerPool {
    default_workers: usize,
    max_workers: usize,
    idle_timeout: Duration,
    state: Mutex<PoolState>,
    bus: Bus,
}

impl WorkerPool {
    /// Creates a pool sized from the engine config.
    ///
    /// `default_workers` is clamped to `max_workers`; `max_workers` to at
    /// least 1.
    pub fn new(cfg: &EngineConfig, bus: Bus) -> Arc<Self> {
        let cfg = cfg.normalized();
        let max_workers = cfg.max_workers;
        let default_workers = cfg.default_workers;

        let mut state = PoolState {
            slots: Vec::with_capacity(default_workers),
            queue: VecDeque::new(),
            target: default_workers,
            next_slot: 0,
            disposed: false,
        };
        for _ in 0..default_workers {
            state.add_slot();
        }

        Arc::new(Self {
            default_workers,
            max_workers,
            idle_timeout: cfg.idle_timeout,
            state: Mutex::new(state),
            bus,
        })
    }

    /// Runs `f` on the pool and resolves with its result.
    ///
    /// Rejects immediately when the pool is disposed; rejects on await
    /// when the job was still queued at disposal time. A panic inside
    /// the job is contained and surfaces as `Fail("job panicked")`, so
    /// callers can tell a crashed job from a disposal race.
    pub async fn execute<F, Fut, T>(self: &Arc<Self>, f: F) -> Result<T, TaskError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel::<Result<T, TaskError>>();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                let outcome = std::panic::AssertUnwindSafe(async move { f().await })
                    .catch_unwind()
                    .await
                    .map_err(|_| TaskError::fail("job panicked"));
                let _ = tx.send(outcome);
            })
        });

        self.submit(job)?;

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(TaskError::rejected(
                "worker pool disposed before the job settled",
            )),
        }
    }

    /// Admits a job: dispatch into an idle slot or enqueue FIFO.
    fn submit(self: &Arc<Self>, job: Job) -> Result<(), TaskError> {
        let admitted: Result<(u64, Job), usize> = {
            let mut state = self.state.lock();
            if state.disposed {
                return Err(TaskError::rejected("worker pool is disposed"));
            }
            self.sweep_idle(&mut state);

            match state.idle_pos() {
                Some(pos) => {
                    state.slots[pos].status = SlotStatus::Busy;
                    Ok((state.slots[pos].id, job))
                }
                None => {
                    state.queue.push_back(job);
                    Err(state.queue.len())
                }
            }
        };

        match admitted {
            Ok((slot_id, job)) => self.dispatch(slot_id, job),
            Err(depth) => {
                self.bus.publish(
                    Event::now(EventKind::PoolSaturated)
                        .with_reason(format!("queue depth {depth}")),
                );
            }
        }
        Ok(())
    }

    /// Spawns the job and returns the slot to service on settlement.
    ///
    /// The job future cannot panic (user code is contained inside it by
    /// `execute`), so the settle hook always runs.
    fn dispatch(self: &Arc<Self>, slot_id: u64, job: Job) {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            job().await;
            pool.on_settled(slot_id);
        });
    }

    /// Frees the slot, drains one queued item, or retires the slot when
    /// the pool sits above its target.
    fn on_settled(self: &Arc<Self>, slot_id: u64) {
        let next = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            let Some(pos) = state.slots.iter().position(|s| s.id == slot_id) else {
                return;
            };

            if state.slots.len() > state.target {
                state.slots.remove(pos);
                self.publish_resize("target drift", state.slots.len());
                None
            } else {
                state.slots[pos].status = SlotStatus::Idle;
                state.slots[pos].idle_since = Instant::now();
                match state.queue.pop_front() {
                    Some(job) => {
                        state.slots[pos].status = SlotStatus::Busy;
                        Some(job)
                    }
                    None => {
                        self.sweep_idle(&mut state);
                        None
                    }
                }
            }
        };

        if let Some(job) = next {
            self.dispatch(slot_id, job);
        }
    }

    /// Retires surplus idle slots whose idle period exceeded
    /// `idle_timeout`. Never shrinks below `default_workers`.
    fn sweep_idle(&self, state: &mut PoolState) {
        if self.idle_timeout.is_zero() {
            return;
        }
        let timeout = self.idle_timeout;
        let floor = self.default_workers;
        let mut removed = 0;
        while state.slots.len() > floor {
            let Some(pos) = state
                .slots
                .iter()
                .position(|s| s.status == SlotStatus::Idle && s.idle_since.elapsed() >= timeout)
            else {
                break;
            };
            state.slots.remove(pos);
            removed += 1;
        }
        if removed > 0 {
            if state.target > state.slots.len() {
                state.target = state.slots.len();
            }
            self.publish_resize("idle retirement", state.slots.len());
        }
    }

    /// Resizes the pool toward `target`, clamped to `[0, max_workers]`.
    ///
    /// Growing adds idle slots and immediately drains queued work into
    /// them. Shrinking retires idle slots only. Returns the logical size
    /// after scaling.
    pub fn scale(self: &Arc<Self>, target: usize) -> usize {
        let (size, dispatches) = {
            let mut state = self.state.lock();
            if state.disposed {
                return 0;
            }
            let clamped = target.min(self.max_workers);
            let before = state.slots.len();
            state.target = clamped;

            while state.slots.len() < clamped {
                state.add_slot();
            }

            if state.slots.len() > clamped {
                let mut excess = state.slots.len() - clamped;
                state.slots.retain(|s| {
                    if excess > 0 && s.status == SlotStatus::Idle {
                        excess -= 1;
                        false
                    } else {
                        true
                    }
                });
            }

            let mut dispatches = Vec::new();
            loop {
                let Some(pos) = state.idle_pos() else { break };
                let Some(job) = state.queue.pop_front() else { break };
                state.slots[pos].status = SlotStatus::Busy;
                dispatches.push((state.slots[pos].id, job));
            }

            let after = state.slots.len();
            if after != before {
                self.publish_resize("scale", after);
            }
            (after, dispatches)
        };

        for (id, job) in dispatches {
            self.dispatch(id, job);
        }
        size
    }

    /// Rejects queued work, terminates all slots, clears state.
    /// Idempotent.
    pub fn dispose(&self) {
        let rejected = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            for slot in &mut state.slots {
                slot.status = SlotStatus::Terminated;
            }
            state.slots.clear();
            std::mem::take(&mut state.queue)
        };
        // Dropping queued jobs drops their completion channels, which
        // rejects every waiting caller.
        let count = rejected.len();
        drop(rejected);
        self.bus.publish(
            Event::now(EventKind::PoolDisposed).with_reason(format!("rejected {count} queued")),
        );
    }

    fn publish_resize(&self, cause: &str, size: usize) {
        self.bus.publish(
            Event::now(EventKind::PoolScaled).with_reason(format!("{cause}: size {size}")),
        );
    }

    /// Current logical worker count.
    pub fn size(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Number of idle slots.
    pub fn idle_count(&self) -> usize {
        self.state
            .lock()
            .slots
            .iter()
            .filter(|s| s.status == SlotStatus::Idle)
            .count()
    }

    /// Number of busy slots.
    pub fn busy_count(&self) -> usize {
        self.state
            .lock()
            .slots
            .iter()
            .filter(|s| s.status == SlotStatus::Busy)
            .count()
    }

    /// Number of queued jobs.
    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// True once `dispose` has been called.
    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// The hard ceiling on logical workers.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// The configured baseline worker count.
    pub fn default_workers(&self) -> usize {
        self.default_workers
    }
}
