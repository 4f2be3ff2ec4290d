//! # Authority - the process-wide root.
//!
//! The [`Authority`] owns the worker pool and the event bus, registers
//! scopes (one live scope per id), and mediates synchronous broadcast
//! between application components.
//!
//! ## Architecture
//! ```text
//! Authority
//!   ├── DashMap<ScopeId, Scope>     scope registry
//!   ├── channels: name -> listeners broadcast mediator (synchronous)
//!   ├── WorkerPool                  shared execution capacity
//!   ├── Bus                         kernel event plane
//!   └── pump -> SubscriberSet       non-blocking observer fan-out
//! ```
//!
//! ## Rules
//! - Broadcast delivery is synchronous, in subscription order, over a
//!   snapshot of the listener set: listeners added during delivery do
//!   not receive the in-flight value.
//! - A panicking listener is reported on the bus and never prevents
//!   delivery to later listeners.
//! - Disposal cascades: dispose every scope, clear scope and listener
//!   tables, dispose the pool. Idempotent.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::{EngineConfig, ScopeConfig};
use crate::error::KernelError;
use crate::events::{Bus, Event, EventKind};
use crate::ids::ScopeId;
use crate::pool::WorkerPool;
use crate::subscribers::{Subscribe, SubscriberSet};

use super::scope::Scope;

/// Type-erased value fanned out by [`Authority::broadcast`].
pub type BroadcastData = Arc<dyn Any + Send + Sync>;

type Listener = Arc<dyn Fn(&BroadcastData) + Send + Sync>;
type ChannelTable = Mutex<HashMap<String, Vec<(u64, Listener)>>>;

/// Process-wide registry of scopes, owner of the worker pool, and
/// broadcast mediator.
pub struct Authority {
    scopes: DashMap<ScopeId, Arc<Scope>>,
    channels: Arc<ChannelTable>,
    next_listener: AtomicU64,
    pool: Arc<WorkerPool>,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    runtime_token: CancellationToken,
    disposed: AtomicBool,
}

impl Authority {
    /// Creates an authority with no observers attached.
    pub fn new(cfg: EngineConfig) -> Arc<Self> {
        Self::with_subscribers(cfg, Vec::new())
    }

    /// Creates an authority and attaches event subscribers.
    ///
    /// With at least one subscriber a background pump is spawned to feed
    /// the [`SubscriberSet`] from the bus, which requires a running
    /// tokio runtime. With no subscribers nothing is spawned.
    pub fn with_subscribers(cfg: EngineConfig, subscribers: Vec<Arc<dyn Subscribe>>) -> Arc<Self> {
        let cfg = cfg.normalized();
        let bus = Bus::new(&cfg);
        let pool = WorkerPool::new(&cfg, bus.clone());
        let subs = Arc::new(SubscriberSet::new(subscribers, bus.clone()));

        let authority = Arc::new(Self {
            scopes: DashMap::new(),
            channels: Arc::new(Mutex::new(HashMap::new())),
            next_listener: AtomicU64::new(0),
            pool,
            bus,
            subs,
            runtime_token: CancellationToken::new(),
            disposed: AtomicBool::new(false),
        });

        if !authority.subs.is_empty() {
            authority.spawn_pump();
        }
        authority
    }

    /// Feeds bus events to the subscriber set until teardown.
    fn spawn_pump(self: &Arc<Self>) {
        let mut rx = self.bus.subscribe();
        let subs = Arc::clone(&self.subs);
        let token = self.runtime_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => subs.deliver(ev),
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
        });
    }

    /// Registers a new scope.
    ///
    /// Fails when the authority is disposed or a live scope with the
    /// same id exists. A worker request above the pool's current size
    /// scales the pool up (clamped to `max_workers`).
    pub fn create_scope(&self, cfg: ScopeConfig) -> Result<Arc<Scope>, KernelError> {
        if self.is_disposed() {
            return Err(KernelError::AuthorityNotInitialized);
        }

        let scope_id = cfg.id.clone();
        match self.scopes.entry(scope_id) {
            dashmap::mapref::entry::Entry::Occupied(e) => Err(KernelError::ScopeAlreadyExists {
                scope_id: e.key().clone(),
            }),
            dashmap::mapref::entry::Entry::Vacant(v) => {
                if let Some(workers) = cfg.workers {
                    if workers > self.pool.size() {
                        self.pool.scale(workers);
                    }
                }
                let scope = Scope::new(cfg, Arc::clone(&self.pool), self.bus.clone());
                v.insert(Arc::clone(&scope));
                Ok(scope)
            }
        }
    }

    /// Looks a scope up by id.
    pub fn get_scope(&self, id: &ScopeId) -> Option<Arc<Scope>> {
        self.scopes.get(id).map(|e| Arc::clone(e.value()))
    }

    /// True when a scope with the given id is registered.
    pub fn has_scope(&self, id: &ScopeId) -> bool {
        self.scopes.contains_key(id)
    }

    /// Removes the scope mapping **without** disposing the scope.
    ///
    /// Used by bindings that tear their scope down themselves and then
    /// drop the reference. Returns whether a mapping was removed.
    pub fn unregister_scope(&self, id: &ScopeId) -> bool {
        self.scopes.remove(id).is_some()
    }

    /// Ids of all registered scopes.
    pub fn scope_ids(&self) -> Vec<ScopeId> {
        self.scopes.iter().map(|e| e.key().clone()).collect()
    }

    /// Subscribes a listener to a broadcast channel.
    ///
    /// Delivery order within a channel is subscription order. The
    /// returned guard unsubscribes explicitly; dropping it does not.
    /// A disposed authority returns an inert guard.
    pub fn subscribe(
        &self,
        channel: &str,
        listener: impl Fn(&BroadcastData) + Send + Sync + 'static,
    ) -> BroadcastSubscription {
        if self.is_disposed() {
            return BroadcastSubscription { slot: None };
        }

        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.channels
            .lock()
            .entry(channel.to_string())
            .or_default()
            .push((id, Arc::new(listener)));

        BroadcastSubscription {
            slot: Some((Arc::downgrade(&self.channels), channel.to_string(), id)),
        }
    }

    /// Synchronously fans `data` out to every listener of `channel`.
    ///
    /// The listener set is snapshot at broadcast time; panicking
    /// listeners are reported on the bus and skipped. Returns the number
    /// of listeners the value was delivered to.
    pub fn broadcast<D: Any + Send + Sync>(&self, channel: &str, data: D) -> usize {
        let snapshot: Vec<Listener> = {
            let channels = self.channels.lock();
            match channels.get(channel) {
                Some(listeners) => listeners.iter().map(|(_, l)| Arc::clone(l)).collect(),
                None => return 0,
            }
        };

        let data: BroadcastData = Arc::new(data);
        let mut delivered = 0;
        for listener in snapshot {
            let outcome =
                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(&data)));
            match outcome {
                Ok(()) => delivered += 1,
                Err(_) => {
                    self.bus.publish(
                        Event::now(EventKind::ListenerPanicked)
                            .with_reason(format!("channel '{channel}'")),
                    );
                }
            }
        }
        delivered
    }

    /// Tears the whole kernel down. Idempotent.
    ///
    /// Disposes every scope (aborting its tasks), clears the scope and
    /// listener tables, disposes the pool, and stops the subscriber
    /// pump.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let scopes: Vec<Arc<Scope>> = self.scopes.iter().map(|e| Arc::clone(e.value())).collect();
        for scope in &scopes {
            scope.dispose();
            scope.clear_tasks();
        }
        self.scopes.clear();
        self.channels.lock().clear();
        self.pool.dispose();

        self.bus.publish(Event::now(EventKind::AuthorityDisposed));
        self.runtime_token.cancel();
        self.subs.shutdown();
    }

    /// True once `dispose` has been called.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Number of registered scopes.
    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Current logical size of the worker pool.
    pub fn worker_pool_size(&self) -> usize {
        self.pool.size()
    }

    /// Number of idle pool workers.
    pub fn idle_worker_count(&self) -> usize {
        self.pool.idle_count()
    }

    /// Number of busy pool workers.
    pub fn busy_worker_count(&self) -> usize {
        self.pool.busy_count()
    }

    /// The kernel event bus; subscribe for raw event access.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }
}

/// Unsubscribe guard returned by [`Authority::subscribe`].
pub struct BroadcastSubscription {
    slot: Option<(Weak<ChannelTable>, String, u64)>,
}

impl BroadcastSubscription {
    /// True when this subscription registered a live listener.
    pub fn is_registered(&self) -> bool {
        self.slot.is_some()
    }

    /// Removes the listener from its channel.
    ///
    /// Returns `true` when a registration was actually removed. Empty
    /// channels are pruned from the table.
    pub fn unsubscribe(self) -> bool {
        let Some((channels, channel, id)) = self.slot else {
            return false;
        };
        let Some(channels) = channels.upgrade() else {
            return false;
        };
        let mut channels = channels.lock();
        let Some(listeners) = channels.get_mut(&channel) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            channels.remove(&channel);
        }
        removed
    }
}
