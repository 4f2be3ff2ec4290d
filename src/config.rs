//! # Engine and scope configuration.
//!
//! [`EngineConfig`] sizes the authority-owned worker pool and the event
//! bus. [`ScopeConfig`] names a scope and optionally requests pool
//! capacity on its behalf.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use scopegate::{EngineConfig, ScopeConfig};
//!
//! let mut cfg = EngineConfig::default();
//! cfg.default_workers = 1;
//! cfg.max_workers = 4;
//! cfg.idle_timeout = Duration::from_secs(10);
//!
//! let scope = ScopeConfig::new("downloads", "Downloads").with_workers(2);
//! assert_eq!(scope.workers, Some(2));
//! ```

use std::time::Duration;

use crate::ids::ScopeId;

/// Global configuration for the authority's engine.
///
/// Controls pool sizing, idle-worker decay, and event bus capacity.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Number of logical workers the pool starts with.
    pub default_workers: usize,
    /// Hard ceiling on logical workers; `scale` requests are clamped to it.
    pub max_workers: usize,
    /// Idle duration after which surplus workers (above `default_workers`)
    /// are retired on the next pool interaction. Zero disables the sweep.
    pub idle_timeout: Duration,
    /// Capacity of the kernel event bus channel.
    pub bus_capacity: usize,
}

impl EngineConfig {
    /// Returns a copy with impossible combinations clamped: at least
    /// one worker slot, `default_workers` within `max_workers`, and a
    /// nonzero bus capacity.
    ///
    /// The authority and the pool only ever consume normalized configs,
    /// so a zeroed-out config degrades to the smallest working engine
    /// instead of an unusable one.
    pub fn normalized(&self) -> Self {
        let max_workers = self.max_workers.max(1);
        Self {
            default_workers: self.default_workers.min(max_workers),
            max_workers,
            idle_timeout: self.idle_timeout,
            bus_capacity: self.bus_capacity.max(1),
        }
    }
}

impl Default for EngineConfig {
    /// Provides a default configuration:
    /// - `default_workers = 2`
    /// - `max_workers = 8`
    /// - `idle_timeout = 30s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            default_workers: 2,
            max_workers: 8,
            idle_timeout: Duration::from_secs(30),
            bus_capacity: 1024,
        }
    }
}

/// Configuration for a single scope.
#[derive(Clone, Debug)]
pub struct ScopeConfig {
    /// Caller-chosen identity; at most one live scope per id.
    pub id: ScopeId,
    /// Human-readable name for logs and events.
    pub name: String,
    /// Requested logical worker count. When it exceeds the pool's current
    /// size, the authority scales the pool up (never past `max_workers`).
    pub workers: Option<usize>,
}

impl ScopeConfig {
    /// Creates a scope configuration with no worker request.
    pub fn new(id: impl Into<ScopeId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            workers: None,
        }
    }

    /// Requests a logical worker count for this scope.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }
}
