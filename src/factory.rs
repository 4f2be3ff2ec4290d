//! # Assembly surface.
//!
//! Three layers of convenience around the core types, none of which
//! leaks internal state:
//!
//! - [`create_authority`] builds an [`Authority`] from an optional
//!   config.
//! - [`ScopeFactory`] binds an authority so callers can mint many
//!   scopes without repeating the reference.
//! - [`TaskFactory`] binds a scope and exposes just `effect`/`run`.
//!
//! A process-global slot ([`install_authority`] /
//! [`current_authority`] / [`reset_authority`]) serves hosts that want
//! one shared authority without threading the handle everywhere.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{EngineConfig, ScopeConfig};
use crate::core::{Authority, Scope, TaskContext, TaskRunOptions};
use crate::error::{KernelError, TaskError};

static CURRENT: RwLock<Option<Arc<Authority>>> = RwLock::new(None);

/// Builds an authority from an optional engine config.
pub fn create_authority(cfg: Option<EngineConfig>) -> Arc<Authority> {
    Authority::new(cfg.unwrap_or_default())
}

/// Installs a process-global authority.
///
/// Fails with [`KernelError::AuthorityAlreadyExists`] when one is
/// already installed; [`reset_authority`] clears the slot.
pub fn install_authority(authority: Arc<Authority>) -> Result<(), KernelError> {
    let mut current = CURRENT.write();
    if current.is_some() {
        return Err(KernelError::AuthorityAlreadyExists);
    }
    *current = Some(authority);
    Ok(())
}

/// Returns the process-global authority.
pub fn current_authority() -> Result<Arc<Authority>, KernelError> {
    CURRENT
        .read()
        .clone()
        .ok_or(KernelError::AuthorityNotInitialized)
}

/// Clears the process-global slot, returning the previous authority.
///
/// The authority is **not** disposed; that stays the caller's call.
pub fn reset_authority() -> Option<Arc<Authority>> {
    CURRENT.write().take()
}

/// Scope constructor bound to one authority.
pub struct ScopeFactory {
    authority: Arc<Authority>,
}

impl ScopeFactory {
    /// Binds the factory to an authority.
    pub fn new(authority: Arc<Authority>) -> Self {
        Self { authority }
    }

    /// Creates a scope under the bound authority.
    pub fn create(&self, cfg: ScopeConfig) -> Result<Arc<Scope>, KernelError> {
        self.authority.create_scope(cfg)
    }

    /// The bound authority.
    pub fn authority(&self) -> &Arc<Authority> {
        &self.authority
    }
}

/// Execution surface bound to one scope: `effect` and `run` only.
pub struct TaskFactory {
    scope: Arc<Scope>,
}

impl TaskFactory {
    /// Binds the factory to a scope.
    pub fn new(scope: Arc<Scope>) -> Self {
        Self { scope }
    }

    /// Delegates to [`Scope::effect`].
    pub fn effect<T>(&self, f: impl FnOnce() -> T) -> Result<T, KernelError> {
        self.scope.effect(f)
    }

    /// Delegates to [`Scope::run`].
    pub async fn run<F, Fut, T>(&self, f: F, opts: TaskRunOptions) -> Result<Arc<T>, KernelError>
    where
        F: FnOnce(TaskContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
        T: Send + Sync + 'static,
    {
        self.scope.run(f, opts).await
    }

    /// The bound scope.
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }
}
