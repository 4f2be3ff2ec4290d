//! # Error types used by the kernel and by task executions.
//!
//! This module defines two main error enums:
//!
//! - [`KernelError`] failures raised by the orchestration layer itself
//!   (scope registry, authority surface, lifecycle gates).
//! - [`TaskError`] failures raised by individual task executions and their
//!   owned units.
//!
//! Both types provide `as_label` helpers for logs and metrics.
//! [`TaskError`] additionally distinguishes cooperative cancellation
//! (`is_abort`) from genuine failures.

use std::time::Duration;

use thiserror::Error;

use crate::ids::ScopeId;

/// # Errors produced by the orchestration layer.
///
/// These represent failures of the kernel surfaces: authority, scope
/// registry, and lifecycle gating. Execution failures bubble up through
/// the [`KernelError::Execution`] bridge.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum KernelError {
    /// No scope with the given id is registered.
    #[error("scope '{scope_id}' not found")]
    ScopeNotFound {
        /// The missing scope id.
        scope_id: ScopeId,
    },

    /// A live scope with the given id already exists in the authority.
    #[error("Scope \"{scope_id}\" already exists")]
    ScopeAlreadyExists {
        /// The duplicate scope id.
        scope_id: ScopeId,
    },

    /// The scope exists but does not permit the requested operation.
    ///
    /// `reason` is `"disposed"` when the scope is past its lifetime and
    /// `"not ready"` when it has not been mounted yet.
    #[error("scope '{scope_id}' is inactive: {reason}")]
    ScopeInactive {
        /// The inactive scope id.
        scope_id: ScopeId,
        /// Why the scope rejected the operation.
        reason: &'static str,
    },

    /// No authority is available: never installed, or already disposed.
    #[error("authority is not initialized")]
    AuthorityNotInitialized,

    /// An authority is already installed for this process.
    #[error("authority already exists")]
    AuthorityAlreadyExists,

    /// An execution-level failure, surfaced through a kernel API.
    #[error(transparent)]
    Execution(#[from] TaskError),
}

impl KernelError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            KernelError::ScopeNotFound { .. } => "kernel_scope_not_found",
            KernelError::ScopeAlreadyExists { .. } => "kernel_scope_already_exists",
            KernelError::ScopeInactive { .. } => "kernel_scope_inactive",
            KernelError::AuthorityNotInitialized => "kernel_authority_not_initialized",
            KernelError::AuthorityAlreadyExists => "kernel_authority_already_exists",
            KernelError::Execution(e) => e.as_label(),
        }
    }

    /// True when the underlying cause is a cooperative abort.
    pub fn is_abort(&self) -> bool {
        matches!(self, KernelError::Execution(e) if e.is_abort())
    }
}

/// # Errors produced by task execution.
///
/// These represent failures of a single execution: a rejected request, a
/// timeout imposed by the caller, a fatal or retryable user failure, or a
/// cooperative cancellation.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Request refused before any user code ran: pool disposed, task not
    /// pending, unit contract violated.
    #[error("execution rejected: {reason}")]
    Rejected {
        /// Why the request was refused.
        reason: String,
    },

    /// A caller-imposed deadline elapsed.
    ///
    /// The kernel never times executions out on its own; callers race a
    /// timer against the task and abort it.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The elapsed deadline.
        timeout: Duration,
    },

    /// Non-recoverable failure. A new task would fail the same way.
    #[error("fatal error (no retry): {reason}")]
    Fatal {
        /// Failure description.
        reason: String,
    },

    /// Execution failed but a fresh task may succeed.
    #[error("execution failed: {reason}")]
    Fail {
        /// Failure description.
        reason: String,
    },

    /// The execution observed its cancellation signal and exited.
    ///
    /// This is **not an error** in the traditional sense; it signals
    /// intentional termination.
    #[error("execution aborted")]
    Canceled,
}

impl TaskError {
    /// Builds a [`TaskError::Rejected`] from any string-like reason.
    pub fn rejected(reason: impl Into<String>) -> Self {
        TaskError::Rejected {
            reason: reason.into(),
        }
    }

    /// Builds a [`TaskError::Fail`] from any string-like reason.
    pub fn fail(reason: impl Into<String>) -> Self {
        TaskError::Fail {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Rejected { .. } => "task_rejected",
            TaskError::Timeout { .. } => "task_timeout",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// True for cooperative cancellation.
    pub fn is_abort(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }

    /// Indicates whether a fresh task may succeed where this one failed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Timeout { .. } | TaskError::Fail { .. })
    }

    /// Indicates whether the error is fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TaskError::Fatal { .. })
    }
}

impl From<tokio::time::error::Elapsed> for TaskError {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        TaskError::Fail {
            reason: e.to_string(),
        }
    }
}
