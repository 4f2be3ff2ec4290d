//! # Opaque identities used across the kernel.
//!
//! Two families of identifiers exist:
//!
//! - [`ScopeId`] is **caller-chosen**: the application names its scopes.
//! - [`Ref`], [`WorkerId`], [`HandlerId`] and [`StreamId`] are
//!   **kernel-generated**. A [`Ref`] is unique for the lifetime of the
//!   process; unit ids are unique within their owning task.
//!
//! ## Rules
//! - A [`Ref`] is immutable for the life of a task. A retry is a *new* task
//!   with a fresh ref; refs are never reused or revived.
//! - Generated refs carry a random hex tail so that identities are opaque,
//!   not guessable ordinals.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

/// Global sequence for generated task refs.
static REF_SEQ: AtomicU64 = AtomicU64::new(0);

/// Caller-chosen scope identity.
///
/// At most one live scope per id exists within an authority.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(String);

impl ScopeId {
    /// Creates a scope id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScopeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ScopeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable task identity, globally unique within a process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ref(String);

impl Ref {
    /// Generates a fresh ref: monotonic sequence plus a random hex tail.
    pub fn generate() -> Self {
        let seq = REF_SEQ.fetch_add(1, Ordering::Relaxed);
        let tail: u32 = rand::rng().random();
        Self(format!("task-{seq}-{tail:08x}"))
    }

    /// Wraps an explicit, caller-supplied ref.
    ///
    /// The caller is responsible for uniqueness when bypassing
    /// [`Ref::generate`].
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the ref as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! unit_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            /// Builds the id from a per-task sequence number.
            pub(crate) fn from_seq(seq: u64) -> Self {
                Self(format!(concat!($prefix, "-{}"), seq))
            }

            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

unit_id!(
    /// Identity of a worker within its owning task.
    WorkerId,
    "worker"
);
unit_id!(
    /// Identity of a handler within its owning task.
    HandlerId,
    "handler"
);
unit_id!(
    /// Identity of a stream within its owning task.
    StreamId,
    "stream"
);
