//! Rollbackable systems (C3): the capability interface every backend
//! (database, queue, mail, object storage, mock HTTP server...) implements
//! to participate in atomic checkpoint/rollback.
//!
//! The core ships no production implementations — see [`crate::testing`]
//! for the illustrative in-repo backends used by this crate's own tests.

use crate::value::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SystemError {
    #[error("{0}")]
    Other(String),
}

impl SystemError {
    pub fn other(msg: impl Into<String>) -> Self {
        SystemError::Other(msg.into())
    }
}

/// A subsystem that can be checkpointed, rolled back, and observed.
///
/// Promoted to an explicit trait rather than the duck-typed
/// `hasattr(sys, "checkpoint")` style of the reference implementation, per
/// Design Notes: "In a statically typed target, promote to an explicit
/// capability / interface; Graph and World depend on that interface,
/// concrete backends live in adjacent packages."
///
/// Contracts (spec.md §4.3):
/// - `rollback` MUST be idempotent and MUST succeed even if interleaved with
///   foreign mutations, provided the opaque handle was produced by this
///   system.
/// - `observe` MUST be a deterministic function of current state (no
///   timestamps, no per-call ids).
pub trait Rollbackable: Send + Sync + std::any::Any {
    fn name(&self) -> &str;

    /// Capture all state needed to restore, before any further mutations.
    fn checkpoint(&self, name: &str) -> Result<Value, SystemError>;

    /// Restore to the moment captured by `checkpoint`.
    fn rollback(&self, checkpoint: &Value) -> Result<(), SystemError>;

    /// Return the data dictionary contributing to a [`crate::state::State`].
    fn observe(&self) -> Result<Value, SystemError>;

    /// Enables [`crate::world::World`] to recover a concrete system type
    /// (e.g. its resource graph) from the type-erased system map.
    fn as_any(&self) -> &dyn std::any::Any;
}
