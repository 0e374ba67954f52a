//! Crate-wide error umbrella.
//!
//! Each module boundary owns its own leaf error enum (`ContextError`,
//! `WorldError`, `ActionResultError`, `ConfigError`); `VenomError` wraps them
//! for call sites (config loading, embedding applications) that want a
//! single `Result<_, VenomError>` rather than matching on the leaf type
//! directly, the same umbrella-over-leaves shape as `ccos`'s own top-level
//! error type over `WorkingMemoryError`/`GovernanceError`/etc.
//!
//! `Agent::explore` itself does not return `Result<_, VenomError>` — per
//! spec.md §7, system failures are *caught* and surfaced as
//! `ExplorationResult::terminal_error`, not propagated as an `Err`. This
//! umbrella exists for the error paths that are still programmer errors
//! (config parsing, unknown client/checkpoint lookups surfaced directly to
//! an embedding application).

use crate::context::ContextError;
use crate::world::WorldError;

#[derive(Debug, thiserror::Error)]
pub enum VenomError {
    #[error(transparent)]
    World(#[from] WorldError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}
