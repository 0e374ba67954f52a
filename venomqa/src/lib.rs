// VenomQA core
//
// A stateful, exploration-driven API testing engine. The core is a tightly
// coupled quartet: the exploration agent (search loop, frontier, step
// budget), the state graph (canonicalised states, transitions, dedup), the
// world model (atomic checkpoint/rollback across heterogeneous systems plus
// a shared context), and the action/invariant evaluation pipeline.
//
// Concrete HTTP transport beyond a minimal adapter, auth injection, storage
// backends, mock servers, CLI framing, reporters, OpenAPI ingestion,
// comparison tooling, notification channels, and security-payload
// catalogues are out of scope for this crate — they are external
// collaborators consumed only through the interfaces in `api`,
// `rollbackable`, and `strategy`.

pub mod action;
pub mod agent;
pub mod api;
pub mod checkpoint;
pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod invariant;
pub mod result;
pub mod rollbackable;
pub mod state;
pub mod strategy;
pub mod testing;
pub mod transition;
pub mod value;
pub mod world;

pub use action::{Action, ActionFn, ActionResult, HttpRequest, HttpResponse, Precondition, ResponseAssertion};
pub use agent::Agent;
pub use api::{ApiClient, ReqwestApiClient, RequestOptions};
pub use config::AgentConfig;
pub use context::Context;
pub use error::VenomError;
pub use graph::Graph;
pub use invariant::{Invariant, Severity, Timing, Verdict, Violation};
pub use result::ExplorationResult;
pub use state::{Observation, State};
pub use strategy::Strategy;
pub use transition::Transition;
pub use value::Value;
pub use world::World;

/// Install a `tracing-subscriber` `EnvFilter` subscriber reading
/// `RUST_LOG`, matching the logging bootstrap pattern used throughout the
/// teacher crate's own binaries. Safe to call more than once; later calls
/// are no-ops once a global subscriber is already set.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}
