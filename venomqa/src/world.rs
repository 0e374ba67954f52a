//! World (C4): the execution sandbox that coordinates the API client, every
//! registered [`Rollbackable`] system, and the shared [`Context`].
//!
//! Checkpoint and rollback are atomic across all systems: every system saves
//! (or restores) its state at the same logical moment, grounded directly on
//! the reference implementation's `World` (`venomqa.v1.world`).

use crate::action::{Action, ActionResult};
use crate::checkpoint::Checkpoint;
use crate::context::Context;
use crate::rollbackable::{Rollbackable, SystemError};
use crate::state::{Observation, State};
use crate::testing::ResourceGraph;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("unknown checkpoint: {0:?}")]
    UnknownCheckpoint(String),
    #[error("system {system:?} failed during {op}: {source}")]
    System {
        system: String,
        op: &'static str,
        #[source]
        source: SystemError,
    },
}

/// The execution sandbox. Owns the API client, the registered systems, and
/// the context actions share.
pub struct World {
    pub api: Arc<dyn crate::api::ApiClient>,
    pub systems: BTreeMap<String, Arc<dyn Rollbackable>>,
    pub context: Context,
    checkpoints: BTreeMap<String, Checkpoint>,
    current_state_id: Option<String>,
}

impl World {
    pub fn new(api: Arc<dyn crate::api::ApiClient>) -> Self {
        Self {
            api,
            systems: BTreeMap::new(),
            context: Context::new(),
            checkpoints: BTreeMap::new(),
            current_state_id: None,
        }
    }

    pub fn register_system(&mut self, name: impl Into<String>, system: Arc<dyn Rollbackable>) {
        self.systems.insert(name.into(), system);
    }

    /// Execute an action against the API, routed through whichever calling
    /// convention the action was built with.
    pub fn act(&mut self, action: &Action) -> ActionResult {
        action.invoke(self.api.as_ref(), &mut self.context)
    }

    /// Observe current state from every registered system. The returned
    /// `State` has no `checkpoint_id` — use [`Self::observe_and_checkpoint`]
    /// if the caller needs to roll back to this state later.
    pub fn observe(&self) -> Result<State, WorldError> {
        let observations = self.observe_systems()?;
        Ok(State::new(observations, None))
    }

    /// Atomically checkpoint then observe (checkpoint first so the observed
    /// state and the checkpoint it is attached to always describe the same
    /// moment — order matters here, mirroring the reference World).
    pub fn observe_and_checkpoint(&mut self, checkpoint_name: &str) -> Result<State, WorldError> {
        let checkpoint_id = self.checkpoint(checkpoint_name)?;
        let observations = self.observe_systems()?;
        let state = State::new(observations, Some(checkpoint_id));
        self.current_state_id = Some(state.id.clone());
        Ok(state)
    }

    fn observe_systems(&self) -> Result<BTreeMap<String, Observation>, WorldError> {
        let mut observations = BTreeMap::new();
        for (name, system) in &self.systems {
            let data = system.observe().map_err(|source| WorldError::System {
                system: name.clone(),
                op: "observe",
                source,
            })?;
            observations.insert(name.clone(), Observation::new(name.clone(), data));
        }
        Ok(observations)
    }

    /// Checkpoint every system and the context, atomically, under one id.
    pub fn checkpoint(&mut self, name: &str) -> Result<String, WorldError> {
        let mut system_checkpoints = BTreeMap::new();
        for (sys_name, system) in &self.systems {
            let value = system.checkpoint(name).map_err(|source| WorldError::System {
                system: sys_name.clone(),
                op: "checkpoint",
                source,
            })?;
            system_checkpoints.insert(sys_name.clone(), value);
        }
        let id = format!("cp_{}", uuid::Uuid::new_v4().simple());
        let checkpoint = Checkpoint::new(id.clone(), name, system_checkpoints, self.context.snapshot());
        self.checkpoints.insert(id.clone(), checkpoint);
        Ok(id)
    }

    /// Roll back every system and the context to a prior checkpoint.
    pub fn rollback(&mut self, checkpoint_id: &str) -> Result<(), WorldError> {
        let checkpoint = self
            .checkpoints
            .get(checkpoint_id)
            .cloned()
            .ok_or_else(|| WorldError::UnknownCheckpoint(checkpoint_id.to_string()))?;

        for (sys_name, system) in &self.systems {
            if let Some(value) = checkpoint.system_checkpoint(sys_name) {
                system.rollback(value).map_err(|source| WorldError::System {
                    system: sys_name.clone(),
                    op: "rollback",
                    source,
                })?;
            }
        }
        self.context.restore(checkpoint.context_snapshot.clone());
        Ok(())
    }

    pub fn get_checkpoint(&self, checkpoint_id: &str) -> Option<&Checkpoint> {
        self.checkpoints.get(checkpoint_id)
    }

    pub fn has_checkpoint(&self, checkpoint_id: &str) -> bool {
        self.checkpoints.contains_key(checkpoint_id)
    }

    pub fn current_state_id(&self) -> Option<&str> {
        self.current_state_id.as_deref()
    }

    /// The registered [`ResourceGraph`], if a system named `"resources"` was
    /// registered and is in fact a `ResourceGraph` (spec.md §4.3's optional
    /// resource-aware precondition support).
    pub fn resources(&self) -> Option<&ResourceGraph> {
        self.systems
            .get("resources")
            .and_then(|system| system.as_any().downcast_ref::<ResourceGraph>())
    }

    pub fn resource_exists(&self, resource_type: &str, id: &str) -> bool {
        self.resources().map(|r| r.exists(resource_type, id)).unwrap_or(false)
    }

    pub fn resource_count_of(&self, resource_type: &str) -> usize {
        self.resources().map(|r| r.count_of(resource_type)).unwrap_or(0)
    }

    /// Whether `action` may run right now: context-only preconditions are
    /// checked first (cheap, no observation needed); `requires` resource
    /// types use the context's id binding (`"{type}_id"`) when one is set,
    /// else fall back to "does any live resource of this type exist"; any
    /// remaining state-based preconditions only trigger an `observe()` if
    /// the action actually declares one.
    pub fn can_execute_action(&self, action: &Action) -> bool {
        for resource_type in &action.requires {
            let context_key = format!("{resource_type}_id");
            match self.context.get(&context_key).and_then(|v| v.as_str()) {
                Some(id) => {
                    if !self.resource_exists(resource_type, id) {
                        return false;
                    }
                }
                None => {
                    if self.resource_count_of(resource_type) == 0 {
                        return false;
                    }
                }
            }
        }

        let context_preconditions_ok = action.preconditions.iter().all(|p| match p {
            crate::action::Precondition::Context(f) => f(&self.context),
            crate::action::Precondition::State(_) => true,
        });
        if !context_preconditions_ok {
            return false;
        }

        if action.preconditions.iter().all(|p| p.is_context_only()) {
            return true;
        }

        match self.observe() {
            Ok(state) => action.preconditions.iter().all(|p| match p {
                crate::action::Precondition::Context(_) => true,
                crate::action::Precondition::State(f) => f(&state),
            }),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests_support::RecordingApi;
    use crate::testing::InMemoryKvSystem;
    use crate::value::Value;

    fn world() -> World {
        World::new(Arc::new(RecordingApi::default()))
    }

    #[test]
    fn observe_and_checkpoint_sets_checkpoint_id() {
        let mut w = world();
        w.register_system("kv", Arc::new(InMemoryKvSystem::new("kv")));
        let state = w.observe_and_checkpoint("initial").unwrap();
        assert!(state.checkpoint_id.is_some());
        assert!(w.has_checkpoint(state.checkpoint_id.as_ref().unwrap()));
    }

    #[test]
    fn rollback_restores_system_and_context() {
        let mut w = world();
        let kv = Arc::new(InMemoryKvSystem::new("kv"));
        w.register_system("kv", kv.clone());
        w.context.set("seen", Value::Bool(true));

        let cp = w.checkpoint("before").unwrap();
        kv.set("x", Value::Int(1));
        w.context.set("seen", Value::Bool(false));

        w.rollback(&cp).unwrap();
        assert_eq!(kv.get("x"), None);
        assert_eq!(w.context.get("seen"), Some(&Value::Bool(true)));
    }

    #[test]
    fn unknown_checkpoint_errors() {
        let mut w = world();
        assert!(matches!(w.rollback("cp_does_not_exist"), Err(WorldError::UnknownCheckpoint(_))));
    }

    #[test]
    fn can_execute_action_without_graph_passes_by_default() {
        let w = world();
        let action = Action::simple("test", |api| api.get("/test", Default::default()));
        assert!(w.can_execute_action(&action));
    }

    #[test]
    fn can_execute_action_checks_resource_requirement() {
        let mut w = world();
        w.register_system("resources", Arc::new(ResourceGraph::new(Default::default())));
        let action = Action::simple("create_upload", |api| api.get("/test", Default::default()))
            .with_requires(vec!["workspace".to_string()]);

        assert!(!w.can_execute_action(&action));

        w.resources().unwrap().create("workspace", "ws_123", None);
        w.context.set("workspace_id", Value::Str("ws_123".into()));
        assert!(w.can_execute_action(&action));

        w.resources().unwrap().destroy("workspace", "ws_123");
        assert!(!w.can_execute_action(&action));
    }

    #[test]
    fn act_invokes_action_against_api() {
        let mut w = world();
        let action = Action::simple("ping", |api| api.get("/ping", Default::default()));
        let result = w.act(&action);
        assert!(result.success);
    }
}
