//! Checkpoint (§3): an opaque, atomic snapshot of all registered systems plus
//! the shared context, keyed by id.

use crate::context::ContextSnapshot;
use crate::value::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub id: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub system_checkpoints: BTreeMap<String, Value>,
    pub context_snapshot: ContextSnapshot,
}

impl Checkpoint {
    pub fn new(
        id: String,
        name: impl Into<String>,
        system_checkpoints: BTreeMap<String, Value>,
        context_snapshot: ContextSnapshot,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: chrono::Utc::now(),
            system_checkpoints,
            context_snapshot,
        }
    }

    pub fn system_checkpoint(&self, system_name: &str) -> Option<&Value> {
        self.system_checkpoints.get(system_name)
    }
}
