//! Illustrative, in-repo [`Rollbackable`] backends.
//!
//! The core ships no production backends of its own — a real deployment
//! wires in its own database, queue, or object-store adapters. These two
//! exist so this crate's own tests (and downstream integration tests) have
//! something concrete to register on a [`crate::world::World`] without
//! pulling in a real database.

use crate::rollbackable::{Rollbackable, SystemError};
use crate::value::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// A flat key/value store, checkpointed by cloning the whole map.
///
/// Grounded in the reference implementation's in-memory mock systems (e.g.
/// `mock_moltbook.rs`'s `Arc<Mutex<HashMap>>` server state), reworked away
/// from a single shared global into an explicit, named, per-world instance.
#[derive(Default)]
pub struct InMemoryKvSystem {
    name: String,
    data: Mutex<BTreeMap<String, Value>>,
}

impl InMemoryKvSystem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.data.lock().unwrap().insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.lock().unwrap().get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.data.lock().unwrap().remove(key)
    }
}

impl Rollbackable for InMemoryKvSystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn checkpoint(&self, _name: &str) -> Result<Value, SystemError> {
        Ok(Value::Map(self.data.lock().unwrap().clone()))
    }

    fn rollback(&self, checkpoint: &Value) -> Result<(), SystemError> {
        let map = checkpoint
            .as_map()
            .ok_or_else(|| SystemError::other("kv checkpoint is not a map"))?;
        *self.data.lock().unwrap() = map.clone();
        Ok(())
    }

    fn observe(&self) -> Result<Value, SystemError> {
        Ok(Value::Map(self.data.lock().unwrap().clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A resource type in a [`ResourceSchema`], optionally scoped under a
/// parent type (e.g. an `upload` belongs to a `workspace`).
#[derive(Debug, Clone)]
pub struct ResourceType {
    pub name: String,
    pub parent: Option<String>,
}

impl ResourceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), parent: None }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceSchema {
    pub types: BTreeMap<String, ResourceType>,
}

#[derive(Debug, Clone)]
struct ResourceRecord {
    parent_id: Option<String>,
    alive: bool,
}

/// Tracks the lifecycle (create/destroy) of API-created resources across a
/// run, so `requires`-tagged [`crate::action::Action`]s can gate on "does a
/// live resource of this type exist" rather than relying on fragile
/// response-body scraping.
///
/// Destroyed resources are soft-deleted (kept, marked dead) rather than
/// removed, so a rollback to a checkpoint taken before the destroy brings
/// them back alive.
pub struct ResourceGraph {
    schema: ResourceSchema,
    resources: Mutex<BTreeMap<(String, String), ResourceRecord>>,
}

impl ResourceGraph {
    pub fn new(schema: ResourceSchema) -> Self {
        Self { schema, resources: Mutex::new(BTreeMap::new()) }
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    pub fn create(&self, resource_type: &str, id: &str, parent_id: Option<&str>) {
        self.resources.lock().unwrap().insert(
            (resource_type.to_string(), id.to_string()),
            ResourceRecord { parent_id: parent_id.map(str::to_string), alive: true },
        );
    }

    pub fn destroy(&self, resource_type: &str, id: &str) {
        if let Some(record) = self
            .resources
            .lock()
            .unwrap()
            .get_mut(&(resource_type.to_string(), id.to_string()))
        {
            record.alive = false;
        }
    }

    pub fn exists(&self, resource_type: &str, id: &str) -> bool {
        self.resources
            .lock()
            .unwrap()
            .get(&(resource_type.to_string(), id.to_string()))
            .map(|r| r.alive)
            .unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.resources.lock().unwrap().values().filter(|r| r.alive).count()
    }

    /// Count of live resources of a given `resource_type`, ignoring id.
    pub fn count_of(&self, resource_type: &str) -> usize {
        self.resources
            .lock()
            .unwrap()
            .iter()
            .filter(|((rtype, _), r)| rtype == resource_type && r.alive)
            .count()
    }
}

impl Rollbackable for ResourceGraph {
    fn name(&self) -> &str {
        "resources"
    }

    fn checkpoint(&self, _name: &str) -> Result<Value, SystemError> {
        let entries = self
            .resources
            .lock()
            .unwrap()
            .iter()
            .map(|((rtype, id), record)| {
                let mut entry = BTreeMap::new();
                entry.insert("type".to_string(), Value::Str(rtype.clone()));
                entry.insert("id".to_string(), Value::Str(id.clone()));
                entry.insert(
                    "parent_id".to_string(),
                    record.parent_id.clone().map(Value::Str).unwrap_or(Value::Null),
                );
                entry.insert("alive".to_string(), Value::Bool(record.alive));
                Value::Map(entry)
            })
            .collect();
        Ok(Value::Seq(entries))
    }

    fn rollback(&self, checkpoint: &Value) -> Result<(), SystemError> {
        let entries = match checkpoint {
            Value::Seq(entries) => entries,
            _ => return Err(SystemError::other("resource graph checkpoint is not a sequence")),
        };
        let mut restored = BTreeMap::new();
        for entry in entries {
            let rtype = entry
                .get("type")
                .and_then(Value::as_str)
                .ok_or_else(|| SystemError::other("resource checkpoint entry missing type"))?
                .to_string();
            let id = entry
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| SystemError::other("resource checkpoint entry missing id"))?
                .to_string();
            let parent_id = entry.get("parent_id").and_then(Value::as_str).map(str::to_string);
            let alive = matches!(entry.get("alive"), Some(Value::Bool(true)));
            restored.insert((rtype, id), ResourceRecord { parent_id, alive });
        }
        *self.resources.lock().unwrap() = restored;
        Ok(())
    }

    fn observe(&self) -> Result<Value, SystemError> {
        let mut data = BTreeMap::new();
        data.insert("count".to_string(), Value::Int(self.count() as i64));
        Ok(Value::Map(data))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_system_checkpoint_rollback() {
        let sys = InMemoryKvSystem::new("kv");
        sys.set("x", Value::Int(1));
        let cp = sys.checkpoint("before").unwrap();
        sys.set("x", Value::Int(2));
        assert_eq!(sys.get("x"), Some(Value::Int(2)));
        sys.rollback(&cp).unwrap();
        assert_eq!(sys.get("x"), Some(Value::Int(1)));
    }

    #[test]
    fn resource_graph_tracks_lifecycle() {
        let schema = ResourceSchema {
            types: BTreeMap::from([
                ("workspace".to_string(), ResourceType::new("workspace")),
                ("upload".to_string(), ResourceType::new("upload").with_parent("workspace")),
            ]),
        };
        let graph = ResourceGraph::new(schema);
        assert!(!graph.exists("workspace", "ws_123"));
        graph.create("workspace", "ws_123", None);
        assert!(graph.exists("workspace", "ws_123"));
        assert_eq!(graph.count(), 1);
    }

    #[test]
    fn resource_graph_rollback_restores_destroyed() {
        let graph = ResourceGraph::new(ResourceSchema::default());
        graph.create("workspace", "ws_123", None);
        let cp = graph.checkpoint("with_ws").unwrap();
        graph.destroy("workspace", "ws_123");
        assert!(!graph.exists("workspace", "ws_123"));
        graph.rollback(&cp).unwrap();
        assert!(graph.exists("workspace", "ws_123"));
    }

    #[test]
    fn resource_graph_rollback_forgets_created_after_checkpoint() {
        let graph = ResourceGraph::new(ResourceSchema::default());
        graph.create("workspace", "ws_123", None);
        let cp = graph.checkpoint("before_upload").unwrap();
        graph.create("upload", "up_1", Some("ws_123"));
        assert!(graph.exists("upload", "up_1"));
        graph.rollback(&cp).unwrap();
        assert!(graph.exists("workspace", "ws_123"));
        assert!(!graph.exists("upload", "up_1"));
    }
}
