//! Context (C1): the mutable key/value store shared by actions within a
//! branch, plus named client handles that survive rollback.

use crate::value::Value;
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("no client registered as {name:?}; known clients: {known:?}")]
    UnknownClient { name: String, known: Vec<String> },
    #[error("client {name:?} is registered but not of the requested type")]
    WrongClientType { name: String },
}

/// An opaque handle produced by [`Context::snapshot`]. Only `restore` can
/// meaningfully consume it; callers should treat it as inert data.
#[derive(Debug, Clone)]
pub struct ContextSnapshot(BTreeMap<String, Value>);

/// Mutable `string -> Value` mapping shared by actions within a branch, plus
/// named, long-lived client handles.
///
/// Named clients are *not* part of `snapshot`/`restore` — they represent
/// long-lived handles (e.g. an authenticated HTTP client per role) that
/// survive rollback, per spec.md §4.1.
#[derive(Default)]
pub struct Context {
    data: BTreeMap<String, Value>,
    clients: BTreeMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.data.get(key).cloned().unwrap_or(default)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn delete(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Deep-copy the data portion only; named clients are excluded.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot(self.data.clone())
    }

    /// Replace the data portion wholesale; named clients are untouched.
    pub fn restore(&mut self, snapshot: ContextSnapshot) {
        self.data = snapshot.0;
    }

    pub fn register_client<C: Send + Sync + 'static>(&mut self, name: impl Into<String>, client: Arc<C>) {
        self.clients.insert(name.into(), client as Arc<dyn Any + Send + Sync>);
    }

    /// Fetch a previously registered client, downcast to `C`.
    ///
    /// Fails with [`ContextError::UnknownClient`] (carrying the set of known
    /// names, per spec.md §4.1) if `name` was never registered.
    pub fn get_client<C: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<C>, ContextError> {
        let handle = self
            .clients
            .get(name)
            .ok_or_else(|| ContextError::UnknownClient {
                name: name.to_string(),
                known: self.clients.keys().cloned().collect(),
            })?;
        handle
            .clone()
            .downcast::<C>()
            .map_err(|_| ContextError::WrongClientType { name: name.to_string() })
    }

    pub fn has_client(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    pub fn known_clients(&self) -> Vec<String> {
        self.clients.keys().cloned().collect()
    }

    // ─── Precondition primitives (spec.md §4.5) ──────────────────────────

    pub fn has_context(&self, key: &str) -> bool {
        self.has(key)
    }

    pub fn has_context_value(&self, key: &str, expected: &Value) -> bool {
        self.data.get(key) == Some(expected)
    }

    /// Consults the per-run action-execution ledger (a reserved context key)
    /// recording which actions have executed at least once in this branch.
    pub fn action_ran(&self, action_name: &str) -> bool {
        self.data
            .get(ACTION_LEDGER_KEY)
            .and_then(Value::as_map)
            .map(|m| m.contains_key(action_name))
            .unwrap_or(false)
    }

    /// Mark an action as having run, for `action_ran` preconditions. Called
    /// by the Agent after every successful `invoke`.
    pub fn record_action_ran(&mut self, action_name: &str) {
        let mut ledger = self
            .data
            .get(ACTION_LEDGER_KEY)
            .and_then(Value::as_map)
            .cloned()
            .unwrap_or_default();
        ledger.insert(action_name.to_string(), Value::Bool(true));
        self.data.insert(ACTION_LEDGER_KEY.to_string(), Value::Map(ledger));
    }
}

const ACTION_LEDGER_KEY: &str = "__venomqa_action_ledger";
