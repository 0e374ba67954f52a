//! Observation and State (C2): canonical, content-addressed snapshots.

use crate::value::{hash64, to_canonical_bytes, Value};
use std::collections::BTreeMap;

/// One system's contribution to a [`State`].
///
/// Invariant (spec.md §3): `data` must be a deterministic function of the
/// system's state at the moment of observation — no timestamps, no
/// per-call ids leaking in.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Observation {
    pub system: String,
    pub data: Value,
}

impl Observation {
    pub fn new(system: impl Into<String>, data: Value) -> Self {
        Self {
            system: system.into(),
            data,
        }
    }
}

/// An immutable, content-addressed snapshot of all observed subsystems at a
/// logical moment.
///
/// `id` is derived from a canonical serialisation of `observations`, so two
/// states built from field-wise-equal observations always compare equal by
/// id (P1), regardless of construction order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct State {
    pub id: String,
    pub observations: BTreeMap<String, Observation>,
    pub checkpoint_id: Option<String>,
}

impl State {
    /// Build a State from observations, computing its canonical id.
    ///
    /// Mutating a `State` after construction is a programmer error; there is
    /// deliberately no setter for `observations` or `id` — rebuild via
    /// `State::new` instead.
    pub fn new(observations: BTreeMap<String, Observation>, checkpoint_id: Option<String>) -> Self {
        let id = Self::compute_id(&observations);
        Self {
            id,
            observations,
            checkpoint_id,
        }
    }

    fn compute_id(observations: &BTreeMap<String, Observation>) -> String {
        let as_value = Value::Map(
            observations
                .iter()
                .map(|(k, obs)| (k.clone(), obs.data.clone()))
                .collect(),
        );
        let bytes = to_canonical_bytes(&as_value);
        format!("s_{:016x}", hash64(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(system: &str, n: i64) -> Observation {
        Observation::new(system, Value::Int(n))
    }

    #[test]
    fn equal_observations_produce_equal_ids() {
        let a = BTreeMap::from([("db".to_string(), obs("db", 1))]);
        let b = BTreeMap::from([("db".to_string(), obs("db", 1))]);
        assert_eq!(State::new(a, None).id, State::new(b, None).id);
    }

    #[test]
    fn different_observations_produce_different_ids() {
        let a = BTreeMap::from([("db".to_string(), obs("db", 1))]);
        let b = BTreeMap::from([("db".to_string(), obs("db", 2))]);
        assert_ne!(State::new(a, None).id, State::new(b, None).id);
    }

    #[test]
    fn id_has_expected_shape() {
        let a = BTreeMap::from([("db".to_string(), obs("db", 1))]);
        let state = State::new(a, None);
        assert!(state.id.starts_with("s_"));
        assert_eq!(state.id.len(), 18); // "s_" + 16 hex chars
    }

    #[test]
    fn insertion_order_does_not_affect_id() {
        let mut a = BTreeMap::new();
        a.insert("b".to_string(), obs("b", 2));
        a.insert("a".to_string(), obs("a", 1));

        let mut b = BTreeMap::new();
        b.insert("a".to_string(), obs("a", 1));
        b.insert("b".to_string(), obs("b", 2));

        assert_eq!(State::new(a, None).id, State::new(b, None).id);
    }
}
