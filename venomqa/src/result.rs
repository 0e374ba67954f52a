//! ExplorationResult (§6.3): the report `Agent::explore` returns.
//!
//! Grounded in `tests/v1/test_core.py::TestExplorationResult` — `success`,
//! `states_visited`, `high_violations`, `finish()`, `summary()`.

use crate::graph::Graph;
use crate::invariant::{Severity, Violation};
use crate::value::Value;
use std::collections::BTreeMap;

pub struct ExplorationResult {
    pub graph: Graph,
    pub violations: Vec<Violation>,
    pub states_visited: usize,
    pub transitions_taken: usize,
    pub steps_taken: usize,
    pub action_coverage_percent: f64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_ms: Option<f64>,
    /// Set when a system operation (`observe`/`checkpoint`/`rollback`)
    /// failed fatally mid-run; the run stopped early and this result is
    /// partial (§7 `SystemFailure`).
    pub terminal_error: Option<String>,
}

impl ExplorationResult {
    pub fn new(graph: Graph, violations: Vec<Violation>, steps_taken: usize, started_at: chrono::DateTime<chrono::Utc>, terminal_error: Option<String>) -> Self {
        let states_visited = graph.state_count();
        let transitions_taken = graph.transition_count();
        let action_coverage_percent = if graph.action_count() == 0 {
            0.0
        } else {
            let covered = graph.actions().iter().filter(|a| graph.action_call_count(&a.name) > 0).count();
            (covered as f64 / graph.action_count() as f64) * 100.0
        };
        Self {
            graph,
            violations,
            states_visited,
            transitions_taken,
            steps_taken,
            action_coverage_percent,
            started_at,
            finished_at: None,
            duration_ms: None,
            terminal_error,
        }
    }

    /// True iff no violation of severity `High` or `Critical` was recorded
    /// and the run did not stop on a terminal error (spec.md §6.3).
    pub fn success(&self) -> bool {
        self.terminal_error.is_none()
            && !self
                .violations
                .iter()
                .any(|v| matches!(v.severity, Severity::High | Severity::Critical))
    }

    pub fn high_violations(&self) -> Vec<&Violation> {
        self.violations.iter().filter(|v| v.severity == Severity::High).collect()
    }

    pub fn critical_violations(&self) -> Vec<&Violation> {
        self.violations.iter().filter(|v| v.severity == Severity::Critical).collect()
    }

    /// Stamp `finished_at`/`duration_ms`. Idempotent only in the sense that
    /// calling it twice overwrites both with the latest timestamp — callers
    /// should call it exactly once, right after `explore` returns.
    pub fn finish(&mut self) {
        let now = chrono::Utc::now();
        self.duration_ms = Some((now - self.started_at).num_milliseconds() as f64);
        self.finished_at = Some(now);
    }

    /// A stable, sorted summary for reporting/logging (spec.md §6.3).
    pub fn summary(&self) -> BTreeMap<String, Value> {
        let mut map = BTreeMap::new();
        map.insert("states_visited".to_string(), Value::Int(self.states_visited as i64));
        map.insert("transitions_taken".to_string(), Value::Int(self.transitions_taken as i64));
        map.insert("steps_taken".to_string(), Value::Int(self.steps_taken as i64));
        map.insert("violations".to_string(), Value::Int(self.violations.len() as i64));
        map.insert("action_coverage_percent".to_string(), Value::Float(self.action_coverage_percent));
        map.insert("success".to_string(), Value::Bool(self.success()));
        map.insert(
            "terminal_error".to_string(),
            self.terminal_error.clone().map(Value::Str).unwrap_or(Value::Null),
        );
        if let Some(ms) = self.duration_ms {
            map.insert("duration_ms".to_string(), Value::Float(ms));
        }
        map
    }
}
