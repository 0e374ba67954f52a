//! Invariant & Violation (C6).

use crate::action::ActionResult;
use crate::state::State;
use crate::transition::Transition;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Timing {
    Pre,
    Post,
    Both,
}

/// The result of an invariant check: `Pass`, or `Fail` carrying an optional
/// dynamic message (Design Notes: "Precondition / check returning union
/// `bool | string`": represented here as a sum type rather than overloading
/// a boolean return).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
}

impl Verdict {
    pub fn fail(msg: impl Into<String>) -> Self {
        Verdict::Fail(msg.into())
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl From<bool> for Verdict {
    fn from(b: bool) -> Self {
        if b {
            Verdict::Pass
        } else {
            Verdict::Fail(String::new())
        }
    }
}

/// A total predicate over the world, evaluated pre- and/or post-action.
#[derive(Clone)]
pub struct Invariant {
    pub name: String,
    pub check: Arc<dyn Fn(&crate::world::World) -> Verdict + Send + Sync>,
    pub message: String,
    pub severity: Severity,
    pub timing: Timing,
}

impl Invariant {
    pub fn new(
        name: impl Into<String>,
        check: impl Fn(&crate::world::World) -> Verdict + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
            message: String::new(),
            severity: Severity::Medium,
            timing: Timing::Post,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Evaluate, containing a panicking check as a pass (§7
    /// `InvariantCheckRaised`: "A check that raises is treated as a pass and
    /// logged; invariants must be total.").
    pub fn evaluate(&self, world: &crate::world::World) -> Verdict {
        let check = &self.check;
        match catch_unwind(AssertUnwindSafe(|| check(world))) {
            Ok(verdict) => verdict,
            Err(_) => {
                tracing::warn!(invariant = %self.name, "invariant check panicked; treated as pass");
                Verdict::Pass
            }
        }
    }

    /// Resolve a failing verdict into the message to attach to a
    /// [`Violation`]: the dynamic message if non-empty, else the
    /// invariant's static `message`.
    fn resolve_message(&self, verdict: &Verdict) -> String {
        match verdict {
            Verdict::Fail(msg) if !msg.is_empty() => msg.clone(),
            _ => self.message.clone(),
        }
    }
}

impl PartialEq for Invariant {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Invariant {}

/// A failing invariant together with its state, trigger, and reproduction
/// path.
///
/// `action` holds the triggering action's *name*, not the `Action` value
/// itself — `Action` carries non-serialisable closures (`Arc<dyn Fn(..)>`),
/// and the name is all a reproduction report needs (spec.md §6.4 already
/// treats `Transition`'s serialised shape as `action: <name>`, so this
/// mirrors that convention rather than inventing a new one).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Violation {
    pub id: String,
    pub invariant_name: String,
    pub state: State,
    pub message: String,
    pub severity: Severity,
    pub action: Option<String>,
    pub action_result: Option<ActionResult>,
    pub reproduction_path: Vec<Transition>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl Violation {
    pub fn new(
        invariant: &Invariant,
        verdict: &Verdict,
        state: State,
        action: Option<String>,
        action_result: Option<ActionResult>,
        reproduction_path: Vec<Transition>,
    ) -> Self {
        Self {
            id: format!("v_{:.12}", uuid::Uuid::new_v4().simple().to_string()),
            invariant_name: invariant.name.clone(),
            message: invariant.resolve_message(verdict),
            severity: invariant.severity,
            state,
            action,
            action_result,
            reproduction_path,
            timestamp: chrono::Utc::now(),
        }
    }

    /// A synthetic violation for a failed [`crate::action::ResponseAssertion`]
    /// (spec.md §4.5: "Assertion failure produces a synthetic Violation
    /// named `response_assertion:<action>`, severity Medium").
    pub fn from_assertion_failure(
        action_name: &str,
        message: String,
        state: State,
        action_result: ActionResult,
        reproduction_path: Vec<Transition>,
    ) -> Self {
        Self {
            id: format!("v_{:.12}", uuid::Uuid::new_v4().simple().to_string()),
            invariant_name: format!("response_assertion:{action_name}"),
            message,
            severity: Severity::Medium,
            state,
            action: Some(action_name.to_string()),
            action_result: Some(action_result),
            reproduction_path,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }

    /// Human-readable reproduction steps, one line per transition, of the
    /// form `"<METHOD> <path>[ <json-body>]"` (spec.md §4.6).
    pub fn reproduction_steps(&self) -> Vec<String> {
        self.reproduction_path
            .iter()
            .map(|t| {
                let req = &t.result.request;
                let path = strip_scheme_and_host(&req.url);
                match &req.body {
                    Some(body) if !matches!(body, crate::value::Value::Null) => {
                        format!("{} {} {}", req.method, path, serde_json::Value::from(body.clone()))
                    }
                    _ => format!("{} {}", req.method, path),
                }
            })
            .collect()
    }
}

fn strip_scheme_and_host(url: &str) -> String {
    if let Some(idx) = url.find("://") {
        let after_scheme = &url[idx + 3..];
        match after_scheme.find('/') {
            Some(slash) => after_scheme[slash..].to_string(),
            None => "/".to_string(),
        }
    } else {
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_from_bool() {
        assert_eq!(Verdict::from(true), Verdict::Pass);
        assert_eq!(Verdict::from(false), Verdict::Fail(String::new()));
    }

    #[test]
    fn resolve_message_prefers_dynamic_over_static() {
        let inv = Invariant::new("x", |_w| Verdict::Pass).with_message("static");
        assert_eq!(inv.resolve_message(&Verdict::Fail("dynamic".into())), "dynamic");
        assert_eq!(inv.resolve_message(&Verdict::Fail(String::new())), "static");
    }

    #[test]
    fn strip_scheme_and_host_keeps_path_and_query() {
        assert_eq!(strip_scheme_and_host("http://localhost:8000/todos/1?x=1"), "/todos/1?x=1");
        assert_eq!(strip_scheme_and_host("/already/relative"), "/already/relative");
    }
}
