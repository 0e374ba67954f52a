//! Action & Preconditions (C5).

use crate::context::Context;
use crate::state::State;
use crate::value::Value;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// An outbound HTTP request, as seen by the action pipeline.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl std::fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// An inbound HTTP response.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl HttpResponse {
    pub fn ok(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum ActionResultError {
    #[error("action result has no response to decode as JSON")]
    NoResponseForJson,
}

/// The outcome of executing an [`Action`] (spec.md §3).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub request: HttpRequest,
    pub response: Option<HttpResponse>,
    pub error: Option<String>,
    pub duration_ms: f64,
}

impl ActionResult {
    pub fn from_response(request: HttpRequest, response: HttpResponse, duration_ms: f64) -> Self {
        Self {
            success: response.ok(),
            request,
            response: Some(response),
            error: None,
            duration_ms,
        }
    }

    pub fn from_error(request: HttpRequest, error: impl Into<String>) -> Self {
        Self {
            success: false,
            request,
            response: None,
            error: Some(error.into()),
            duration_ms: 0.0,
        }
    }

    /// Decode the response body as JSON. Never null-derefs: a missing
    /// response is a dedicated error kind (§7 `NoResponseForJSON`).
    pub fn json(&self) -> Result<&Value, ActionResultError> {
        self.response
            .as_ref()
            .and_then(|r| r.body.as_ref())
            .ok_or(ActionResultError::NoResponseForJson)
    }

    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }
}

/// A guard deciding whether an [`Action`] is applicable, tagged by class
/// (spec.md §4.5 / Design Notes "Precondition / check returning union").
#[derive(Clone)]
pub enum Precondition {
    Context(Arc<dyn Fn(&Context) -> bool + Send + Sync>),
    State(Arc<dyn Fn(&State) -> bool + Send + Sync>),
}

impl Precondition {
    pub fn context(f: impl Fn(&Context) -> bool + Send + Sync + 'static) -> Self {
        Precondition::Context(Arc::new(f))
    }

    pub fn state(f: impl Fn(&State) -> bool + Send + Sync + 'static) -> Self {
        Precondition::State(Arc::new(f))
    }

    /// Built from the `has_context(k)` primitive (spec.md §4.5).
    pub fn has_context(key: impl Into<String>) -> Self {
        let key = key.into();
        Precondition::context(move |ctx| ctx.has_context(&key))
    }

    /// Built from the `has_context_value(k, v)` primitive.
    pub fn has_context_value(key: impl Into<String>, expected: Value) -> Self {
        let key = key.into();
        Precondition::context(move |ctx| ctx.has_context_value(&key, &expected))
    }

    /// Built from the `action_ran(name)` primitive.
    pub fn action_ran(name: impl Into<String>) -> Self {
        let name = name.into();
        Precondition::context(move |ctx| ctx.action_ran(&name))
    }

    pub fn is_context_only(&self) -> bool {
        matches!(self, Precondition::Context(_))
    }
}

/// Response assertion combining `expected_status`/`expect_failure` with an
/// optional custom veto (spec.md §4.5).
#[derive(Clone)]
pub struct ResponseAssertion {
    pub check: Option<Arc<dyn Fn(&ActionResult) -> bool + Send + Sync>>,
    pub message: String,
}

impl ResponseAssertion {
    pub fn new(check: impl Fn(&ActionResult) -> bool + Send + Sync + 'static, message: impl Into<String>) -> Self {
        Self {
            check: Some(Arc::new(check)),
            message: message.into(),
        }
    }
}

/// The closure an [`Action`] wraps, with its calling convention tagged
/// explicitly rather than detected via reflection (Design Notes:
/// "Action-arity auto-detection: replace with two explicit constructor
/// variants").
#[derive(Clone)]
pub enum ActionFn {
    Simple(Arc<dyn Fn(&dyn crate::api::ApiClient) -> ActionResult + Send + Sync>),
    Contextual(Arc<dyn Fn(&dyn crate::api::ApiClient, &mut Context) -> ActionResult + Send + Sync>),
}

/// A named, re-executable operation against the world (spec.md §3).
#[derive(Clone)]
pub struct Action {
    pub name: String,
    pub execute: ActionFn,
    pub preconditions: Vec<Precondition>,
    pub expected_status: Option<Vec<u16>>,
    pub expect_failure: bool,
    pub assertion: Option<ResponseAssertion>,
    pub max_calls: Option<usize>,
    pub requires: Vec<String>,
    pub tags: Vec<String>,
}

impl Action {
    pub fn simple(name: impl Into<String>, f: impl Fn(&dyn crate::api::ApiClient) -> ActionResult + Send + Sync + 'static) -> Self {
        Self::new(name, ActionFn::Simple(Arc::new(f)))
    }

    pub fn with_context(
        name: impl Into<String>,
        f: impl Fn(&dyn crate::api::ApiClient, &mut Context) -> ActionResult + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, ActionFn::Contextual(Arc::new(f)))
    }

    fn new(name: impl Into<String>, execute: ActionFn) -> Self {
        Self {
            name: name.into(),
            execute,
            preconditions: Vec::new(),
            expected_status: None,
            expect_failure: false,
            assertion: None,
            max_calls: None,
            requires: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_precondition(mut self, p: Precondition) -> Self {
        self.preconditions.push(p);
        self
    }

    pub fn with_expected_status(mut self, statuses: Vec<u16>) -> Self {
        self.expected_status = Some(statuses);
        self
    }

    pub fn with_expect_failure(mut self) -> Self {
        self.expect_failure = true;
        self
    }

    pub fn with_assertion(mut self, assertion: ResponseAssertion) -> Self {
        self.assertion = Some(assertion);
        self
    }

    pub fn with_max_calls(mut self, n: usize) -> Self {
        self.max_calls = Some(n);
        self
    }

    pub fn with_requires(mut self, types: Vec<String>) -> Self {
        self.requires = types;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Execute, dispatching on the tagged calling convention. A panic inside
    /// the user closure is caught and converted to `ActionResult::from_error`
    /// (§7: action exceptions are contained, never surfaced to the Agent).
    pub fn invoke(&self, api: &dyn crate::api::ApiClient, context: &mut Context) -> ActionResult {
        let result = match &self.execute {
            ActionFn::Simple(f) => catch_unwind(AssertUnwindSafe(|| f(api))),
            ActionFn::Contextual(f) => catch_unwind(AssertUnwindSafe(|| f(api, context))),
        };
        result.unwrap_or_else(|_| {
            ActionResult::from_error(
                HttpRequest {
                    method: "UNKNOWN".to_string(),
                    url: String::new(),
                    headers: BTreeMap::new(),
                    body: None,
                },
                format!("action '{}' panicked", self.name),
            )
        })
    }

    /// Conjunction of context-only and state-based preconditions
    /// (spec.md §4.5's `Action.can_execute`).
    pub fn can_execute(&self, state: &State, context: &Context) -> bool {
        self.preconditions.iter().all(|p| match p {
            Precondition::Context(f) => f(context),
            Precondition::State(f) => f(state),
        })
    }

    /// State-based preconditions only, used by [`crate::graph::Graph`] to
    /// compute a state's valid-action set independent of any particular
    /// branch's context (spec.md §4.9 step 1/k: `get_valid_actions(s, …)`
    /// is a function of state alone; context gating happens later, at
    /// `World::can_execute_action`, right before the action actually runs).
    pub fn can_execute_in_state(&self, state: &State) -> bool {
        self.preconditions.iter().all(|p| match p {
            Precondition::Context(_) => true,
            Precondition::State(f) => f(state),
        })
    }

    /// Combine built-in fields with an optional user assertion to produce a
    /// pass/fail verdict (spec.md §4.5).
    pub fn assert_response(&self, result: &ActionResult) -> Result<(), String> {
        let mut status_explicitly_allowed = false;
        if let Some(expected) = &self.expected_status {
            match result.response.as_ref() {
                None => return Err(format!("no response received, expected status {expected:?}")),
                Some(resp) if !expected.contains(&resp.status) => {
                    return Err(format!("expected status {expected:?}, got {}", resp.status))
                }
                Some(_) => status_explicitly_allowed = true,
            }
        }

        if !status_explicitly_allowed {
            if self.expect_failure {
                if result.response.as_ref().map(|r| r.ok()).unwrap_or(false) {
                    return Err(format!(
                        "expected failure, but got success: {:?}",
                        result.status()
                    ));
                }
            } else if !result.success {
                return Err(format!("expected success, got {:?}", result.status()));
            }
        }

        if let Some(assertion) = &self.assertion {
            if let Some(check) = &assertion.check {
                if !check(result) {
                    return Err(if assertion.message.is_empty() {
                        "custom assertion failed".to_string()
                    } else {
                        assertion.message.clone()
                    });
                }
            }
        }

        Ok(())
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Action {}
