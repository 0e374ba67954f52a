//! S1 (spec.md §8): a Todo API whose `DELETE /todos/{id}` returns 200 even
//! when the todo was marked done. Exploration must surface exactly one
//! violation, with a reproduction path a human can replay by eye.

use std::sync::{Arc, Mutex};
use venomqa::action::{HttpRequest, HttpResponse};
use venomqa::strategy::BreadthFirst;
use venomqa::testing::InMemoryKvSystem;
use venomqa::{
    Action, ActionResult, Agent, ApiClient, Invariant, Precondition, RequestOptions, Severity,
    Timing, Value, Verdict, World,
};

struct TodoApi {
    kv: Arc<InMemoryKvSystem>,
    calls: Mutex<Vec<(String, String)>>,
}

impl TodoApi {
    fn new(kv: Arc<InMemoryKvSystem>) -> Self {
        Self { kv, calls: Mutex::new(Vec::new()) }
    }

    fn respond(method: &str, path: &str, status: u16) -> ActionResult {
        ActionResult::from_response(
            HttpRequest { method: method.into(), url: path.into(), headers: Default::default(), body: None },
            HttpResponse { status, headers: Default::default(), body: None },
            1.0,
        )
    }
}

impl ApiClient for TodoApi {
    fn get(&self, path: &str, _opts: RequestOptions) -> ActionResult {
        self.calls.lock().unwrap().push(("GET".into(), path.into()));
        Self::respond("GET", path, 200)
    }
    fn post(&self, path: &str, _opts: RequestOptions) -> ActionResult {
        self.calls.lock().unwrap().push(("POST".into(), path.into()));
        self.kv.set("created", Value::Bool(true));
        Self::respond("POST", path, 200)
    }
    fn put(&self, _path: &str, _opts: RequestOptions) -> ActionResult {
        unimplemented!()
    }
    fn patch(&self, path: &str, _opts: RequestOptions) -> ActionResult {
        self.calls.lock().unwrap().push(("PATCH".into(), path.into()));
        self.kv.set("done", Value::Bool(true));
        Self::respond("PATCH", path, 200)
    }
    fn delete(&self, path: &str, _opts: RequestOptions) -> ActionResult {
        self.calls.lock().unwrap().push(("DELETE".into(), path.into()));
        // the planted bug: deleting a completed todo still returns 200.
        Self::respond("DELETE", path, 200)
    }
}

#[test]
fn exactly_one_completed_todo_delete_violation_with_reproducible_path() {
    let kv = Arc::new(InMemoryKvSystem::new("kv"));
    let api = Arc::new(TodoApi::new(kv.clone()));
    let mut world = World::new(api);
    world.register_system("kv", kv.clone());

    let actions = vec![
        Action::with_context("create_todo", |api, ctx| {
            let r = api.post("/todos", RequestOptions::default());
            ctx.set("todo_id", Value::Str("1".into()));
            r
        }),
        Action::simple("list_todos", |api| api.get("/todos", RequestOptions::default()))
            .with_max_calls(2),
        Action::with_context("complete_todo", |api, _ctx| api.patch("/todos/1", RequestOptions::default()))
            .with_precondition(Precondition::has_context("todo_id")),
        Action::with_context("delete_todo", |api, _ctx| api.delete("/todos/1", RequestOptions::default()))
            .with_precondition(Precondition::has_context("todo_id")),
    ];

    let invariant = Invariant::new("completed_todo_not_deletable", |world: &World| {
        let was_done = world
            .systems
            .get("kv")
            .and_then(|s| s.observe().ok())
            .and_then(|v| v.get("done").cloned())
            .map(|v| v == Value::Bool(true))
            .unwrap_or(false);
        if was_done {
            Verdict::fail("DELETE /todos/{id} returned 200 but todo was completed (expected 403)")
        } else {
            Verdict::Pass
        }
    })
    .with_severity(Severity::High)
    .with_timing(Timing::Post);

    let mut agent = Agent::new(world, actions, vec![invariant], Box::new(BreadthFirst::default()), 30);
    let result = agent.explore();

    assert_eq!(result.violations.len(), 1, "expected exactly one violation, got {:?}", result.violations);
    let violation = &result.violations[0];
    assert_eq!(violation.invariant_name, "completed_todo_not_deletable");
    assert!(violation.message.contains("403") || violation.message.contains("completed"));

    let steps = violation.reproduction_steps();
    assert!(!steps.is_empty());
    assert!(steps.iter().any(|s| s.split(' ').next() == Some("GET") || s.split(' ').next() == Some("POST") || s.split(' ').next() == Some("PATCH") || s.split(' ').next() == Some("DELETE")));
    assert!(steps.iter().any(|s| s.contains("DELETE")));
}
