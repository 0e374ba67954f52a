//! S5 (spec.md §8): a flag that toggles between two canonical states.
//! Exploration necessarily revisits the "flag is true" state many times over
//! a long run; the violation list must still contain exactly one entry for
//! it, not one per revisit.

use std::sync::Arc;
use venomqa::action::{HttpRequest, HttpResponse};
use venomqa::strategy::BreadthFirst;
use venomqa::testing::InMemoryKvSystem;
use venomqa::{Action, ActionResult, Agent, ApiClient, Invariant, RequestOptions, Severity, Timing, Value, Verdict, World};

struct ToggleApi {
    kv: Arc<InMemoryKvSystem>,
}

impl ApiClient for ToggleApi {
    fn get(&self, path: &str, _opts: RequestOptions) -> ActionResult {
        let current = matches!(self.kv.get("flag"), Some(Value::Bool(true)));
        self.kv.set("flag", Value::Bool(!current));
        ActionResult::from_response(
            HttpRequest { method: "GET".into(), url: path.into(), headers: Default::default(), body: None },
            HttpResponse { status: 200, headers: Default::default(), body: None },
            1.0,
        )
    }
    fn post(&self, _path: &str, _opts: RequestOptions) -> ActionResult {
        unimplemented!()
    }
    fn put(&self, _path: &str, _opts: RequestOptions) -> ActionResult {
        unimplemented!()
    }
    fn patch(&self, _path: &str, _opts: RequestOptions) -> ActionResult {
        unimplemented!()
    }
    fn delete(&self, _path: &str, _opts: RequestOptions) -> ActionResult {
        unimplemented!()
    }
}

#[test]
fn flag_true_violation_is_recorded_once_despite_many_revisits() {
    let kv = Arc::new(InMemoryKvSystem::new("kv"));
    let api = Arc::new(ToggleApi { kv: kv.clone() });
    let mut world = World::new(api);
    world.register_system("kv", kv.clone());

    let actions = vec![Action::simple("toggle", |api| api.get("/toggle", RequestOptions::default()))];

    let invariant = Invariant::new("flag_must_be_false", |world: &World| {
        let flag = world
            .systems
            .get("kv")
            .and_then(|s| s.observe().ok())
            .map(|v| matches!(v.get("flag"), Some(Value::Bool(true))))
            .unwrap_or(false);
        if flag {
            Verdict::fail("flag was true")
        } else {
            Verdict::Pass
        }
    })
    .with_severity(Severity::Medium)
    .with_timing(Timing::Post);

    let mut agent = Agent::new(world, actions, vec![invariant], Box::new(BreadthFirst::default()), 50);
    let result = agent.explore();

    let matching: Vec<_> = result.violations.iter().filter(|v| v.invariant_name == "flag_must_be_false").collect();
    assert_eq!(matching.len(), 1, "expected exactly one deduplicated violation, got {:?}", matching);

    let mut seen = std::collections::BTreeSet::new();
    for v in &result.violations {
        assert!(seen.insert((v.invariant_name.clone(), v.state.id.clone())), "duplicate (invariant, state) pair recorded");
    }
}
