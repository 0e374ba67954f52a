//! Graph (C7): the de-duplicated map of discovered states and transitions,
//! grounded directly on the reference implementation's `venomqa.v1.core.graph`
//! (`Graph`/`get_valid_actions`/`get_unexplored`/`get_path_to`, exercised in
//! `tests/v1/test_core.py::TestGraph`).

use crate::action::Action;
use crate::state::State;
use crate::transition::Transition;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Default)]
pub struct Graph {
    actions: Vec<Action>,
    states: BTreeMap<String, State>,
    initial_state_id: Option<String>,
    transitions: Vec<Transition>,
    explored: BTreeSet<(String, String)>,
    violations_recorded: RefCell<BTreeSet<(String, String)>>,
    valid_actions_cache: RefCell<BTreeMap<String, Vec<String>>>,
}

impl Graph {
    pub fn new(actions: Vec<Action>) -> Self {
        Self {
            actions,
            ..Default::default()
        }
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn initial_state_id(&self) -> Option<&str> {
        self.initial_state_id.as_deref()
    }

    pub fn get_action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn get_state(&self, state_id: &str) -> Option<&State> {
        self.states.get(state_id)
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    /// Add a state, recording it as the graph's initial state if it is the
    /// first one seen. Re-adding a known state id is a no-op.
    pub fn add_state(&mut self, state: State) {
        if self.initial_state_id.is_none() {
            self.initial_state_id = Some(state.id.clone());
        }
        self.states.entry(state.id.clone()).or_insert(state);
    }

    /// Record a transition and mark `(from_state_id, action_name)` explored.
    /// Invalidates the cached valid-actions list for `from_state_id`, since
    /// exploring narrows what's left unexplored (not what's valid, but kept
    /// simple: callers re-derive unexplored from `is_explored` directly).
    pub fn add_transition(&mut self, transition: Transition) {
        self.explored.insert((transition.from_state_id.clone(), transition.action_name.clone()));
        self.transitions.push(transition);
    }

    /// Mark `(from_state_id, action_name)` explored without recording a
    /// transition — used when the agent finds the pair's preconditions no
    /// longer hold by the time it is dequeued (spec.md §4.9 step d), so the
    /// strategy never re-offers it, without counting it toward the step
    /// budget.
    pub fn mark_explored(&mut self, from_state_id: &str, action_name: &str) {
        self.explored.insert((from_state_id.to_string(), action_name.to_string()));
    }

    pub fn is_explored(&self, from_state_id: &str, action_name: &str) -> bool {
        self.explored.contains(&(from_state_id.to_string(), action_name.to_string()))
    }

    /// How many times `action_name` has been executed anywhere in the
    /// graph so far. Used by [`crate::strategy::CoverageGuided`] to prefer
    /// under-exercised actions.
    pub fn action_call_count(&self, action_name: &str) -> usize {
        self.transitions.iter().filter(|t| t.action_name == action_name).count()
    }

    /// How many recorded transitions land on `state_id`.
    pub fn state_visit_count(&self, state_id: &str) -> usize {
        self.transitions.iter().filter(|t| t.to_state_id == state_id).count()
    }

    /// Actions whose preconditions hold in `state`, memoised per state id
    /// (§4.7: re-deriving this on every agent step would be quadratic in
    /// exploration depth).
    pub fn get_valid_actions(&self, state: &State) -> Vec<Action> {
        if let Some(names) = self.valid_actions_cache.borrow().get(&state.id) {
            return names.iter().filter_map(|n| self.get_action(n).cloned()).collect();
        }
        let valid: Vec<Action> = self
            .actions
            .iter()
            .filter(|a| a.can_execute_in_state(state))
            .cloned()
            .collect();
        self.valid_actions_cache
            .borrow_mut()
            .insert(state.id.clone(), valid.iter().map(|a| a.name.clone()).collect());
        valid
    }

    /// Every `(state, action)` pair where the action is valid in that state
    /// but has never been executed from it.
    pub fn get_unexplored(&self) -> Vec<(State, Action)> {
        let mut pairs = Vec::new();
        for state in self.states.values() {
            for action in self.get_valid_actions(state) {
                if !self.is_explored(&state.id, &action.name) {
                    pairs.push((state.clone(), action));
                }
            }
        }
        pairs
    }

    /// Shortest path (in transition count) from the initial state to
    /// `to_state_id`, via breadth-first search over recorded transitions.
    /// Ties are broken by transition insertion order, since BFS here walks
    /// `self.transitions` in that order at each level.
    pub fn get_path_to(&self, to_state_id: &str) -> Vec<Transition> {
        let Some(initial) = &self.initial_state_id else {
            return Vec::new();
        };
        if initial == to_state_id {
            return Vec::new();
        }

        let mut predecessor: BTreeMap<String, &Transition> = BTreeMap::new();
        let mut visited: BTreeSet<String> = BTreeSet::new();
        visited.insert(initial.clone());
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(initial.clone());

        while let Some(current) = queue.pop_front() {
            for transition in &self.transitions {
                if transition.from_state_id != current {
                    continue;
                }
                if visited.contains(&transition.to_state_id) {
                    continue;
                }
                visited.insert(transition.to_state_id.clone());
                predecessor.insert(transition.to_state_id.clone(), transition);
                if transition.to_state_id == to_state_id {
                    queue.clear();
                    break;
                }
                queue.push_back(transition.to_state_id.clone());
            }
        }

        let mut path = Vec::new();
        let mut cursor = to_state_id.to_string();
        while let Some(transition) = predecessor.get(&cursor) {
            path.push((*transition).clone());
            cursor = transition.from_state_id.clone();
        }
        path.reverse();
        path
    }

    /// Records `(invariant_name, state_id)` as seen; returns `true` the
    /// first time a given pair is recorded, `false` on every subsequent
    /// call. Used by the Agent to avoid flooding a run's violation list
    /// with the same invariant failing at the same state on repeated
    /// visits.
    pub fn record_violation_once(&self, invariant_name: &str, state_id: &str) -> bool {
        self.violations_recorded
            .borrow_mut()
            .insert((invariant_name.to_string(), state_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionResult, HttpRequest, HttpResponse};
    use crate::context::Context;
    use std::collections::BTreeMap;

    fn dummy_result() -> ActionResult {
        ActionResult::from_response(
            HttpRequest { method: "GET".into(), url: "/".into(), headers: BTreeMap::new(), body: None },
            HttpResponse { status: 200, headers: BTreeMap::new(), body: None },
            1.0,
        )
    }

    #[test]
    fn add_state_sets_initial_state_id() {
        let mut graph = Graph::default();
        let state = State::new(BTreeMap::new(), None);
        graph.add_state(state.clone());
        assert_eq!(graph.state_count(), 1);
        assert_eq!(graph.initial_state_id(), Some(state.id.as_str()));
    }

    #[test]
    fn add_action_is_queryable_by_name() {
        let action = Action::simple("test", |api| api.get("/", Default::default()));
        let graph = Graph::new(vec![action]);
        assert_eq!(graph.action_count(), 1);
        assert!(graph.get_action("test").is_some());
    }

    #[test]
    fn add_transition_marks_explored() {
        let mut graph = Graph::default();
        let t = Transition::new("s_1", "action", "s_2", dummy_result());
        graph.add_transition(t);
        assert_eq!(graph.transition_count(), 1);
        assert!(graph.is_explored("s_1", "action"));
    }

    #[test]
    fn get_valid_actions_filters_by_precondition() {
        let a1 = Action::simple("a1", |api| api.get("/", Default::default()));
        let a2 = Action::simple("a2", |api| api.get("/", Default::default()))
            .with_precondition(crate::action::Precondition::state(|_s| false));
        let graph = Graph::new(vec![a1, a2]);

        let state = State::new(BTreeMap::new(), None);
        let valid = graph.get_valid_actions(&state);
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].name, "a1");
    }

    #[test]
    fn get_unexplored_lists_valid_never_run_pairs() {
        let action = Action::simple("test", |api| api.get("/", Default::default()));
        let mut graph = Graph::new(vec![action]);
        let state = State::new(BTreeMap::new(), None);
        graph.add_state(state.clone());

        let unexplored = graph.get_unexplored();
        assert_eq!(unexplored.len(), 1);
        assert_eq!(unexplored[0].0, state);
        assert_eq!(unexplored[0].1.name, "test");
    }

    #[test]
    fn get_path_to_walks_transitions_in_order() {
        let mut graph = Graph::default();
        graph.add_state(State::new(BTreeMap::from([("a".to_string(), crate::state::Observation::new("a", crate::value::Value::Int(1)))]), None));

        let s1 = "s_1".to_string();
        let s2 = "s_2".to_string();
        let s3 = "s_3".to_string();
        graph.initial_state_id = Some(s1.clone());
        graph.add_transition(Transition { id: "t_1".into(), from_state_id: s1, action_name: "a".into(), to_state_id: s2.clone(), result: dummy_result(), timestamp: chrono::Utc::now(), duration_ms: None });
        graph.add_transition(Transition { id: "t_2".into(), from_state_id: s2, action_name: "b".into(), to_state_id: s3.clone(), result: dummy_result(), timestamp: chrono::Utc::now(), duration_ms: None });

        let path = graph.get_path_to(&s3);
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].id, "t_1");
        assert_eq!(path[1].id, "t_2");
    }

    #[test]
    fn record_violation_once_only_true_first_time() {
        let graph = Graph::default();
        assert!(graph.record_violation_once("inv", "s_1"));
        assert!(!graph.record_violation_once("inv", "s_1"));
        assert!(graph.record_violation_once("inv", "s_2"));
    }
}
