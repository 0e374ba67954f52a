//! Strategy (C8): decides which `(state_id, action_name)` pair the agent
//! tries next.
//!
//! The reference implementation does not name this component explicitly —
//! its agent loop inlines a single traversal order — but the expanded
//! design calls for pluggable selection, expressed the way the teacher
//! expresses stateful policy objects: a small trait with `seed`/`notify`
//! lifecycle hooks plus a `next` pull, rather than a one-shot pure function
//! over a materialized frontier (materializing the whole frontier on every
//! call would mean re-deriving it from the graph each step).

use crate::graph::Graph;
use crate::state::State;
use rand::distributions::{Distribution, WeightedIndex};
use rand::SeedableRng;
use std::collections::{BTreeMap, VecDeque};

/// Chooses the next `(state_id, action_name)` pair to explore.
///
/// `seed` is called once, with the initial state and its valid action
/// names. `notify` is called every time the agent observes a (possibly
/// already-known) state, with that state's currently valid action names, so
/// the strategy can grow its frontier as exploration proceeds. `next` pulls
/// one pair, skipping anything the graph already marks explored, or returns
/// `None` once the strategy has nothing left to offer.
pub trait Strategy: Send {
    fn name(&self) -> &'static str;
    fn seed(&mut self, initial_state: &State, valid_actions: &[String]);
    fn notify(&mut self, state: &State, valid_actions: &[String]);
    fn next(&mut self, graph: &Graph) -> Option<(String, String)>;
}

fn enqueue(queue: &mut VecDeque<(String, String)>, state: &State, valid_actions: &[String]) {
    for action in valid_actions {
        queue.push_back((state.id.clone(), action.clone()));
    }
}

/// Explores in discovery order: the oldest enqueued pair goes first.
#[derive(Default)]
pub struct BreadthFirst {
    queue: VecDeque<(String, String)>,
}

impl Strategy for BreadthFirst {
    fn name(&self) -> &'static str {
        "breadth_first"
    }

    fn seed(&mut self, initial_state: &State, valid_actions: &[String]) {
        enqueue(&mut self.queue, initial_state, valid_actions);
    }

    fn notify(&mut self, state: &State, valid_actions: &[String]) {
        enqueue(&mut self.queue, state, valid_actions);
    }

    fn next(&mut self, graph: &Graph) -> Option<(String, String)> {
        while let Some((state_id, action_name)) = self.queue.pop_front() {
            if !graph.is_explored(&state_id, &action_name) {
                return Some((state_id, action_name));
            }
        }
        None
    }
}

/// Explores depth-first: the most recently enqueued pair goes first, via a
/// plain `Vec` used as a stack.
#[derive(Default)]
pub struct DepthFirst {
    stack: Vec<(String, String)>,
}

impl Strategy for DepthFirst {
    fn name(&self) -> &'static str {
        "depth_first"
    }

    fn seed(&mut self, initial_state: &State, valid_actions: &[String]) {
        for action in valid_actions {
            self.stack.push((initial_state.id.clone(), action.clone()));
        }
    }

    fn notify(&mut self, state: &State, valid_actions: &[String]) {
        for action in valid_actions {
            self.stack.push((state.id.clone(), action.clone()));
        }
    }

    fn next(&mut self, graph: &Graph) -> Option<(String, String)> {
        while let Some((state_id, action_name)) = self.stack.pop() {
            if !graph.is_explored(&state_id, &action_name) {
                return Some((state_id, action_name));
            }
        }
        None
    }
}

/// Picks uniformly at random among everything seen so far that is still
/// unexplored.
pub struct Random {
    candidates: Vec<(String, String)>,
    rng: rand::rngs::StdRng,
}

impl Random {
    pub fn new(seed: u64) -> Self {
        Self { candidates: Vec::new(), rng: rand::rngs::StdRng::seed_from_u64(seed) }
    }
}

impl Strategy for Random {
    fn name(&self) -> &'static str {
        "random"
    }

    fn seed(&mut self, initial_state: &State, valid_actions: &[String]) {
        enqueue_vec(&mut self.candidates, initial_state, valid_actions);
    }

    fn notify(&mut self, state: &State, valid_actions: &[String]) {
        enqueue_vec(&mut self.candidates, state, valid_actions);
    }

    fn next(&mut self, graph: &Graph) -> Option<(String, String)> {
        self.candidates.retain(|(s, a)| !graph.is_explored(s, a));
        if self.candidates.is_empty() {
            return None;
        }
        use rand::Rng;
        let idx = self.rng.gen_range(0..self.candidates.len());
        Some(self.candidates.remove(idx))
    }
}

fn enqueue_vec(candidates: &mut Vec<(String, String)>, state: &State, valid_actions: &[String]) {
    for action in valid_actions {
        candidates.push((state.id.clone(), action.clone()));
    }
}

/// Weights each candidate pair by the action's configured weight (default
/// `1.0` for an action with no entry), drawing via `WeightedIndex`.
pub struct Weighted {
    candidates: Vec<(String, String)>,
    weights: BTreeMap<String, f64>,
    rng: rand::rngs::StdRng,
}

impl Weighted {
    pub fn new(weights: BTreeMap<String, f64>, seed: u64) -> Self {
        Self { candidates: Vec::new(), weights, rng: rand::rngs::StdRng::seed_from_u64(seed) }
    }

    fn weight_of(&self, action_name: &str) -> f64 {
        *self.weights.get(action_name).unwrap_or(&1.0)
    }
}

impl Strategy for Weighted {
    fn name(&self) -> &'static str {
        "weighted"
    }

    fn seed(&mut self, initial_state: &State, valid_actions: &[String]) {
        enqueue_vec(&mut self.candidates, initial_state, valid_actions);
    }

    fn notify(&mut self, state: &State, valid_actions: &[String]) {
        enqueue_vec(&mut self.candidates, state, valid_actions);
    }

    fn next(&mut self, graph: &Graph) -> Option<(String, String)> {
        self.candidates.retain(|(s, a)| !graph.is_explored(s, a));
        if self.candidates.is_empty() {
            return None;
        }
        let weights: Vec<f64> = self.candidates.iter().map(|(_, a)| self.weight_of(a)).collect();
        match WeightedIndex::new(&weights) {
            Ok(dist) => {
                let idx = dist.sample(&mut self.rng);
                Some(self.candidates.remove(idx))
            }
            // All weights zero (or otherwise invalid): fall back to FIFO rather than panicking.
            Err(_) => Some(self.candidates.remove(0)),
        }
    }
}

/// Prefers the action with the lowest call count graph-wide, tie-broken by
/// the target state's visit count (fewer visits first), then by notify
/// order (earliest-enqueued first) — an explicit, documented tiebreak since
/// the reference system leaves it unspecified (see DESIGN.md).
#[derive(Default)]
pub struct CoverageGuided {
    candidates: Vec<(String, String)>,
}

impl Strategy for CoverageGuided {
    fn name(&self) -> &'static str {
        "coverage_guided"
    }

    fn seed(&mut self, initial_state: &State, valid_actions: &[String]) {
        enqueue_vec(&mut self.candidates, initial_state, valid_actions);
    }

    fn notify(&mut self, state: &State, valid_actions: &[String]) {
        enqueue_vec(&mut self.candidates, state, valid_actions);
    }

    fn next(&mut self, graph: &Graph) -> Option<(String, String)> {
        self.candidates.retain(|(s, a)| !graph.is_explored(s, a));
        if self.candidates.is_empty() {
            return None;
        }
        let best = self
            .candidates
            .iter()
            .enumerate()
            .min_by_key(|(idx, (state_id, action_name))| {
                (graph.action_call_count(action_name), graph.state_visit_count(state_id), *idx)
            })
            .map(|(idx, _)| idx)?;
        Some(self.candidates.remove(best))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn state() -> State {
        State::new(BTreeMap::new(), None)
    }

    #[test]
    fn breadth_first_visits_in_discovery_order() {
        let mut strategy = BreadthFirst::default();
        let graph = Graph::default();
        let s = state();
        strategy.seed(&s, &["a".to_string(), "b".to_string()]);
        assert_eq!(strategy.next(&graph), Some((s.id.clone(), "a".to_string())));
        assert_eq!(strategy.next(&graph), Some((s.id, "b".to_string())));
        assert_eq!(strategy.next(&graph), None);
    }

    #[test]
    fn depth_first_visits_most_recent_first() {
        let mut strategy = DepthFirst::default();
        let graph = Graph::default();
        let s = state();
        strategy.seed(&s, &["a".to_string(), "b".to_string()]);
        assert_eq!(strategy.next(&graph), Some((s.id.clone(), "b".to_string())));
        assert_eq!(strategy.next(&graph), Some((s.id, "a".to_string())));
    }

    #[test]
    fn next_skips_pairs_the_graph_already_explored() {
        let mut strategy = BreadthFirst::default();
        let mut graph = Graph::default();
        let s = state();
        strategy.seed(&s, &["a".to_string(), "b".to_string()]);
        graph.add_transition(crate::transition::Transition::new(
            s.id.clone(),
            "a",
            "s_next",
            crate::action::ActionResult::from_error(
                crate::action::HttpRequest { method: "GET".into(), url: "/".into(), headers: Default::default(), body: None },
                "unused",
            ),
        ));
        assert_eq!(strategy.next(&graph), Some((s.id, "b".to_string())));
    }

    #[test]
    fn random_is_deterministic_for_a_fixed_seed() {
        let graph = Graph::default();
        let s = state();
        let mut a = Random::new(7);
        a.seed(&s, &["a".to_string(), "b".to_string(), "c".to_string()]);
        let mut b = Random::new(7);
        b.seed(&s, &["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(a.next(&graph), b.next(&graph));
    }

    #[test]
    fn coverage_guided_prefers_never_called_action() {
        let mut graph = Graph::default();
        let s = state();
        graph.add_transition(crate::transition::Transition::new(
            s.id.clone(),
            "a",
            "s_next",
            crate::action::ActionResult::from_error(
                crate::action::HttpRequest { method: "GET".into(), url: "/".into(), headers: Default::default(), body: None },
                "unused",
            ),
        ));
        let mut strategy = CoverageGuided::default();
        strategy.seed(&s, &["a".to_string(), "b".to_string()]);
        assert_eq!(strategy.next(&graph), Some((s.id, "b".to_string())));
    }
}
