//! Agent (C9): the exploration loop. Drives the `Strategy` against the
//! `Graph`, restoring `World` to each chosen state, invoking the action,
//! observing the successor, and checking invariants — spec.md §4.9's
//! twelve-step loop, implemented verbatim.

use crate::action::{Action, ActionResult};
use crate::graph::Graph;
use crate::invariant::{Invariant, Timing, Verdict, Violation};
use crate::result::ExplorationResult;
use crate::state::State;
use crate::strategy::Strategy;
use crate::world::World;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Drives one exploration run. Owns the `World`, the `Graph` being built,
/// the pluggable frontier `Strategy`, and the registered invariants —
/// exclusively, for the run's duration (spec.md §5: "single-threaded,
/// cooperative... the World, its systems, its context, and the Graph are
/// owned exclusively by the Agent").
pub struct Agent {
    world: World,
    graph: Graph,
    strategy: Box<dyn Strategy>,
    invariants: Vec<Invariant>,
    max_steps: usize,
    call_count: BTreeMap<String, usize>,
    cancellation: Option<Arc<AtomicBool>>,
}

impl Agent {
    pub fn new(
        world: World,
        actions: Vec<Action>,
        invariants: Vec<Invariant>,
        strategy: Box<dyn Strategy>,
        max_steps: usize,
    ) -> Self {
        Self {
            world,
            graph: Graph::new(actions),
            strategy,
            invariants,
            max_steps,
            call_count: BTreeMap::new(),
            cancellation: None,
        }
    }

    /// Build from an [`crate::config::AgentConfig`] rather than wiring the
    /// strategy and step budget by hand.
    pub fn from_config(
        world: World,
        actions: Vec<Action>,
        invariants: Vec<Invariant>,
        config: &crate::config::AgentConfig,
    ) -> Self {
        Self::new(world, actions, invariants, config.strategy.build(), config.max_steps)
    }

    /// Attach an external cancellation flag, checked once per loop iteration
    /// (spec.md §5: "Implementations should additionally honour an external
    /// cancellation signal... between steps, returning the partial
    /// ExplorationResult.").
    pub fn with_cancellation(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.as_ref().map(|t| t.load(Ordering::Relaxed)).unwrap_or(false)
    }

    fn under_call_cap(&self, action_name: &str) -> bool {
        let count = *self.call_count.get(action_name).unwrap_or(&0);
        match self.graph.get_action(action_name).and_then(|a| a.max_calls) {
            Some(cap) => count < cap,
            None => true,
        }
    }

    /// Names of `actions` that haven't hit their `max_calls` cap yet — this
    /// is what gets offered to the Strategy, not the raw valid-action set
    /// (spec.md Open Questions: `valid_at` itself is memoised once at first
    /// observation and never recomputed for `max_calls`; the cap is applied
    /// here, at selection time, not baked into the Graph's cache).
    fn names_under_cap(&self, actions: &[Action]) -> Vec<String> {
        actions
            .iter()
            .map(|a| a.name.clone())
            .filter(|name| self.under_call_cap(name))
            .collect()
    }

    /// Run the loop to completion: step budget exhaustion, an empty
    /// frontier, a fatal system error, or external cancellation.
    pub fn explore(&mut self) -> ExplorationResult {
        let started_at = chrono::Utc::now();
        let mut violations: Vec<Violation> = Vec::new();
        let mut steps_taken = 0usize;
        let mut terminal_error: Option<String> = None;

        tracing::info!(max_steps = self.max_steps, strategy = self.strategy.name(), "exploration starting");

        let initial_state = match self.world.observe_and_checkpoint("initial") {
            Ok(state) => state,
            Err(err) => return self.finish(violations, steps_taken, started_at, Some(err.to_string())),
        };
        self.graph.add_state(initial_state.clone());
        let initial_valid = self.graph.get_valid_actions(&initial_state);
        let initial_names = self.names_under_cap(&initial_valid);
        self.strategy.seed(&initial_state, &initial_names);

        'explore: loop {
            if steps_taken >= self.max_steps {
                tracing::debug!("step budget exhausted");
                break;
            }
            if self.is_cancelled() {
                tracing::info!("exploration cancelled");
                break;
            }

            let Some((sid, aname)) = self.strategy.next(&self.graph) else {
                tracing::debug!("frontier exhausted");
                break;
            };
            if self.graph.is_explored(&sid, &aname) {
                continue;
            }

            let Some(state) = self.graph.get_state(&sid).cloned() else {
                self.graph.mark_explored(&sid, &aname);
                continue;
            };
            let Some(checkpoint_id) = state.checkpoint_id.clone() else {
                self.graph.mark_explored(&sid, &aname);
                continue;
            };

            tracing::debug!(step = steps_taken, state_id = %sid, action = %aname, "exploring");

            if let Err(err) = self.world.rollback(&checkpoint_id) {
                terminal_error = Some(err.to_string());
                break 'explore;
            }

            let Some(action) = self.graph.get_action(&aname).cloned() else {
                self.graph.mark_explored(&sid, &aname);
                continue;
            };

            // Re-check preconditions against the just-restored world: sid's
            // validity may have staled if the rollback path differs from
            // however it was first observed (spec.md §4.9 step d).
            if !self.world.can_execute_action(&action) {
                self.graph.mark_explored(&sid, &aname);
                continue;
            }

            violations.extend(self.check_invariants(Timing::Pre, &sid, Some(&aname), None));

            let result = self.world.act(&action);
            self.world.context.record_action_ran(&aname);

            if let Err(message) = action.assert_response(&result) {
                let key = format!("response_assertion:{aname}");
                if self.graph.record_violation_once(&key, &sid) {
                    let path = self.graph.get_path_to(&sid);
                    violations.push(Violation::from_assertion_failure(&aname, message, state.clone(), result.clone(), path));
                }
            }

            let next_state = match self.world.observe_and_checkpoint(&format!("after:{aname}")) {
                Ok(state) => state,
                Err(err) => {
                    terminal_error = Some(err.to_string());
                    break 'explore;
                }
            };
            self.graph.add_state(next_state.clone());

            let transition = crate::transition::Transition::new(sid.clone(), aname.clone(), next_state.id.clone(), result.clone());
            self.graph.add_transition(transition);
            *self.call_count.entry(aname.clone()).or_insert(0) += 1;
            steps_taken += 1;

            violations.extend(self.check_invariants(Timing::Post, &next_state.id, Some(&aname), Some(&result)));

            let next_valid = self.graph.get_valid_actions(&next_state);
            let next_names = self.names_under_cap(&next_valid);
            self.strategy.notify(&next_state, &next_names);
        }

        self.finish(violations, steps_taken, started_at, terminal_error)
    }

    fn finish(
        &mut self,
        violations: Vec<Violation>,
        steps_taken: usize,
        started_at: chrono::DateTime<chrono::Utc>,
        terminal_error: Option<String>,
    ) -> ExplorationResult {
        let graph = std::mem::take(&mut self.graph);
        let mut result = ExplorationResult::new(graph, violations, steps_taken, started_at, terminal_error);
        result.finish();
        tracing::info!(
            states = result.states_visited,
            transitions = result.transitions_taken,
            violations = result.violations.len(),
            success = result.success(),
            "exploration finished"
        );
        result
    }

    /// Evaluate every invariant whose `timing` applies at this checkpoint
    /// (`Pre`/`Post`, or `Both` either way), deduping via the graph's
    /// `(invariant_name, state_id)` set (spec.md §4.6/§4.7).
    fn check_invariants(
        &self,
        timing: Timing,
        state_id: &str,
        action: Option<&str>,
        result: Option<&ActionResult>,
    ) -> Vec<Violation> {
        let Some(state): Option<State> = self.graph.get_state(state_id).cloned() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for invariant in &self.invariants {
            if invariant.timing != Timing::Both && invariant.timing != timing {
                continue;
            }
            let verdict = invariant.evaluate(&self.world);
            if !verdict.is_pass() {
                if self.graph.record_violation_once(&invariant.name, state_id) {
                    let path = self.graph.get_path_to(state_id);
                    out.push(Violation::new(
                        invariant,
                        &verdict,
                        state.clone(),
                        action.map(str::to_string),
                        result.cloned(),
                        path,
                    ));
                }
            }
        }
        out
    }
}
