//! RuleStateMachine — a finite-state machine with rule-guarded transitions.
//!
//! Each state owns an ordered list of outgoing edges. [`evaluate`] walks the
//! current state's edges in registration order and takes the first one
//! whose rule is satisfied; the remaining edges are not evaluated on that
//! tick. Entering a state resets that state's outgoing rules so their edge
//! detectors and timers start fresh.
//!
//! [`evaluate`]: RuleStateMachine::evaluate

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use chrono::Duration;

use super::error::StateMachineError;
use super::rule::Rule;
use crate::clock::{Clock, Timestamp};

/// Hook run at the start of every evaluation with the current state.
pub type EvaluateHook<S, C> = Box<dyn FnMut(&mut C, S) + Send>;

struct Transition<S, C> {
    to: S,
    rule: Box<dyn Rule<C>>,
}

pub struct RuleStateMachine<S, C> {
    name: String,
    current: S,
    previous: Option<S>,
    transitions: HashMap<S, Vec<Transition<S, C>>>,
    entered_at: Timestamp,
    transition_count: u64,
    on_evaluate: Vec<EvaluateHook<S, C>>,
    clock: Arc<dyn Clock>,
}

impl<S, C> RuleStateMachine<S, C>
where
    S: Copy + Eq + Hash + Debug + Send + 'static,
    C: 'static,
{
    /// Create a machine in `initial` state. There is no implicit default
    /// state: callers always say where the machine starts.
    pub fn new(name: impl Into<String>, initial: S, clock: Arc<dyn Clock>) -> Self {
        let entered_at = clock.now();
        Self {
            name: name.into(),
            current: initial,
            previous: None,
            transitions: HashMap::new(),
            entered_at,
            transition_count: 0,
            on_evaluate: Vec::new(),
            clock,
        }
    }

    /// Register the edge `from -> to` guarded by `rule`.
    ///
    /// Registering the same edge again replaces its rule and keeps its
    /// position in the evaluation order. Self-loops are rejected.
    pub fn set_transition_rule(
        &mut self,
        from: S,
        to: S,
        rule: impl Rule<C> + 'static,
    ) -> Result<(), StateMachineError> {
        if from == to {
            return Err(StateMachineError::SelfLoop {
                machine: self.name.clone(),
                state: format!("{:?}", from),
            });
        }

        let edges = self.transitions.entry(from).or_default();
        let rule: Box<dyn Rule<C>> = Box::new(rule);
        match edges.iter_mut().find(|t| t.to == to) {
            Some(existing) => existing.rule = rule,
            None => edges.push(Transition { to, rule }),
        }
        Ok(())
    }

    /// Builder form of [`set_transition_rule`](Self::set_transition_rule).
    pub fn with_transition(
        mut self,
        from: S,
        to: S,
        rule: impl Rule<C> + 'static,
    ) -> Result<Self, StateMachineError> {
        self.set_transition_rule(from, to, rule)?;
        Ok(self)
    }

    /// Run `hook` at the start of every [`evaluate`](Self::evaluate),
    /// whether or not a transition follows.
    pub fn on_evaluate(&mut self, hook: impl FnMut(&mut C, S) + Send + 'static) {
        self.on_evaluate.push(Box::new(hook));
    }

    /// Evaluate the current state's outgoing rules once.
    ///
    /// Returns `true` if a transition was taken.
    pub fn evaluate(&mut self, ctx: &mut C) -> bool {
        let now = self.clock.now();
        let state = self.current;
        for hook in &mut self.on_evaluate {
            hook(ctx, state);
        }

        let target = match self.transitions.get_mut(&state) {
            Some(edges) => edges
                .iter_mut()
                .find_map(|edge| edge.rule.evaluate(ctx, now).then_some(edge.to)),
            None => None,
        };

        match target {
            Some(to) => {
                self.enter(to, now);
                true
            }
            None => false,
        }
    }

    /// Jump to `state` without consulting any rule.
    pub fn force_state(&mut self, state: S) {
        if state != self.current {
            let now = self.clock.now();
            self.enter(state, now);
        }
    }

    fn enter(&mut self, to: S, now: Timestamp) {
        log::debug!("[{}] {:?} -> {:?}", self.name, self.current, to);
        self.previous = Some(self.current);
        self.current = to;
        self.entered_at = now;
        self.transition_count += 1;
        if let Some(edges) = self.transitions.get_mut(&to) {
            for edge in edges {
                edge.rule.reset();
            }
        }
    }

    // --- Introspection ---

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_state(&self) -> S {
        self.current
    }

    pub fn previous_state(&self) -> Option<S> {
        self.previous
    }

    pub fn state_entered_at(&self) -> Timestamp {
        self.entered_at
    }

    pub fn time_in_state(&self) -> Duration {
        self.clock.now() - self.entered_at
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Targets reachable from `from`, in evaluation order.
    pub fn targets(&self, from: S) -> Vec<S> {
        self.transitions
            .get(&from)
            .map(|edges| edges.iter().map(|t| t.to).collect())
            .unwrap_or_default()
    }
}

impl<S: Debug, C> std::fmt::Debug for RuleStateMachine<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleStateMachine")
            .field("name", &self.name)
            .field("current", &self.current)
            .field("previous", &self.previous)
            .field("transition_count", &self.transition_count)
            .finish_non_exhaustive()
    }
}
