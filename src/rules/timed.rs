//! TimedRule — a predicate that must hold continuously for a minimum time.
//!
//! The timer starts on the predicate's false→true edge and is discarded on
//! the true→false edge. A predicate that flickers restarts its timer on
//! every rising edge, so chatter never satisfies a rule with a non-zero
//! duration. Time only accrues while the rule is being evaluated.

use chrono::Duration;

use super::rule::{Predicate, Rule};
use crate::clock::Timestamp;

pub struct TimedRule<C> {
    predicate: Predicate<C>,
    min_duration: Duration,
    last: bool,
    true_since: Option<Timestamp>,
}

impl<C> TimedRule<C> {
    /// Rule satisfied once `predicate` has been true for `min_duration_ms`.
    pub fn new(predicate: impl FnMut(&mut C) -> bool + Send + 'static, min_duration_ms: i64) -> Self {
        Self::with_duration(predicate, Duration::milliseconds(min_duration_ms))
    }

    pub fn with_duration(
        predicate: impl FnMut(&mut C) -> bool + Send + 'static,
        min_duration: Duration,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            min_duration,
            last: false,
            true_since: None,
        }
    }

    pub fn min_duration(&self) -> Duration {
        self.min_duration
    }

    /// Start of the current true streak, if the predicate is true.
    pub fn true_since(&self) -> Option<Timestamp> {
        self.true_since
    }

    /// How long the predicate has been continuously true as of `now`.
    pub fn held_for(&self, now: Timestamp) -> Option<Duration> {
        self.true_since.map(|since| now - since)
    }
}

impl<C> Rule<C> for TimedRule<C> {
    fn evaluate(&mut self, ctx: &mut C, now: Timestamp) -> bool {
        let current = (self.predicate)(ctx);
        if current && !self.last {
            self.true_since = Some(now);
        } else if !current {
            self.true_since = None;
        }
        self.last = current;

        match self.true_since {
            Some(since) => now - since >= self.min_duration,
            None => false,
        }
    }

    fn reset(&mut self) {
        self.last = false;
        self.true_since = None;
    }

    fn last_evaluation(&self) -> bool {
        self.last
    }
}
