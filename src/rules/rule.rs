//! Rules — boolean guards on state-machine transitions.
//!
//! A rule wraps a predicate over some context `C` (usually a struct holding
//! the store handle plus whatever scratch state the classifier keeps). The
//! machine calls [`Rule::evaluate`] once per tick with the tick's timestamp
//! and calls [`Rule::reset`] when it enters the state that owns the rule.

use crate::clock::Timestamp;

/// Boxed predicate over a rule context.
pub type Predicate<C> = Box<dyn FnMut(&mut C) -> bool + Send>;

/// A transition guard.
pub trait Rule<C>: Send {
    /// Evaluate the rule for the tick at `now`.
    fn evaluate(&mut self, ctx: &mut C, now: Timestamp) -> bool;

    /// Forget edge and timer state.
    fn reset(&mut self);

    /// Raw predicate outcome of the most recent evaluation.
    fn last_evaluation(&self) -> bool;
}

impl<C> Rule<C> for Box<dyn Rule<C>> {
    fn evaluate(&mut self, ctx: &mut C, now: Timestamp) -> bool {
        (**self).evaluate(ctx, now)
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn last_evaluation(&self) -> bool {
        (**self).last_evaluation()
    }
}

// ---------------------------------------------------------------------------
// PredicateRule
// ---------------------------------------------------------------------------

/// A rule that is exactly its predicate.
pub struct PredicateRule<C> {
    predicate: Predicate<C>,
    last: bool,
}

impl<C> PredicateRule<C> {
    pub fn new(predicate: impl FnMut(&mut C) -> bool + Send + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
            last: false,
        }
    }

    /// A rule that is always satisfied.
    pub fn always() -> Self {
        Self::new(|_| true)
    }
}

impl<C> Rule<C> for PredicateRule<C> {
    fn evaluate(&mut self, ctx: &mut C, _now: Timestamp) -> bool {
        self.last = (self.predicate)(ctx);
        self.last
    }

    fn reset(&mut self) {
        self.last = false;
    }

    fn last_evaluation(&self) -> bool {
        self.last
    }
}

// ---------------------------------------------------------------------------
// Combinators
// ---------------------------------------------------------------------------

/// Conjunction that stops at the first unsatisfied rule.
///
/// Rules after a failing one are not evaluated on that tick, so keep rules
/// that must see every tick (timed rules) at the front.
pub struct AllOf<C> {
    rules: Vec<Box<dyn Rule<C>>>,
    last: bool,
}

impl<C: 'static> AllOf<C> {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            last: false,
        }
    }

    pub fn and(mut self, rule: impl Rule<C> + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<C: 'static> Default for AllOf<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Rule<C> for AllOf<C> {
    fn evaluate(&mut self, ctx: &mut C, now: Timestamp) -> bool {
        let mut result = true;
        for rule in &mut self.rules {
            if !rule.evaluate(ctx, now) {
                result = false;
                break;
            }
        }
        self.last = result;
        result
    }

    fn reset(&mut self) {
        self.last = false;
        for rule in &mut self.rules {
            rule.reset();
        }
    }

    fn last_evaluation(&self) -> bool {
        self.last
    }
}

/// Negation of another rule.
pub struct Not<R> {
    inner: R,
    last: bool,
}

impl<R> Not<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, last: false }
    }
}

impl<C, R: Rule<C>> Rule<C> for Not<R> {
    fn evaluate(&mut self, ctx: &mut C, now: Timestamp) -> bool {
        self.last = !self.inner.evaluate(ctx, now);
        self.last
    }

    fn reset(&mut self) {
        self.last = false;
        self.inner.reset();
    }

    fn last_evaluation(&self) -> bool {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx {
        flag: bool,
        calls: u32,
    }

    fn now() -> Timestamp {
        Timestamp::default()
    }

    #[test]
    fn test_predicate_rule_records_last_evaluation() {
        let mut rule = PredicateRule::new(|c: &mut Ctx| c.flag);
        let mut ctx = Ctx { flag: true, calls: 0 };

        assert!(rule.evaluate(&mut ctx, now()));
        assert!(rule.last_evaluation());

        rule.reset();
        assert!(!rule.last_evaluation());

        ctx.flag = false;
        assert!(!rule.evaluate(&mut ctx, now()));
    }

    #[test]
    fn test_always() {
        let mut rule = PredicateRule::<()>::always();
        assert!(rule.evaluate(&mut (), now()));
    }

    #[test]
    fn test_all_of_short_circuits() {
        let mut rule = AllOf::new()
            .and(PredicateRule::new(|c: &mut Ctx| c.flag))
            .and(PredicateRule::new(|c: &mut Ctx| {
                c.calls += 1;
                true
            }));
        let mut ctx = Ctx { flag: false, calls: 0 };

        assert!(!rule.evaluate(&mut ctx, now()));
        assert_eq!(ctx.calls, 0);

        ctx.flag = true;
        assert!(rule.evaluate(&mut ctx, now()));
        assert_eq!(ctx.calls, 1);
        assert_eq!(rule.len(), 2);
    }

    #[test]
    fn test_empty_all_of_is_true() {
        let mut rule = AllOf::<()>::new();
        assert!(rule.is_empty());
        assert!(rule.evaluate(&mut (), now()));
    }

    #[test]
    fn test_not() {
        let mut rule = Not::new(PredicateRule::new(|c: &mut Ctx| c.flag));
        let mut ctx = Ctx { flag: true, calls: 0 };
        assert!(!rule.evaluate(&mut ctx, now()));
        ctx.flag = false;
        assert!(rule.evaluate(&mut ctx, now()));
    }
}
