//! Temporal rules and the rule-driven state machine.
//!
//! Gesture classifiers are small state machines whose transitions are
//! guarded by [`Rule`]s. A [`TimedRule`] adds hysteresis: its predicate must
//! hold continuously for a minimum duration before the rule is satisfied,
//! which keeps sensor noise from turning into intent flicker.
//!
//! ```
//! use embodia::clock::ManualClock;
//! use embodia::rules::{RuleStateMachine, TimedRule};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum Hand { Down, Raised }
//!
//! let clock = ManualClock::shared();
//! let mut machine = RuleStateMachine::new("hand", Hand::Down, clock.clone())
//!     .with_transition(Hand::Down, Hand::Raised, TimedRule::new(|up: &mut bool| *up, 200))
//!     .unwrap();
//!
//! let mut hand_up = true;
//! machine.evaluate(&mut hand_up);
//! clock.advance_ms(200);
//! assert!(machine.evaluate(&mut hand_up));
//! assert_eq!(machine.current_state(), Hand::Raised);
//! ```

pub mod error;
pub mod machine;
pub mod rule;
pub mod timed;

pub use error::StateMachineError;
pub use machine::{EvaluateHook, RuleStateMachine};
pub use rule::{AllOf, Not, Predicate, PredicateRule, Rule};
pub use timed::TimedRule;
