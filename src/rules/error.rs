//! State-machine setup errors.

use thiserror::Error;

/// Errors raised while wiring a [`RuleStateMachine`](super::RuleStateMachine).
///
/// These are configuration mistakes; they surface at setup time and never
/// during evaluation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateMachineError {
    /// A transition from a state to itself.
    #[error("state machine '{machine}': transition from {state} to itself is not allowed")]
    SelfLoop { machine: String, state: String },
}
