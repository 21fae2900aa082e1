//! Module system errors.

use thiserror::Error;

use crate::rules::StateMachineError;

/// Errors that can occur while registering, starting or ticking modules.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// A module with the same name is already registered.
    #[error("Module already registered: {0}")]
    AlreadyRegistered(String),

    /// No module with this name is registered.
    #[error("Module not found: {0}")]
    NotFound(String),

    /// A module's state machine was wired incorrectly.
    #[error("State machine setup error: {0}")]
    StateMachine(#[from] StateMachineError),

    /// A module failed during start-up.
    #[error("Start-up error in {module}: {message}")]
    Startup { module: String, message: String },

    /// A module failed during a tick.
    #[error("Runtime error in {module}: {message}")]
    Runtime { module: String, message: String },
}
