//! # Embodia
//!
//! Shared-state infrastructure for embodied agents.
//!
//! Independent sensing and behavior modules never talk to each other directly.
//! They read and write a typed, observable key/value store (the
//! [`blackboard`]) once per tick of the host loop. Gesture classifiers turn
//! noisy sensor keys into debounced intent keys using the temporal
//! [`rules`] framework; [`gestures::pointing`] is the reference instance.
//!
//! ```text
//! sensor modules ──set──▶ DataStore ──get──▶ gesture machines
//!                            ▲                      │
//!                            └──────── set ─────────┘
//!                            │
//!                      subscribe ──▶ behavior modules
//! ```

pub mod blackboard;
pub mod clock;
pub mod config;
pub mod gestures;
pub mod modules;
pub mod rules;

pub use blackboard::{DataStore, SubscriptionId, Value, ValueKind, Vec3, Quat};
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::EmbodiaConfig;
pub use gestures::{PointingDetector, PointingState};
pub use modules::{Module, ModuleContext, ModuleError, ModuleHost};
pub use rules::{PredicateRule, Rule, RuleStateMachine, StateMachineError, TimedRule};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
