//! Gesture classifiers built on [`crate::rules`].
//!
//! Classifiers read raw sensor keys, debounce them through a
//! [`RuleStateMachine`](crate::rules::RuleStateMachine) and publish intent
//! keys for behavior modules.

pub mod history;
pub mod pointing;
pub mod resolver;

pub use history::ImpactHistory;
pub use pointing::{
    PointedTarget, PointingConfig, PointingContext, PointingDetector, PointingMachine, PointingState,
};
pub use resolver::{NoObjects, ObjectResolver, ResolvedObject, StaticScene};
