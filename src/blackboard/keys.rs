//! Well-known blackboard keys.
//!
//! Keys are opaque strings to the store; the `:` hierarchy is a naming
//! convention. Each key below has exactly one writer by convention.

use super::schema::KeySchema;
use super::value::ValueKind;

/// Whether the user is engaged with the agent. Writer: engagement sensor.
pub const USER_IS_ENGAGED: &str = "user:isEngaged";
/// Impact point of the user's pointing ray; absent while no valid ray
/// exists. Writer: pointing sensor.
pub const USER_POINT_POS: &str = "user:pointPos";
/// Prefix for skeleton joints, e.g. `user:joint:head`. Writer: skeleton tracker.
pub const USER_JOINT_PREFIX: &str = "user:joint:";
/// Hand positions (`user:hands:left`, `user:hands:right`). Writer: skeleton tracker.
pub const USER_HANDS_LEFT: &str = "user:hands:left";
pub const USER_HANDS_RIGHT: &str = "user:hands:right";

/// True while the user is pointing (armed or held). Writer: PointingDetector.
pub const USER_IS_POINTING: &str = "user:isPointing";
/// Name of the pointing state machine's current state. Writer: PointingDetector.
pub const USER_POINTING_STATE: &str = "user:pointingState";
/// Location of the last stable point. Writer: PointingDetector.
pub const USER_LAST_POINTED_AT_LOCATION: &str = "user:lastPointedAt:location";
/// Object at the last stable point, if any. Writer: PointingDetector.
pub const USER_LAST_POINTED_AT_NAME: &str = "user:lastPointedAt:name";

/// Current high-level action of the agent. Writer: behavior planner.
pub const ME_INTENT_ACTION: &str = "me:intent:action";

/// Schema for the keys above.
pub fn default_schema() -> KeySchema {
    KeySchema::new()
        .with(USER_IS_ENGAGED, ValueKind::Bool)
        .with(USER_POINT_POS, ValueKind::Vector3)
        .with(USER_HANDS_LEFT, ValueKind::Vector3)
        .with(USER_HANDS_RIGHT, ValueKind::Vector3)
        .with(USER_IS_POINTING, ValueKind::Bool)
        .with(USER_POINTING_STATE, ValueKind::String)
        .with(USER_LAST_POINTED_AT_LOCATION, ValueKind::Vector3)
        .with(USER_LAST_POINTED_AT_NAME, ValueKind::String)
        .with(ME_INTENT_ACTION, ValueKind::String)
}

/// Key for a named skeleton joint.
pub fn user_joint(name: &str) -> String {
    format!("{}{}", USER_JOINT_PREFIX, name)
}
