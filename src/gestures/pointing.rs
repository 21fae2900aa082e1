//! Pointing detection — a debounced gesture classifier.
//!
//! ```text
//!            engaged + ray ≥ start_ms
//!   Stopped ─────────────────────────▶ Started ◀──────────┐
//!      ▲                                │  engaged + ray ≥ hold_ms
//!      │ lost ≥ stop_ms                 │  and target settled   │ always
//!      └────────────────────────────────┤                       │
//!      ▲                                ▼                       │
//!      └──────────── lost ≥ stop_ms ── Pointed ─────────────────┘
//! ```
//!
//! "Target settled" means either the same object was resolved under the
//! ray on two consecutive checks, or (with no object in range) the impact
//! history has just become spatially stable. Stability is edge-triggered:
//! once announced, a stable point is not announced again until the ray
//! has moved away and settled anew, or pointing stopped in between.
//!
//! Reads: `user:isEngaged`, `user:pointPos`.
//! Writes: `user:isPointing`, `user:pointingState`,
//! `user:lastPointedAt:location`, `user:lastPointedAt:name`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blackboard::{keys, DataStore, Vec3};
use crate::clock::Clock;
use crate::modules::{Module, ModuleContext, ModuleError};
use crate::rules::{AllOf, PredicateRule, RuleStateMachine, StateMachineError, TimedRule};

use super::history::ImpactHistory;
use super::resolver::{NoObjects, ObjectResolver};

// ---------------------------------------------------------------------------
// States and configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointingState {
    Stopped,
    Started,
    Pointed,
}

impl PointingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointingState::Stopped => "Stopped",
            PointingState::Started => "Started",
            PointingState::Pointed => "Pointed",
        }
    }

    pub fn is_pointing(&self) -> bool {
        !matches!(self, PointingState::Stopped)
    }
}

impl fmt::Display for PointingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timing and geometry of the pointing classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointingConfig {
    /// Engaged with a valid ray this long before pointing starts.
    pub start_ms: i64,
    /// Engaged with a valid ray this long (since `Started`) before a target
    /// can be announced.
    pub hold_ms: i64,
    /// Lost engagement or ray this long before pointing stops.
    pub stop_ms: i64,
    /// Number of impact points in the stability window.
    pub history_len: usize,
    /// Largest bounding diameter of a stable window.
    pub stability_diameter: f64,
    /// Search radius for objects around the impact point.
    pub object_radius: f64,
}

impl Default for PointingConfig {
    fn default() -> Self {
        Self {
            start_ms: 100,
            hold_ms: 700,
            stop_ms: 100,
            history_len: 30,
            stability_diameter: 0.05,
            object_radius: 0.1,
        }
    }
}

// ---------------------------------------------------------------------------
// Rule context
// ---------------------------------------------------------------------------

/// What a satisfied `Started -> Pointed` check found.
#[derive(Debug, Clone, PartialEq)]
pub struct PointedTarget {
    pub location: Vec3,
    pub name: Option<String>,
}

/// Scratch state the pointing rules evaluate against.
pub struct PointingContext {
    store: Arc<DataStore>,
    resolver: Box<dyn ObjectResolver>,
    history: ImpactHistory,
    stability_diameter: f64,
    object_radius: f64,
    stability_armed: bool,
    last_object: Option<String>,
    target: Option<PointedTarget>,
}

impl PointingContext {
    fn new(store: Arc<DataStore>, config: &PointingConfig, resolver: Box<dyn ObjectResolver>) -> Self {
        Self {
            store,
            resolver,
            history: ImpactHistory::new(config.history_len),
            stability_diameter: config.stability_diameter,
            object_radius: config.object_radius,
            stability_armed: true,
            last_object: None,
            target: None,
        }
    }

    /// Current impact point; `None` while there is no valid ray.
    pub fn impact_point(&self) -> Option<Vec3> {
        self.store.get(keys::USER_POINT_POS).and_then(|v| v.as_vec3())
    }

    pub fn is_engaged(&self) -> bool {
        self.store.get_typed(keys::USER_IS_ENGAGED, false)
    }

    /// Engaged and holding a valid ray.
    pub fn is_aiming(&self) -> bool {
        self.is_engaged() && self.impact_point().is_some()
    }

    pub fn history(&self) -> &ImpactHistory {
        &self.history
    }

    pub fn last_object(&self) -> Option<&str> {
        self.last_object.as_deref()
    }

    /// Runs before every evaluation, whatever the state.
    fn observe(&mut self, state: PointingState) {
        if state == PointingState::Stopped {
            self.stability_armed = true;
            self.last_object = None;
        }
        if let Some(point) = self.impact_point() {
            self.history.push(point);
        }
        if !self.history.is_stable(self.stability_diameter) {
            self.stability_armed = true;
        }
    }

    /// Object identity when something is in range, spatial stability
    /// otherwise. Records the target on success.
    fn target_settled(&mut self) -> bool {
        let Some(point) = self.impact_point() else {
            return false;
        };

        if let Some(object) = self.resolver.resolve(point, self.object_radius) {
            let same = self.last_object.as_deref() == Some(object.name.as_str());
            self.last_object = Some(object.name.clone());
            if same {
                self.target = Some(PointedTarget {
                    location: object.position,
                    name: Some(object.name),
                });
            }
            return same;
        }

        self.last_object = None;
        if !self.stability_armed || !self.history.is_stable(self.stability_diameter) {
            return false;
        }
        let Some(centroid) = self.history.centroid() else {
            return false;
        };
        self.stability_armed = false;
        self.target = Some(PointedTarget {
            location: centroid,
            name: None,
        });
        true
    }
}

impl fmt::Debug for PointingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointingContext")
            .field("history_len", &self.history.len())
            .field("stability_armed", &self.stability_armed)
            .field("last_object", &self.last_object)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Detector module
// ---------------------------------------------------------------------------

pub type PointingMachine = RuleStateMachine<PointingState, PointingContext>;

/// Classifies raw pointing input into pointing intents.
pub struct PointingDetector {
    module: ModuleContext,
    machine: PointingMachine,
    context: PointingContext,
}

impl PointingDetector {
    /// Default module name.
    pub const NAME: &'static str = "PointingDetector";

    pub fn new(module: ModuleContext, config: PointingConfig) -> Result<Self, StateMachineError> {
        Self::with_resolver(module, config, NoObjects)
    }

    pub fn with_resolver(
        module: ModuleContext,
        config: PointingConfig,
        resolver: impl ObjectResolver + 'static,
    ) -> Result<Self, StateMachineError> {
        let store = Arc::clone(module.store());
        let machine = build_machine(&config, store.clock())?;
        let context = PointingContext::new(store, &config, Box::new(resolver));
        Ok(Self {
            module,
            machine,
            context,
        })
    }

    pub fn state(&self) -> PointingState {
        self.machine.current_state()
    }

    pub fn machine(&self) -> &PointingMachine {
        &self.machine
    }

    pub fn context(&self) -> &PointingContext {
        &self.context
    }

    /// Evaluate once and publish the new state if it changed.
    pub fn step(&mut self) -> bool {
        let changed = self.machine.evaluate(&mut self.context);
        if changed {
            self.publish();
        }
        changed
    }

    fn publish(&mut self) {
        let state = self.machine.current_state();
        let target = match state {
            PointingState::Pointed => self.context.target.take(),
            _ => None,
        };

        let mut batch = self.module.batch();
        if let Some(target) = target {
            log::info!(
                "[{}] pointing at {} ({})",
                self.module.name(),
                target.location,
                target.name.as_deref().unwrap_or("no object")
            );
            batch.set(keys::USER_LAST_POINTED_AT_LOCATION, target.location, "stable point");
            match target.name {
                Some(name) => {
                    batch.set(keys::USER_LAST_POINTED_AT_NAME, name, "object under ray");
                }
                None => {
                    batch.clear(keys::USER_LAST_POINTED_AT_NAME, "no object under ray");
                }
            }
        }
        batch.set(keys::USER_IS_POINTING, state.is_pointing(), state.as_str());
        batch.set(keys::USER_POINTING_STATE, state.as_str(), "");
        batch.commit();
    }
}

fn build_machine(
    config: &PointingConfig,
    clock: Arc<dyn Clock>,
) -> Result<PointingMachine, StateMachineError> {
    use PointingState::*;

    let aiming = |ctx: &mut PointingContext| ctx.is_aiming();
    let lost = |ctx: &mut PointingContext| !ctx.is_aiming();

    let mut machine = RuleStateMachine::new("pointing", Stopped, clock)
        .with_transition(Stopped, Started, TimedRule::new(aiming, config.start_ms))?
        .with_transition(Started, Stopped, TimedRule::new(lost, config.stop_ms))?
        .with_transition(
            Started,
            Pointed,
            AllOf::new()
                .and(TimedRule::new(aiming, config.hold_ms))
                .and(PredicateRule::new(PointingContext::target_settled)),
        )?
        .with_transition(Pointed, Stopped, TimedRule::new(lost, config.stop_ms))?
        .with_transition(Pointed, Started, PredicateRule::always())?;

    // The impact history must keep filling while the machine lingers in
    // `Started`, so it is fed from the evaluate hook, not from a rule.
    machine.on_evaluate(|ctx, state| ctx.observe(state));
    Ok(machine)
}

impl Module for PointingDetector {
    fn name(&self) -> &str {
        self.module.name()
    }

    fn start(&mut self) -> Result<(), ModuleError> {
        self.publish();
        Ok(())
    }

    fn tick(&mut self) -> Result<(), ModuleError> {
        self.step();
        Ok(())
    }
}

impl fmt::Debug for PointingDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointingDetector")
            .field("name", &self.module.name())
            .field("state", &self.state())
            .field("context", &self.context)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::gestures::resolver::StaticScene;

    const TICK_MS: i64 = 20;
    const SPOT: Vec3 = Vec3::new(1.0, 0.0, 2.0);

    struct Rig {
        clock: Arc<ManualClock>,
        store: Arc<DataStore>,
        detector: PointingDetector,
    }

    impl Rig {
        fn new(resolver: impl ObjectResolver + 'static) -> Self {
            let clock = ManualClock::shared();
            let store = Arc::new(DataStore::builder().clock(clock.clone()).build());
            let module = ModuleContext::new(PointingDetector::NAME, store.clone());
            let mut detector =
                PointingDetector::with_resolver(module, PointingConfig::default(), resolver).unwrap();
            detector.start().unwrap();
            Self {
                clock,
                store,
                detector,
            }
        }

        /// Write sensor input, tick once, then advance the clock one frame.
        fn frame(&mut self, engaged: bool, point: Option<Vec3>) -> PointingState {
            self.store.set(keys::USER_IS_ENGAGED, engaged, "sensor", "");
            match point {
                Some(p) => {
                    self.store.set(keys::USER_POINT_POS, p, "sensor", "");
                }
                None => {
                    self.store.clear(keys::USER_POINT_POS);
                }
            }
            self.detector.tick().unwrap();
            let state = self.detector.state();
            self.clock.advance_ms(TICK_MS);
            state
        }

        fn elapsed_ms(&self) -> i64 {
            self.clock.epoch_ms()
        }

        fn location(&self) -> Option<Vec3> {
            self.store
                .get(keys::USER_LAST_POINTED_AT_LOCATION)
                .and_then(|v| v.as_vec3())
        }
    }

    #[test]
    fn test_publishes_initial_state() {
        let rig = Rig::new(NoObjects);
        assert!(!rig.store.get_typed(keys::USER_IS_POINTING, true));
        assert_eq!(
            rig.store.get_typed(keys::USER_POINTING_STATE, String::new()),
            "Stopped"
        );
    }

    #[test]
    fn test_short_glance_does_not_start() {
        let mut rig = Rig::new(NoObjects);
        for _ in 0..4 {
            assert_eq!(rig.frame(true, Some(SPOT)), PointingState::Stopped);
        }
        rig.frame(false, Some(SPOT));
        for _ in 0..4 {
            assert_eq!(rig.frame(true, Some(SPOT)), PointingState::Stopped);
        }
    }

    #[test]
    fn test_steady_point_reaches_pointed_at_fixed_location() {
        let mut rig = Rig::new(NoObjects);
        rig.store.set(keys::USER_LAST_POINTED_AT_NAME, "stale", "test", "");

        let mut started_at = None;
        let mut pointed_at = None;
        for _ in 0..60 {
            let now = rig.elapsed_ms();
            match rig.frame(true, Some(SPOT)) {
                PointingState::Started if started_at.is_none() => started_at = Some(now),
                PointingState::Pointed => {
                    pointed_at = Some(now);
                    break;
                }
                _ => {}
            }
        }

        assert_eq!(started_at, Some(100));
        // Not 750: timers reset on entry, so the 700 ms hold only starts
        // counting at 120, the first evaluation after Started at 100.
        assert_eq!(pointed_at, Some(820));
        assert_eq!(rig.location(), Some(SPOT));
        assert!(rig.store.get_typed(keys::USER_IS_POINTING, false));
        assert_eq!(
            rig.store.get_typed(keys::USER_POINTING_STATE, String::new()),
            "Pointed"
        );
        assert!(!rig.store.contains(keys::USER_LAST_POINTED_AT_NAME));
    }

    #[test]
    fn test_stable_point_announced_once() {
        let mut rig = Rig::new(NoObjects);
        let mut entries = 0;
        let mut previous = PointingState::Stopped;
        for _ in 0..150 {
            let state = rig.frame(true, Some(SPOT));
            if state == PointingState::Pointed && previous != PointingState::Pointed {
                entries += 1;
            }
            previous = state;
        }
        assert_eq!(entries, 1);
        assert_eq!(rig.detector.state(), PointingState::Started);
    }

    #[test]
    fn test_moving_to_new_spot_announces_again() {
        let mut rig = Rig::new(NoObjects);
        let other = Vec3::new(-1.0, 0.5, 2.0);
        let mut announced = Vec::new();
        for i in 0..200 {
            let point = if i < 100 { SPOT } else { other };
            if rig.frame(true, Some(point)) == PointingState::Pointed {
                announced.push(rig.location().unwrap());
            }
        }
        assert_eq!(announced, vec![SPOT, other]);
    }

    #[test]
    fn test_lost_engagement_stops_and_keeps_last_target() {
        let mut rig = Rig::new(NoObjects);
        while rig.frame(true, Some(SPOT)) != PointingState::Pointed {
            assert!(rig.elapsed_ms() < 2_000);
        }
        for _ in 0..5 {
            rig.frame(true, Some(SPOT));
        }
        assert_eq!(rig.detector.state(), PointingState::Started);

        // 150 ms without engagement.
        let lost_from = rig.elapsed_ms();
        while rig.elapsed_ms() - lost_from < 150 {
            rig.frame(false, Some(SPOT));
        }

        assert_eq!(rig.detector.state(), PointingState::Stopped);
        assert!(!rig.store.get_typed(keys::USER_IS_POINTING, true));
        assert_eq!(rig.location(), Some(SPOT));
        assert_eq!(rig.detector.machine().previous_state(), Some(PointingState::Started));
    }

    #[test]
    fn test_missing_ray_counts_as_lost() {
        let mut rig = Rig::new(NoObjects);
        while rig.frame(true, Some(SPOT)) != PointingState::Started {}
        for _ in 0..5 {
            assert_eq!(rig.frame(true, None), PointingState::Started);
        }
        assert_eq!(rig.frame(true, None), PointingState::Stopped);
    }

    #[test]
    fn test_same_object_twice_announces_object() {
        let scene = StaticScene::new().with("cup", SPOT);
        let mut rig = Rig::new(scene);
        rig.store.set(keys::USER_LAST_POINTED_AT_NAME, "stale", "test", "");

        // Jitter wide enough that the window never becomes stable.
        let jitter = [Vec3::new(1.05, 0.0, 2.0), Vec3::new(0.95, 0.0, 2.0)];
        let mut pointed_at = None;
        for i in 0..60 {
            let now = rig.elapsed_ms();
            if rig.frame(true, Some(jitter[i % 2])) == PointingState::Pointed {
                pointed_at = Some(now);
                break;
            }
        }

        // First satisfying check at 820 only records the object.
        assert_eq!(pointed_at, Some(840));
        assert_eq!(rig.location(), Some(SPOT));
        assert_eq!(
            rig.store.get_typed(keys::USER_LAST_POINTED_AT_NAME, String::new()),
            "cup"
        );
        assert_eq!(rig.detector.context().last_object(), Some("cup"));
    }

    #[test]
    fn test_alternating_objects_never_announce() {
        let plate = Vec3::new(-1.0, 0.0, 2.0);
        let scene = StaticScene::new().with("cup", SPOT).with("plate", plate);
        let mut rig = Rig::new(scene);

        for i in 0..200 {
            let point = if i % 2 == 0 { SPOT } else { plate };
            assert_ne!(rig.frame(true, Some(point)), PointingState::Pointed, "frame {}", i);
        }

        assert_eq!(rig.detector.state(), PointingState::Started);
        assert_eq!(rig.location(), None);
        assert!(!rig.store.has(keys::USER_LAST_POINTED_AT_NAME));
        assert!(rig.detector.context().last_object().is_some());
    }

    #[test]
    fn test_unstable_point_without_object_never_announces() {
        let mut rig = Rig::new(NoObjects);
        for i in 0..150 {
            let x = if i % 2 == 0 { 1.0 } else { 1.2 };
            assert_ne!(rig.frame(true, Some(Vec3::new(x, 0.0, 2.0))), PointingState::Pointed);
        }
        assert_eq!(rig.location(), None);
    }

    #[test]
    fn test_history_fills_while_started() {
        let mut rig = Rig::new(NoObjects);
        for _ in 0..20 {
            rig.frame(true, Some(SPOT));
        }
        assert_eq!(rig.detector.state(), PointingState::Started);
        assert_eq!(rig.detector.context().history().len(), 20);
    }

    #[test]
    fn test_deterministic_replay() {
        let script: Vec<(bool, Option<Vec3>)> = (0..200)
            .map(|i| {
                let engaged = !(120..130).contains(&i);
                let point = if i % 37 == 0 { None } else { Some(SPOT) };
                (engaged, point)
            })
            .collect();

        let run = || {
            let mut rig = Rig::new(NoObjects);
            script
                .iter()
                .map(|(engaged, point)| rig.frame(*engaged, *point))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_config_from_partial_yaml() {
        let config: PointingConfig = serde_yaml::from_str("hold_ms: 500\nobject_radius: 0.2\n").unwrap();
        assert_eq!(config.hold_ms, 500);
        assert_eq!(config.start_ms, 100);
        assert_eq!(config.history_len, 30);
        assert!((config.object_radius - 0.2).abs() < f64::EPSILON);
    }
}
