//! embodia simulator binary.
//!
//! Replays a scripted pointing session through the module host in real time
//! and prints the intents the pointing detector derives from it.
//!
//! # Environment Variables
//!
//! - `EMBODIA_LOG_PATH` — change-log file (default: none)
//! - `EMBODIA_TICK_MS` — host tick period (default: 33)
//! - `RUST_LOG` — tracing filter (default: "info,embodia=debug")
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin embodia-sim -- [config.yaml]
//! ```

use std::sync::Arc;

use embodia::blackboard::{keys, Value, Vec3};
use embodia::clock::{system_clock, Timestamp};
use embodia::gestures::{PointingDetector, StaticScene};
use embodia::modules::{Module, ModuleContext, ModuleError, ModuleHost};
use embodia::EmbodiaConfig;

/// Length of the scripted session.
const SESSION_MS: i64 = 4_500;

/// Writes a scripted sequence of engagement and pointing-ray readings.
struct ScriptedSensor {
    ctx: ModuleContext,
    started: Option<Timestamp>,
    frame: u64,
}

impl ScriptedSensor {
    fn new(ctx: ModuleContext) -> Self {
        Self {
            ctx,
            started: None,
            frame: 0,
        }
    }

    /// `(engaged, impact point)` at `t_ms` into the session.
    fn reading(&self, t_ms: i64) -> (bool, Option<Vec3>) {
        // Small deterministic tremor.
        let wobble = 0.002 * (self.frame as f64 * 0.7).sin();
        match t_ms {
            0..=299 => (false, None),
            300..=2_499 => (true, Some(Vec3::new(1.0 + wobble, 0.0, 2.0 - wobble))),
            2_500..=3_999 => (true, Some(Vec3::new(-0.5, 0.2 + wobble, 1.5))),
            _ => (false, None),
        }
    }
}

impl Module for ScriptedSensor {
    fn name(&self) -> &str {
        self.ctx.name()
    }

    fn start(&mut self) -> Result<(), ModuleError> {
        self.started = Some(self.ctx.store().now());
        Ok(())
    }

    fn tick(&mut self) -> Result<(), ModuleError> {
        let started = self.started.ok_or_else(|| ModuleError::Runtime {
            module: self.ctx.name().to_string(),
            message: "ticked before start".to_string(),
        })?;
        let t_ms = (self.ctx.store().now() - started).num_milliseconds();
        let (engaged, point) = self.reading(t_ms);

        self.ctx.set_value(keys::USER_IS_ENGAGED, engaged, "face tracker");
        match point {
            Some(p) => {
                self.ctx.set_value(keys::USER_POINT_POS, p, "ray cast");
            }
            None => {
                self.ctx.clear_value(keys::USER_POINT_POS, "no ray");
            }
        }
        self.frame += 1;
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,embodia=debug".into()),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "embodia.yaml".to_string());
    let config = EmbodiaConfig::load_or_default(&config_path);
    tracing::info!("embodia {} simulator, tick {} ms", embodia::VERSION, config.host.tick_ms);

    let store = Arc::new(config.build_store(system_clock()));
    let mut host = ModuleHost::new(store.clone());
    host.set_display(Arc::new(|module: &str, key: &str, value: &Value| {
        tracing::trace!("{} set {} = {}", module, key, value);
    }));

    // Behavior side: announce intents and queue the agent's reaction.
    let planner = host.remote_writer("Planner");
    store.subscribe(keys::USER_IS_POINTING, |_, value| {
        tracing::info!("user:isPointing = {}", value);
    });
    let location_store = store.clone();
    store.subscribe(keys::USER_LAST_POINTED_AT_LOCATION, move |_, value| {
        let target = location_store
            .get(keys::USER_LAST_POINTED_AT_NAME)
            .map(|name| name.to_string())
            .unwrap_or_else(|| value.to_string());
        tracing::info!("user pointed at {}", target);
        planner.set(keys::ME_INTENT_ACTION, format!("look at {}", target), "pointing");
    });
    store.subscribe(keys::ME_INTENT_ACTION, |_, value| {
        tracing::info!("me:intent:action = {}", value);
    });

    let scene = StaticScene::new().with("cup", Vec3::new(1.0, 0.0, 2.0));
    host.register(ScriptedSensor::new(host.context("ScriptedSensor")))?;
    host.register(PointingDetector::with_resolver(
        host.context(PointingDetector::NAME),
        config.pointing.clone(),
        scene,
    )?)?;

    let period = config.host.tick_period();
    let ticks = (SESSION_MS as u128 / period.as_millis().max(1)) as u64 + 1;
    host.run_ticks(period, ticks).await?;
    host.stop();

    println!("{}", serde_json::to_string_pretty(&store.snapshot_json())?);
    Ok(())
}
