//! Configuration — YAML file plus environment overrides.
//!
//! ```yaml
//! store:
//!   log_path: DataStore.log
//!   use_default_schema: true
//! pointing:
//!   hold_ms: 700
//!   stability_diameter: 0.05
//! host:
//!   tick_ms: 33
//! ```
//!
//! Every field is optional. `EMBODIA_LOG_PATH` and `EMBODIA_TICK_MS` override
//! the file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blackboard::{keys, DataStore};
use crate::clock::Clock;
use crate::gestures::PointingConfig;

pub const ENV_LOG_PATH: &str = "EMBODIA_LOG_PATH";
pub const ENV_TICK_MS: &str = "EMBODIA_TICK_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: String, value: String },
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Append-only change log. No log when unset.
    pub log_path: Option<PathBuf>,
    /// Check writes against the well-known key schema in debug builds.
    pub use_default_schema: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            use_default_schema: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Period of the host loop.
    pub tick_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self { tick_ms: 33 }
    }
}

impl HostConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

// ============================================================================
// EmbodiaConfig
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbodiaConfig {
    pub store: StoreConfig,
    pub pointing: PointingConfig,
    pub host: HostConfig,
}

impl EmbodiaConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a YAML file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_env()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but falls back to defaults (plus
    /// environment overrides) when the file is missing or invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::info!("Using default configuration ({}): {}", path.display(), e);
                let mut config = Self::default();
                if let Err(e) = config.apply_env() {
                    log::warn!("Ignoring environment override: {}", e);
                }
                config
            }
        }
    }

    /// Apply `EMBODIA_LOG_PATH` and `EMBODIA_TICK_MS`.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(path) = var(ENV_LOG_PATH).filter(|p| !p.is_empty()) {
            self.store.log_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = var(ENV_TICK_MS) {
            self.host.tick_ms = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                key: ENV_TICK_MS.to_string(),
                value: raw.clone(),
            })?;
        }
        Ok(())
    }

    /// Build a store from the `store` section.
    pub fn build_store(&self, clock: Arc<dyn Clock>) -> DataStore {
        let mut builder = DataStore::builder().clock(clock);
        if let Some(path) = &self.store.log_path {
            builder = builder.log_to_file(path.clone());
        }
        if self.store.use_default_schema {
            builder = builder.schema(keys::default_schema());
        }
        builder.build()
    }
}
