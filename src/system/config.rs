//! Centralized configuration management

use crate::brewing::stages::{default_brewing_stages, StageTable};
use crate::types::{StageDefinition, DEFAULT_TICK_INTERVAL_MS};
use anyhow::{bail, Context};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_PATH_VAR: &str = "BREWTRACK_CONFIG";
pub const TICK_INTERVAL_VAR: &str = "BREWTRACK_TICK_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Wall-clock milliseconds per logical minute.
    pub tick_interval_ms: u64,
    pub stages: Vec<StageDefinition>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            stages: default_brewing_stages(),
        }
    }
}

impl ProcessConfig {
    /// Reads `BREWTRACK_CONFIG` (optional JSON file) and `BREWTRACK_TICK_MS`.
    pub fn from_env() -> anyhow::Result<Self> {
        let path = var(CONFIG_PATH_VAR);
        let tick = var(TICK_INTERVAL_VAR);
        Self::load(path.as_deref().map(Path::new), tick.as_deref())
    }

    pub fn load(path: Option<&Path>, tick_interval_ms: Option<&str>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                let config = Self::from_json_str(&raw)
                    .with_context(|| format!("Invalid config file {}", path.display()))?;
                info!(
                    "Loaded {} stages from {}",
                    config.stages.len(),
                    path.display()
                );
                config
            }
            None => Self::default(),
        };

        if let Some(raw) = tick_interval_ms {
            config.tick_interval_ms = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value: {:?}", TICK_INTERVAL_VAR, raw))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(raw).context("Malformed config JSON")?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be greater than zero");
        }
        self.stage_table()?;
        Ok(())
    }

    pub fn stage_table(&self) -> anyhow::Result<StageTable> {
        StageTable::new(self.stages.clone()).context("Invalid stage table")
    }
}

fn var(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        Ok(_) => {
            warn!("{key} is set but empty, using default");
            None
        }
        Err(_) => {
            info!("{key} not set, using default");
            None
        }
    }
}
