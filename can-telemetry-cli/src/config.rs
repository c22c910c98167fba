//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_telemetry::{BmsConfig, MonitorConfig, PipelineConfig, TimeSource, WatchdogConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    #[serde(default)]
    pub bms: BmsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    /// DBC files with the BMS message layout
    #[serde(default = "default_dbc_files")]
    pub dbc_files: Vec<PathBuf>,
    /// Clock for fault cooldowns: "wall" for live traffic, "frame" for replays
    #[serde(default)]
    pub time_source: TimeSource,
}

fn default_dbc_files() -> Vec<PathBuf> {
    vec![PathBuf::from("dbc/bms.dbc")]
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            dbc_files: default_dbc_files(),
            time_source: TimeSource::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// JSON lines destination (default: stdout)
    pub file: Option<PathBuf>,
    /// Replaces the built-in dashboard name table when set
    pub display_names: Option<HashMap<String, String>>,
}

impl AppConfig {
    /// Pipeline settings for the library
    pub fn pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::new()
            .with_monitor(self.monitor.clone())
            .with_watchdog_timeout(self.watchdog.timeout_secs)
            .with_time_source(self.input.time_source);
        config.bms = self.bms.clone();

        if let Some(names) = &self.output.display_names {
            config.display_names = names
                .iter()
                .map(|(name, display)| (name.trim().to_lowercase(), display.clone()))
                .collect();
        }
        config
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    config
        .pipeline_config()
        .validate()
        .with_context(|| format!("Invalid configuration in {:?}", path))?;

    Ok(config)
}
