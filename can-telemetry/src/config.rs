//! Pipeline configuration types
//!
//! Everything here is loaded once at startup and read-only afterwards. The
//! defaults describe the vehicle this bridge was built for; every table can be
//! replaced from a configuration file.

use crate::types::{Result, TelemetryError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for the whole decode-and-monitor pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub bms: BmsConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub watchdog: WatchdogConfig,

    /// Clock used for fault cooldowns
    #[serde(default)]
    pub time_source: TimeSource,

    /// Dashboard names for published readings (lower-case raw name → display name)
    #[serde(default = "default_display_names")]
    pub display_names: HashMap<String, String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bms: BmsConfig::default(),
            monitor: MonitorConfig::default(),
            watchdog: WatchdogConfig::default(),
            time_source: TimeSource::default(),
            display_names: default_display_names(),
        }
    }
}

impl PipelineConfig {
    /// Create a new pipeline configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: replace the monitor configuration
    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    /// Builder method: set the watchdog idle timeout (0 disables it)
    pub fn with_watchdog_timeout(mut self, timeout_secs: u64) -> Self {
        self.watchdog.timeout_secs = timeout_secs;
        self
    }

    /// Builder method: choose the clock used for cooldowns
    pub fn with_time_source(mut self, time_source: TimeSource) -> Self {
        self.time_source = time_source;
        self
    }

    /// Name under which a reading is shown on the dashboard
    pub fn display_name(&self, name: &str) -> String {
        let key = name.trim();
        self.display_names
            .get(&key.to_lowercase())
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Check the configuration for values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        self.bms.validate()?;
        self.monitor.validate()
    }
}

/// Which clock drives fault cooldowns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeSource {
    /// Wall-clock time at which the frame is processed
    #[default]
    Wall,
    /// Capture timestamp carried by the frame (for replaying recorded logs)
    Frame,
}

/// BMS decoder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BmsConfig {
    /// Nominal pack capacity used for the remaining-time prediction
    #[serde(default = "default_pack_capacity")]
    pub nominal_pack_capacity: f64,
}

fn default_pack_capacity() -> f64 {
    6.0
}

impl Default for BmsConfig {
    fn default() -> Self {
        Self {
            nominal_pack_capacity: default_pack_capacity(),
        }
    }
}

impl BmsConfig {
    fn validate(&self) -> Result<()> {
        if !self.nominal_pack_capacity.is_finite() || self.nominal_pack_capacity <= 0.0 {
            return Err(TelemetryError::InvalidConfig(format!(
                "nominal_pack_capacity must be positive, got {}",
                self.nominal_pack_capacity
            )));
        }
        Ok(())
    }
}

/// Idle watchdog settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Seconds without a frame before the bridge is reported idle; 0 disables
    #[serde(default)]
    pub timeout_secs: u64,
}

/// Limits for one monitored signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FaultThreshold {
    /// Values strictly above this are FAULT_HIGH
    #[serde(default)]
    pub max: Option<f64>,
    /// Values at or above this are WARN_HIGH
    #[serde(default)]
    pub warn: Option<f64>,
    /// Values strictly below this are FAULT_LOW
    #[serde(default)]
    pub min: Option<f64>,
}

impl FaultThreshold {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn with_warn(mut self, warn: f64) -> Self {
        self.warn = Some(warn);
        self
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }
}

/// Fault monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Whether readings are checked at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum seconds between repeated events for a sustained fault
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: f64,

    /// Limits by threshold key
    #[serde(default = "default_thresholds")]
    pub thresholds: HashMap<String, FaultThreshold>,

    /// Raw reading name (case-insensitive) → threshold key
    #[serde(default = "default_aliases")]
    pub aliases: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_cooldown() -> f64 {
    5.0
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_secs: default_cooldown(),
            thresholds: default_thresholds(),
            aliases: default_aliases(),
        }
    }
}

impl MonitorConfig {
    /// Create a monitor configuration with the default tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a monitor configuration with no thresholds and no aliases
    pub fn empty() -> Self {
        Self {
            enabled: true,
            cooldown_secs: default_cooldown(),
            thresholds: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Builder method: set the cooldown between repeated events
    pub fn with_cooldown(mut self, cooldown_secs: f64) -> Self {
        self.cooldown_secs = cooldown_secs;
        self
    }

    /// Builder method: add or replace the limits for a signal
    pub fn with_threshold(mut self, key: impl Into<String>, threshold: FaultThreshold) -> Self {
        self.thresholds.insert(key.into(), threshold);
        self
    }

    /// Builder method: route a raw reading name to a threshold key
    pub fn with_alias(mut self, name: &str, key: impl Into<String>) -> Self {
        self.aliases.insert(name.trim().to_lowercase(), key.into());
        self
    }

    /// Builder method: enable or disable monitoring
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Check the configuration for values the monitor cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self.cooldown_secs.is_finite() || self.cooldown_secs < 0.0 {
            return Err(TelemetryError::InvalidConfig(format!(
                "cooldown_secs must be a non-negative number, got {}",
                self.cooldown_secs
            )));
        }

        for (key, threshold) in &self.thresholds {
            if let (Some(min), Some(max)) = (threshold.min, threshold.max) {
                if min > max {
                    return Err(TelemetryError::InvalidConfig(format!(
                        "threshold '{}' has min {} above max {}",
                        key, min, max
                    )));
                }
            }
            if let (Some(warn), Some(max)) = (threshold.warn, threshold.max) {
                if warn > max {
                    return Err(TelemetryError::InvalidConfig(format!(
                        "threshold '{}' has warn {} above max {}",
                        key, warn, max
                    )));
                }
            }
        }
        Ok(())
    }
}

fn default_thresholds() -> HashMap<String, FaultThreshold> {
    let t = FaultThreshold::new;
    [
        ("Battery Temperature", t().with_max(60.0).with_min(-10.0)),
        ("Battery Voltage", t().with_max(336.0).with_warn(320.0).with_min(180.0)),
        ("Battery Current", t().with_max(240.0).with_warn(200.0).with_min(-50.0)),
        ("Battery State of Charge", t().with_max(100.0).with_min(0.0)),
        ("Motor Temperature", t().with_max(90.0).with_warn(80.0)),
        ("Motor Speed", t().with_max(12000.0).with_warn(10000.0)),
        ("DC Link Circuit Voltage", t().with_max(450.0).with_warn(420.0).with_min(150.0)),
        ("Accelerator Travel 1", t().with_max(100.0).with_min(0.0)),
        ("Accelerator Travel 2", t().with_max(100.0).with_min(0.0)),
        ("Brake Pressure Front", t().with_max(120.0).with_warn(100.0).with_min(0.0)),
        ("Brake Pressure Rear", t().with_max(120.0).with_warn(100.0).with_min(0.0)),
        ("Wheel Speed FL", t().with_max(250.0).with_warn(220.0).with_min(0.0)),
        ("Wheel Speed FR", t().with_max(250.0).with_warn(220.0).with_min(0.0)),
        ("Wheel Speed RL", t().with_max(250.0).with_warn(220.0).with_min(0.0)),
        ("Wheel Speed RR", t().with_max(250.0).with_warn(220.0).with_min(0.0)),
    ]
    .into_iter()
    .map(|(key, threshold)| (key.to_string(), threshold))
    .collect()
}

fn default_aliases() -> HashMap<String, String> {
    [
        ("motor temp", "Motor Temperature"),
        ("motor temperature", "Motor Temperature"),
        ("controller temp", "Motor Temperature"),
        ("controller temperature", "Motor Temperature"),
        ("motor speed", "Motor Speed"),
        ("battery current", "Battery Current"),
        ("battery voltage", "Battery Voltage"),
        ("dc link circuit voltage", "DC Link Circuit Voltage"),
        ("battery state of charge", "Battery State of Charge"),
        ("soc", "Battery State of Charge"),
        ("brake pressure front", "Brake Pressure Front"),
        ("break pressure front", "Brake Pressure Front"),
        ("brake pressure rear", "Brake Pressure Rear"),
        ("break pressure rear", "Brake Pressure Rear"),
        ("wheel speed fl", "Wheel Speed FL"),
        ("wheel speed fr", "Wheel Speed FR"),
        ("wheel speed rl", "Wheel Speed RL"),
        ("wheel speed rr", "Wheel Speed RR"),
    ]
    .into_iter()
    .map(|(name, key)| (name.to_string(), key.to_string()))
    .collect()
}

fn default_display_names() -> HashMap<String, String> {
    [
        ("battery voltage", "DC Voltage"),
        ("battery state of charge", "SoC"),
        ("soc", "SoC"),
        ("motor speed", "Motor Speed"),
        ("motor rpm", "Motor Speed"),
        ("controller temp", "Motor Temp"),
        ("controller temperature", "Motor Temp"),
        ("motor temperature", "Motor Temp"),
    ]
    .into_iter()
    .map(|(name, display)| (name.to_string(), display.to_string()))
    .collect()
}
