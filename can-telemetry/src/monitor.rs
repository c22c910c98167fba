//! Fault monitor
//!
//! Checks decoded readings against configured limits and turns the result into a
//! debounced stream of fault events. One [`SignalState`] is kept per threshold
//! key, created on first sight of the signal and owned by the monitor instance.
//!
//! Per reading the candidate status is, in order of precedence:
//! `value > max` → FAULT_HIGH, `value >= warn` → WARN_HIGH, `value < min` →
//! FAULT_LOW, otherwise OK.
//!
//! Events are emitted on every status change. A sustained non-OK status is
//! re-emitted once per cooldown interval. Returning to OK emits a single
//! RESOLVED event. Each evaluation also reports the value of the signal's alarm
//! flag when it changes meaning: 1 with every non-OK emission, 0 whenever the
//! signal is OK.

use crate::config::{FaultThreshold, MonitorConfig};
use crate::types::{Reading, Source};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Prefix of the synthetic alarm flag readings
pub const ALARM_PREFIX: &str = "FAULT ";

/// Stored status of a monitored signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultStatus {
    #[default]
    Ok,
    WarnHigh,
    FaultHigh,
    FaultLow,
}

impl FaultStatus {
    pub fn is_ok(&self) -> bool {
        *self == FaultStatus::Ok
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FaultStatus::Ok => "OK",
            FaultStatus::WarnHigh => "WARN_HIGH",
            FaultStatus::FaultHigh => "FAULT_HIGH",
            FaultStatus::FaultLow => "FAULT_LOW",
        }
    }
}

impl fmt::Display for FaultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status carried by a fault event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    WarnHigh,
    FaultHigh,
    FaultLow,
    Resolved,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::WarnHigh => "WARN_HIGH",
            EventStatus::FaultHigh => "FAULT_HIGH",
            EventStatus::FaultLow => "FAULT_LOW",
            EventStatus::Resolved => "RESOLVED",
        }
    }

    fn from_fault(status: FaultStatus) -> Option<Self> {
        match status {
            FaultStatus::Ok => None,
            FaultStatus::WarnHigh => Some(EventStatus::WarnHigh),
            FaultStatus::FaultHigh => Some(EventStatus::FaultHigh),
            FaultStatus::FaultLow => Some(EventStatus::FaultLow),
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discrete fault transition or heartbeat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultEvent {
    /// Threshold key of the signal
    pub signal: String,
    pub status: EventStatus,
    /// Value that triggered the event
    pub value: f64,
    pub source: Source,
    pub message: String,
    /// Evaluation time (seconds)
    pub timestamp: f64,
}

/// Per-signal monitor state
#[derive(Debug, Clone, PartialEq)]
pub struct SignalState {
    pub status: FaultStatus,
    pub last_status_change: f64,
    /// Last emission time per status
    pub last_emit: HashMap<FaultStatus, f64>,
}

impl SignalState {
    fn new(now: f64) -> Self {
        Self {
            status: FaultStatus::Ok,
            last_status_change: now,
            last_emit: HashMap::new(),
        }
    }
}

/// Result of evaluating one monitored reading
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Threshold key of the signal
    pub signal: String,
    /// Status after this reading
    pub status: FaultStatus,
    /// Event to publish, if any
    pub event: Option<FaultEvent>,
    /// Alarm flag value to publish, if any
    pub alarm: Option<bool>,
}

impl Evaluation {
    /// The synthetic `FAULT <signal>` reading for the alarm flag
    pub fn alarm_reading(&self) -> Option<Reading> {
        self.alarm.map(|active| {
            Reading::new(
                format!("{}{}", ALARM_PREFIX, self.signal),
                if active { 1.0 } else { 0.0 },
                "",
            )
        })
    }
}

/// Stateful threshold checker
pub struct FaultMonitor {
    config: MonitorConfig,
    states: HashMap<String, SignalState>,
}

impl FaultMonitor {
    pub fn new(mut config: MonitorConfig) -> Self {
        config.aliases = config
            .aliases
            .into_iter()
            .map(|(name, key)| (name.trim().to_lowercase(), key))
            .collect();

        Self {
            config,
            states: HashMap::new(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Threshold key for a raw reading name
    pub fn threshold_key(&self, name: &str) -> String {
        let name = name.trim();
        self.config
            .aliases
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Limits for a raw reading name; `None` means the signal is not monitored
    pub fn threshold(&self, name: &str) -> Option<(String, &FaultThreshold)> {
        let key = self.threshold_key(name);
        let threshold = self.config.thresholds.get(&key)?;
        Some((key, threshold))
    }

    /// Candidate status of a value and the message describing it
    pub fn classify(key: &str, threshold: &FaultThreshold, value: f64) -> (FaultStatus, String) {
        match (threshold.max, threshold.warn, threshold.min) {
            (Some(max), _, _) if value > max => (FaultStatus::FaultHigh, format!("{} > {}", key, max)),
            (_, Some(warn), _) if value >= warn => (FaultStatus::WarnHigh, format!("{} >= {}", key, warn)),
            (_, _, Some(min)) if value < min => (FaultStatus::FaultLow, format!("{} < {}", key, min)),
            _ => (FaultStatus::Ok, String::new()),
        }
    }

    /// Evaluate one reading at time `now` (seconds)
    ///
    /// Returns `None` when monitoring is disabled, the signal has no configured
    /// limits, or the value or `now` is not a finite number.
    pub fn evaluate(&mut self, reading: &Reading, source: Source, now: f64) -> Option<Evaluation> {
        if !self.config.enabled {
            return None;
        }

        let Some((key, threshold)) = self.threshold(&reading.name) else {
            log::trace!("No limits for '{}', not monitored", reading.name);
            return None;
        };
        if !reading.value.is_finite() {
            log::debug!("Skipping non-finite value for '{}'", key);
            return None;
        }
        if !now.is_finite() {
            log::warn!("Skipping '{}' evaluated at non-finite time", key);
            return None;
        }

        let (status, message) = Self::classify(&key, threshold, reading.value);
        let cooldown = self.config.cooldown_secs;

        let state = self
            .states
            .entry(key.clone())
            .or_insert_with(|| SignalState::new(now));
        let previous = state.status;

        let mut should_emit = status != previous;
        if !should_emit && !status.is_ok() {
            should_emit = match state.last_emit.get(&status) {
                Some(last) => now - last >= cooldown,
                None => true,
            };
        }

        let mut event = None;
        if should_emit {
            let (event_status, message) = match EventStatus::from_fault(status) {
                Some(event_status) => (event_status, message),
                None => (EventStatus::Resolved, format!("{} back to nominal", key)),
            };
            event = Some(FaultEvent {
                signal: key.clone(),
                status: event_status,
                value: reading.value,
                source,
                message,
                timestamp: now,
            });

            if status != previous {
                log::info!("{}: {} -> {} (value {})", key, previous, status, reading.value);
                state.last_status_change = now;
            }
            state.status = status;
            state.last_emit.insert(status, now);
        }

        let alarm = if status.is_ok() {
            Some(false)
        } else if should_emit {
            Some(true)
        } else {
            None
        };

        Some(Evaluation {
            signal: key,
            status,
            event,
            alarm,
        })
    }

    /// Evaluate every reading of a decoded frame
    pub fn evaluate_all(&mut self, readings: &[Reading], source: Source, now: f64) -> Vec<Evaluation> {
        readings
            .iter()
            .filter_map(|reading| self.evaluate(reading, source, now))
            .collect()
    }

    /// State of a signal by threshold key
    pub fn state(&self, key: &str) -> Option<&SignalState> {
        self.states.get(key)
    }

    /// Current status of a signal by threshold key (OK when never seen)
    pub fn status(&self, key: &str) -> FaultStatus {
        self.states.get(key).map(|s| s.status).unwrap_or_default()
    }

    /// Signals currently outside their limits, sorted by key
    pub fn active_faults(&self) -> Vec<(&str, FaultStatus)> {
        let mut active: Vec<(&str, FaultStatus)> = self
            .states
            .iter()
            .filter(|(_, state)| !state.status.is_ok())
            .map(|(key, state)| (key.as_str(), state.status))
            .collect();
        active.sort_unstable_by(|a, b| a.0.cmp(b.0));
        active
    }
}
