//! Core types for the CAN telemetry library
//!
//! This module defines the frames, readings and errors shared by the tokenizer,
//! the decoders, the fault monitor and the dispatch sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::messages::MessageKind;

/// Timestamp type used for wall-clock conversions
pub type Timestamp = DateTime<Utc>;

/// Result type for telemetry operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Raw CAN frame as captured from the bus and transmitted as text
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    /// Capture timestamp in (fractional) seconds since epoch
    pub timestamp: f64,
    /// CAN message ID
    pub id: u32,
    /// Data length code
    pub data_length: u8,
    /// Payload bytes, always `data_length` long
    pub payload: Vec<u8>,
    /// Tokens following the payload (channel, checksum...), kept opaque
    pub trailer: Vec<String>,
}

impl RawFrame {
    /// Convert the capture timestamp to DateTime<Utc>
    pub fn timestamp(&self) -> Timestamp {
        let secs = self.timestamp.floor();
        let nsecs = ((self.timestamp - secs) * 1_000_000_000.0) as u32;
        DateTime::from_timestamp(secs as i64, nsecs).unwrap_or_else(Utc::now)
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.payload.len()
    }
}

/// Errors that can occur while decoding and monitoring frames
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Signal '{signal}' out of range: {reason}")]
    SignalOutOfRange { signal: String, reason: String },

    #[error("Unknown message ID: 0x{0:03X}")]
    UnknownMessageId(u32),

    #[error("Failed to parse message layout: {0}")]
    LayoutParseError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TelemetryError {
    pub(crate) fn out_of_range(signal: impl Into<String>, reason: impl Into<String>) -> Self {
        TelemetryError::SignalOutOfRange {
            signal: signal.into(),
            reason: reason.into(),
        }
    }
}

/// A decoded, unit-tagged engineering value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Human readable signal name (e.g. "Battery Voltage")
    pub name: String,
    /// Engineering value after scaling
    pub value: f64,
    /// Engineering unit (e.g. "A", "V", "°C"), empty when unitless
    pub unit: String,
    /// Full-scale value hint for gauges
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Reading {
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
            max: None,
        }
    }

    /// Builder method: attach a full-scale value
    pub fn with_max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{} = {}", self.name, self.value)
        } else {
            write!(f, "{} = {} {}", self.name, self.value, self.unit)
        }
    }
}

/// Label attached to everything handed to a dispatch sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
    /// Battery management system
    Bms,
    /// Motor controller
    Mc,
    /// Synthetic alarm flags raised by the fault monitor
    Fault,
    /// Bridge health (watchdog)
    Bridge,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Bms => "BMS",
            Source::Mc => "MC",
            Source::Fault => "FAULT",
            Source::Bridge => "BRIDGE",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of a frame decoder: readings in layout order plus when they were decoded
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// Capture timestamp of the source frame (seconds since epoch)
    pub timestamp: f64,
    /// CAN message ID
    pub id: u32,
    /// Message kind the frame was routed to
    pub kind: MessageKind,
    /// Decoded readings, in the decoder's fixed order
    pub readings: Vec<Reading>,
}

impl DecodedFrame {
    /// Find a reading by name
    pub fn reading(&self, name: &str) -> Option<&Reading> {
        self.readings.iter().find(|r| r.name == name)
    }
}
