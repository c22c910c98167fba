//! JSON lines output
//!
//! One JSON object per line, the shape the dashboard ingests:
//!
//! ```text
//! {"ts":1711111111123,"source":"BMS","name":"DC Voltage","value":300.0,"unit":"V"}
//! {"ts":1711111111123,"kind":"fault_event","name":"Battery Temperature","status":"FAULT_HIGH","value":70.0,"source":"BMS","message":"Battery Temperature > 60","evaluated_at":1700000000.0}
//! ```
//!
//! `ts` is always the wall-clock publish time in milliseconds, for both row
//! kinds. Fault rows also carry `evaluated_at`, the monitor clock in seconds,
//! which is the frame timestamp when replaying captures.

use can_telemetry::{DispatchSink, EventStatus, FaultEvent, Reading, Source, TelemetryError};
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;

#[derive(Serialize)]
struct ReadingRow<'a> {
    ts: i64,
    source: Source,
    name: &'a str,
    value: f64,
    unit: &'a str,
}

#[derive(Serialize)]
struct FaultEventRow<'a> {
    ts: i64,
    kind: &'static str,
    name: &'a str,
    status: EventStatus,
    value: f64,
    source: Source,
    message: &'a str,
    evaluated_at: f64,
}

fn publish_time_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Writes readings and fault events as JSON lines
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(|e| e.into_inner())
    }

    fn write_row<T: Serialize>(&self, row: &T) -> can_telemetry::Result<()> {
        let line = serde_json::to_string(row).map_err(|e| TelemetryError::Sink(e.to_string()))?;

        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> DispatchSink for JsonLinesSink<W> {
    fn publish_reading(&self, reading: &Reading, source: Source) -> can_telemetry::Result<()> {
        self.write_row(&ReadingRow {
            ts: publish_time_ms(),
            source,
            name: &reading.name,
            value: reading.value,
            unit: &reading.unit,
        })
    }

    fn publish_fault_event(&self, event: &FaultEvent) -> can_telemetry::Result<()> {
        self.write_row(&FaultEventRow {
            ts: publish_time_ms(),
            kind: "fault_event",
            name: &event.signal,
            status: event.status,
            value: event.value,
            source: event.source,
            message: &event.message,
            evaluated_at: event.timestamp,
        })
    }
}
