//! Per-frame processing
//!
//! The pipeline wires the stages together for one frame of text:
//! tokenize → feed watchdog → decode → publish readings → evaluate faults →
//! publish events and alarm flags. No failure of any stage escapes
//! [`Pipeline::handle_line`]; each is counted, logged and reported in the
//! returned [`FrameOutcome`].

use crate::config::{PipelineConfig, TimeSource};
use crate::decoder::Decoder;
use crate::frame;
use crate::messages::MessageKind;
use crate::monitor::{FaultEvent, FaultMonitor};
use crate::sink::{normalize_unit, DispatchSink};
use crate::types::{RawFrame, Reading, Result, Source, TelemetryError};
use crate::watchdog::Watchdog;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Name of the reading published when the watchdog fires or clears
pub const BRIDGE_IDLE: &str = "Bridge Idle";

/// What happened to one frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Decoded and published
    Decoded {
        kind: MessageKind,
        readings: usize,
        events: usize,
    },
    /// Valid frame with an ID this bridge does not decode
    Ignored { id: u32 },
    /// Malformed text or an undecodable payload
    Rejected { reason: String },
}

/// Running counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub frames_seen: u64,
    pub decoded: u64,
    pub ignored: u64,
    pub rejected: u64,
    pub readings_published: u64,
    pub fault_events: u64,
    pub sink_errors: u64,
}

/// Decode-and-monitor pipeline
pub struct Pipeline {
    config: PipelineConfig,
    decoder: Decoder,
    monitor: FaultMonitor,
    sink: Arc<dyn DispatchSink>,
    watchdog: Option<Watchdog>,
    stats: PipelineStats,
}

impl Pipeline {
    /// Build a pipeline around a prepared decoder
    ///
    /// The decoder should already hold its layouts (see [`Decoder::add_dbc`])
    /// and be built with `config.bms`. A non-zero watchdog timeout starts the
    /// watchdog thread.
    pub fn new(config: PipelineConfig, decoder: Decoder, sink: Arc<dyn DispatchSink>) -> Result<Self> {
        config.validate()?;

        let watchdog = match config.watchdog.timeout_secs {
            0 => None,
            secs => {
                let idle_sink = Arc::clone(&sink);
                Some(Watchdog::spawn(Duration::from_secs(secs), move || {
                    let reading = Reading::new(BRIDGE_IDLE, 1.0, "");
                    if let Err(e) = idle_sink.publish_reading(&reading, Source::Bridge) {
                        log::warn!("Failed to publish idle state: {}", e);
                    }
                })?)
            }
        };

        if !decoder.has_bms_layout() {
            log::warn!("No BMS layout loaded, BMS frames will be ignored");
        }

        Ok(Self {
            monitor: FaultMonitor::new(config.monitor.clone()),
            config,
            decoder,
            sink,
            watchdog,
            stats: PipelineStats::default(),
        })
    }

    /// Process one frame line, timing cooldowns with the configured clock
    pub fn handle_line(&mut self, line: &str) -> FrameOutcome {
        self.handle(line, None)
    }

    /// Process one frame line at an explicit time (seconds)
    pub fn handle_line_at(&mut self, line: &str, now: f64) -> FrameOutcome {
        self.handle(line, Some(now))
    }

    fn handle(&mut self, line: &str, now: Option<f64>) -> FrameOutcome {
        self.stats.frames_seen += 1;

        let frame = match frame::tokenize(line) {
            Ok(frame) => frame,
            Err(e) => {
                log::debug!("Dropping frame: {}", e);
                self.stats.rejected += 1;
                return FrameOutcome::Rejected { reason: e.to_string() };
            }
        };

        self.feed_watchdog();

        let now = now.unwrap_or_else(|| self.clock(&frame));
        self.process(&frame, now)
    }

    /// Process an already tokenized frame at time `now` (seconds)
    pub fn process(&mut self, frame: &RawFrame, now: f64) -> FrameOutcome {
        let decoded = match self.decoder.decode(frame) {
            Ok(decoded) => decoded,
            Err(TelemetryError::UnknownMessageId(id)) => {
                log::trace!("Ignoring frame with ID 0x{:03X}", id);
                self.stats.ignored += 1;
                return FrameOutcome::Ignored { id };
            }
            Err(e) => {
                log::warn!("Rejected frame 0x{:03X}: {}", frame.id, e);
                self.stats.rejected += 1;
                return FrameOutcome::Rejected { reason: e.to_string() };
            }
        };

        let source = decoded.kind.source();
        let mut events = 0;

        for reading in &decoded.readings {
            self.publish_reading(reading, source);

            let Some(evaluation) = self.monitor.evaluate(reading, source, now) else {
                continue;
            };
            if let Some(event) = &evaluation.event {
                self.publish_fault_event(event);
                events += 1;
            }
            if let Some(alarm) = evaluation.alarm_reading() {
                self.publish_reading(&alarm, Source::Fault);
            }
        }

        self.stats.decoded += 1;
        log::debug!(
            "{} at {:.3}: {} readings, {} fault events",
            decoded.kind,
            decoded.timestamp,
            decoded.readings.len(),
            events
        );

        FrameOutcome::Decoded {
            kind: decoded.kind,
            readings: decoded.readings.len(),
            events,
        }
    }

    fn clock(&self, frame: &RawFrame) -> f64 {
        match self.config.time_source {
            TimeSource::Wall => chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
            TimeSource::Frame => frame.timestamp,
        }
    }

    fn feed_watchdog(&mut self) {
        let resumed = self.watchdog.as_ref().map(|w| w.feed()).unwrap_or(false);
        if resumed {
            let reading = Reading::new(BRIDGE_IDLE, 0.0, "");
            self.publish_reading(&reading, Source::Bridge);
        }
    }

    fn publish_reading(&mut self, reading: &Reading, source: Source) {
        let published = Reading {
            name: self.config.display_name(&reading.name),
            unit: normalize_unit(&reading.unit),
            ..reading.clone()
        };

        match self.sink.publish_reading(&published, source) {
            Ok(()) => self.stats.readings_published += 1,
            Err(e) => {
                log::warn!("Failed to publish '{}': {}", published.name, e);
                self.stats.sink_errors += 1;
            }
        }
    }

    fn publish_fault_event(&mut self, event: &FaultEvent) {
        log::info!("[{}] {}: {} (value {})", event.source, event.status, event.message, event.value);

        match self.sink.publish_fault_event(event) {
            Ok(()) => self.stats.fault_events += 1,
            Err(e) => {
                log::warn!("Failed to publish fault event for '{}': {}", event.signal, e);
                self.stats.sink_errors += 1;
            }
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn monitor(&self) -> &FaultMonitor {
        &self.monitor
    }

    /// Whether the watchdog currently reports the bridge idle
    pub fn is_idle(&self) -> bool {
        self.watchdog.as_ref().map(|w| w.is_idle()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{EventStatus, FaultStatus};
    use crate::sink::MemorySink;

    const BMS_DBC: &str = include_str!("../../dbc/bms.dbc");

    // 50.0 A, 300.0 V, 80 %, 70 °C, 75 A DCL
    const HOT_BMS: &str =
        "Timestamp: 1700000000.000000    ID: 004d    S Rx    DL:  8    f4 01 b8 0b 6a b4 04 00    Channel: can0";

    fn pipeline(config: PipelineConfig) -> (Pipeline, Arc<MemorySink>) {
        let mut decoder = Decoder::with_bms_config(&config.bms);
        decoder.add_dbc_str(BMS_DBC, "bms.dbc").unwrap();
        let sink = Arc::new(MemorySink::new());
        let pipeline = Pipeline::new(config, decoder, sink.clone()).unwrap();
        (pipeline, sink)
    }

    #[test]
    fn test_bms_frame_publishes_readings_and_fault() {
        let (mut pipeline, sink) = pipeline(PipelineConfig::default());
        let outcome = pipeline.handle_line_at(HOT_BMS, 0.0);

        assert_eq!(
            outcome,
            FrameOutcome::Decoded {
                kind: MessageKind::Bms,
                readings: 8,
                events: 1
            }
        );

        let temperature = &sink.readings_named("Battery Temperature")[0];
        assert_eq!(temperature.value, 70.0);
        assert_eq!(temperature.unit, "degC");
        assert_eq!(sink.readings_named("DC Voltage")[0].value, 300.0);
        assert_eq!(sink.readings_named("SoC")[0].value, 80.0);

        let events = sink.fault_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].signal, "Battery Temperature");
        assert_eq!(events[0].status, EventStatus::FaultHigh);
        assert_eq!(events[0].message, "Battery Temperature > 60");

        assert_eq!(sink.readings_named("FAULT Battery Temperature")[0].value, 1.0);
        assert_eq!(sink.readings_named("FAULT Battery Voltage")[0].value, 0.0);
        assert_eq!(pipeline.monitor().status("Battery Temperature"), FaultStatus::FaultHigh);
    }

    #[test]
    fn test_failures_do_not_stop_processing() {
        let (mut pipeline, sink) = pipeline(PipelineConfig::default());

        let malformed = pipeline.handle_line_at("Timestamp: 1.0 ID: 0181 S Rx DL: 8 01 02", 0.0);
        assert!(matches!(malformed, FrameOutcome::Rejected { .. }));

        let unknown = pipeline.handle_line_at("Timestamp: 1.0 ID: 0701 S Rx DL: 1 05 Channel: can0", 0.0);
        assert_eq!(unknown, FrameOutcome::Ignored { id: 0x701 });

        let short_pdo = pipeline.handle_line_at("Timestamp: 1.0 ID: 0281 S Rx DL: 3 01 02 03", 0.0);
        assert!(matches!(short_pdo, FrameOutcome::Rejected { .. }));

        let outcome = pipeline.handle_line_at(HOT_BMS, 0.0);
        assert!(matches!(outcome, FrameOutcome::Decoded { .. }));

        let stats = pipeline.stats();
        assert_eq!(stats.frames_seen, 4);
        assert_eq!(stats.rejected, 2);
        assert_eq!(stats.ignored, 1);
        assert_eq!(stats.decoded, 1);
        assert_eq!(stats.fault_events, 1);
        assert_eq!(stats.readings_published as usize, sink.readings().len());
    }

    #[test]
    fn test_frame_time_source() {
        let config = PipelineConfig::default().with_time_source(TimeSource::Frame);
        let (mut pipeline, sink) = pipeline(config);

        pipeline.handle_line(HOT_BMS);
        pipeline.handle_line(&HOT_BMS.replace("1700000000.000000", "1700000002.000000"));
        assert_eq!(sink.fault_events().len(), 1);

        pipeline.handle_line(&HOT_BMS.replace("1700000000.000000", "1700000006.000000"));
        let events = sink.fault_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].timestamp, 1_700_000_006.0);
    }

    struct FailingSink;

    impl DispatchSink for FailingSink {
        fn publish_reading(&self, _: &Reading, _: Source) -> Result<()> {
            Err(TelemetryError::Sink("broker unreachable".to_string()))
        }

        fn publish_fault_event(&self, _: &FaultEvent) -> Result<()> {
            Err(TelemetryError::Sink("broker unreachable".to_string()))
        }
    }

    #[test]
    fn test_sink_failures_are_counted() {
        let mut decoder = Decoder::new();
        decoder.add_dbc_str(BMS_DBC, "bms.dbc").unwrap();
        let mut pipeline = Pipeline::new(PipelineConfig::default(), decoder, Arc::new(FailingSink)).unwrap();

        assert!(matches!(pipeline.handle_line_at(HOT_BMS, 0.0), FrameOutcome::Decoded { .. }));
        assert!(matches!(pipeline.handle_line_at(HOT_BMS, 10.0), FrameOutcome::Decoded { .. }));

        let stats = pipeline.stats();
        assert_eq!(stats.decoded, 2);
        assert_eq!(stats.readings_published, 0);
        assert!(stats.sink_errors > 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = PipelineConfig::default();
        config.monitor.cooldown_secs = -1.0;
        let result = Pipeline::new(config, Decoder::new(), Arc::new(MemorySink::new()));
        assert!(matches!(result, Err(TelemetryError::InvalidConfig(_))));
    }
}
