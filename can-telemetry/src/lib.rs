//! CAN Telemetry Library
//!
//! Decodes raw CAN frames from an electric vehicle's battery management system
//! (BMS) and motor controller (MC) into named engineering readings, and watches
//! those readings for fault conditions.
//!
//! # Architecture
//!
//! Each frame of text flows through a fixed sequence of stages:
//! - [`frame::tokenize`] splits the text into a [`RawFrame`]
//! - [`Decoder`] routes it by ID to the BMS or MC decoder, which extract
//!   readings with the [`codec`] and the layouts from the [`signals`] database
//! - [`FaultMonitor`] checks each reading against its limits with hysteresis and
//!   a per-status cooldown
//! - a [`DispatchSink`] receives readings, fault events and alarm flags
//!
//! [`Pipeline`] wires the stages together and owns all mutable state. A
//! [`Watchdog`] thread reports when frames stop arriving.
//!
//! Transport (bus subscription, message broker, persistence) lives outside this
//! library, behind the sink.
//!
//! # Example Usage
//!
//! ```no_run
//! use can_telemetry::{Decoder, MemorySink, Pipeline, PipelineConfig};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let config = PipelineConfig::new();
//!
//! // Load the BMS message layout
//! let mut decoder = Decoder::with_bms_config(&config.bms);
//! decoder.add_dbc(Path::new("dbc/bms.dbc")).unwrap();
//!
//! let sink = Arc::new(MemorySink::new());
//! let mut pipeline = Pipeline::new(config, decoder, sink.clone()).unwrap();
//!
//! pipeline.handle_line(
//!     "Timestamp: 1711111111.123456 ID: 0281 S Rx DL: 8 1e 28 50 01 0c 00 0a 00 Channel: can0",
//! );
//!
//! for (reading, source) in sink.readings() {
//!     println!("[{}] {}", source, reading);
//! }
//! ```

// Public modules
pub mod codec;
pub mod config;
pub mod decoder;
pub mod frame;
pub mod messages;
pub mod monitor;
pub mod pipeline;
pub mod signals;
pub mod sink;
pub mod types;
pub mod watchdog;

// Re-export main types for convenience
pub use config::{BmsConfig, FaultThreshold, MonitorConfig, PipelineConfig, TimeSource, WatchdogConfig};
pub use decoder::Decoder;
pub use messages::MessageKind;
pub use monitor::{EventStatus, Evaluation, FaultEvent, FaultMonitor, FaultStatus};
pub use pipeline::{FrameOutcome, Pipeline, PipelineStats};
pub use signals::DatabaseStats;
pub use sink::{DispatchSink, MemorySink};
pub use types::{DecodedFrame, RawFrame, Reading, Result, Source, TelemetryError, Timestamp};
pub use watchdog::Watchdog;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
