//! Dispatch sink contract
//!
//! The sink is where decoded readings and fault events leave the core. Both
//! operations may fail (the sink owns the transport); the pipeline logs such
//! failures and keeps processing frames.

use crate::monitor::FaultEvent;
use crate::types::{Reading, Result, Source};
use std::sync::Mutex;

/// Receiver of published readings and fault events
pub trait DispatchSink: Send + Sync {
    /// Publish one reading under a source label
    fn publish_reading(&self, reading: &Reading, source: Source) -> Result<()>;

    /// Publish one fault event
    fn publish_fault_event(&self, event: &FaultEvent) -> Result<()>;
}

/// Normalise a unit for publishing
///
/// Temperature units arrive as "°C", "C" or "c" depending on the decoder and are
/// published as "degC". Everything else is passed through trimmed.
pub fn normalize_unit(unit: &str) -> String {
    let unit = unit.trim();
    match unit.to_lowercase().as_str() {
        "c" | "°c" | "degc" => "degC".to_string(),
        _ => unit.to_string(),
    }
}

/// Something published to a [`MemorySink`]
#[derive(Debug, Clone, PartialEq)]
pub enum Published {
    Reading { reading: Reading, source: Source },
    FaultEvent(FaultEvent),
}

/// Sink that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    items: Mutex<Vec<Published>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, in order
    pub fn items(&self) -> Vec<Published> {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Published readings with their source labels
    pub fn readings(&self) -> Vec<(Reading, Source)> {
        self.items()
            .into_iter()
            .filter_map(|item| match item {
                Published::Reading { reading, source } => Some((reading, source)),
                Published::FaultEvent(_) => None,
            })
            .collect()
    }

    /// Published readings with the given name
    pub fn readings_named(&self, name: &str) -> Vec<Reading> {
        self.readings()
            .into_iter()
            .map(|(reading, _)| reading)
            .filter(|reading| reading.name == name)
            .collect()
    }

    /// Published fault events
    pub fn fault_events(&self) -> Vec<FaultEvent> {
        self.items()
            .into_iter()
            .filter_map(|item| match item {
                Published::FaultEvent(event) => Some(event),
                Published::Reading { .. } => None,
            })
            .collect()
    }

    /// Drop everything collected so far
    pub fn clear(&self) {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn push(&self, item: Published) {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).push(item);
    }
}

impl DispatchSink for MemorySink {
    fn publish_reading(&self, reading: &Reading, source: Source) -> Result<()> {
        self.push(Published::Reading {
            reading: reading.clone(),
            source,
        });
        Ok(())
    }

    fn publish_fault_event(&self, event: &FaultEvent) -> Result<()> {
        self.push(Published::FaultEvent(event.clone()));
        Ok(())
    }
}
