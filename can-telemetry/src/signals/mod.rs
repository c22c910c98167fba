//! Message layouts and the DBC loader
//!
//! This module contains the layout database consumed by the frame decoders and
//! the DBC parser that fills it.

pub mod database;
pub mod dbc;

// Re-export key types for convenience
pub use database::{
    ByteOrder, DatabaseStats, LayoutDatabase, MessageLayout, SignalLayout, ValueType,
};
