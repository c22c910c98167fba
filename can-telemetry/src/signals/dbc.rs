//! DBC file parser
//!
//! Parses Vector DBC files and converts them into the layout database format.

use crate::signals::database::{ByteOrder, MessageLayout, SignalLayout, ValueType};
use crate::types::{Result, TelemetryError};
use std::path::Path;

/// Parse a DBC file and return message layouts
pub fn parse_dbc_file(path: &Path) -> Result<Vec<MessageLayout>> {
    log::info!("Parsing DBC file: {:?}", path);

    // Read the DBC file as bytes first (handle non-UTF8 encodings)
    let bytes = std::fs::read(path).map_err(|e| {
        TelemetryError::LayoutParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    let dbc_content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            // Latin-1 maps every byte to the code point of the same value
            log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    let source_filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc");

    let messages = parse_dbc_str(&dbc_content, source_filename)?;

    log::info!("Parsed {} messages from {:?}", messages.len(), path);

    Ok(messages)
}

/// Parse DBC text; `source` is recorded on every layout
pub fn parse_dbc_str(dbc_content: &str, source: &str) -> Result<Vec<MessageLayout>> {
    let dbc = can_dbc::DBC::from_slice(dbc_content.as_bytes()).map_err(|e| {
        TelemetryError::LayoutParseError(format!("Failed to parse DBC {}: {:?}", source, e))
    })?;

    Ok(dbc
        .messages()
        .iter()
        .map(|dbc_msg| convert_message(dbc_msg, source))
        .collect())
}

/// Convert a can-dbc message to our MessageLayout
fn convert_message(dbc_msg: &can_dbc::Message, source: &str) -> MessageLayout {
    MessageLayout {
        id: dbc_msg.message_id().0,
        name: dbc_msg.message_name().to_string(),
        size: *dbc_msg.message_size() as usize,
        sender: match dbc_msg.transmitter() {
            can_dbc::Transmitter::NodeName(name) => Some(name.to_string()),
            _ => None,
        },
        signals: dbc_msg.signals().iter().map(convert_signal).collect(),
        source: source.to_string(),
    }
}

/// Convert a can-dbc signal to our SignalLayout
fn convert_signal(dbc_sig: &can_dbc::Signal) -> SignalLayout {
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    SignalLayout {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        bit_width: *dbc_sig.signal_size() as u16,
        byte_order,
        value_type,
        scale: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        min: *dbc_sig.min(),
        max: *dbc_sig.max(),
        unit: dbc_sig.unit().to_string(),
    }
}
