//! Message layout database
//!
//! Holds the byte/bit layouts of the messages this bridge understands. Layouts are
//! loaded once (from DBC files or the built-in motor controller tables) and are
//! read-only afterwards.

use std::collections::HashMap;
use std::ops::Range;

/// A complete CAN message layout
#[derive(Debug, Clone)]
pub struct MessageLayout {
    /// CAN message ID
    pub id: u32,
    /// Message name
    pub name: String,
    /// Message size in bytes
    pub size: usize,
    /// Sender ECU name (optional)
    pub sender: Option<String>,
    /// All signals in this message
    pub signals: Vec<SignalLayout>,
    /// Source file (DBC filename) or "builtin"
    pub source: String,
}

impl MessageLayout {
    /// Find a signal layout by name
    pub fn signal(&self, name: &str) -> Option<&SignalLayout> {
        self.signals.iter().find(|s| s.name == name)
    }
}

/// Placement and conversion of one signal inside a payload
#[derive(Debug, Clone, PartialEq)]
pub struct SignalLayout {
    /// Signal name
    pub name: String,
    /// Start bit in the payload (LSB for Intel, MSB for Motorola numbering)
    pub start_bit: u16,
    /// Length in bits
    pub bit_width: u16,
    /// Byte order
    pub byte_order: ByteOrder,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub scale: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Minimum physical value
    pub min: f64,
    /// Maximum physical value
    pub max: f64,
    /// Engineering unit, empty when unitless
    pub unit: String,
}

impl SignalLayout {
    /// Layout of a byte-aligned little-endian field with no scaling
    pub fn le_bytes(name: impl Into<String>, bytes: Range<usize>, value_type: ValueType, unit: impl Into<String>) -> Self {
        let bit_width = (bytes.len() * 8) as u16;
        let (min, max) = match value_type {
            ValueType::Signed => (-(2f64.powi(bit_width as i32 - 1)), 2f64.powi(bit_width as i32 - 1) - 1.0),
            ValueType::Unsigned => (0.0, 2f64.powi(bit_width as i32) - 1.0),
        };
        Self {
            name: name.into(),
            start_bit: (bytes.start * 8) as u16,
            bit_width,
            byte_order: ByteOrder::LittleEndian,
            value_type,
            scale: 1.0,
            offset: 0.0,
            min,
            max,
            unit: unit.into(),
        }
    }

    /// Whether a physical value lies inside the declared range
    ///
    /// A range of `[0|0]` is the DBC convention for "not specified" and accepts
    /// every value. Bounds are widened by half a scale step to absorb float
    /// error in `raw * scale + offset`.
    pub fn in_range(&self, value: f64) -> bool {
        if self.min == 0.0 && self.max == 0.0 {
            return true;
        }
        let slack = self.scale.abs() / 2.0;
        value >= self.min - slack && value <= self.max + slack
    }

    /// Byte range covered by the signal, if it is byte aligned
    ///
    /// Only Intel layouts qualify: a Motorola start bit names the MSB, so its byte
    /// range cannot be read off the start bit directly.
    pub fn byte_range(&self) -> Option<Range<usize>> {
        if self.byte_order != ByteOrder::LittleEndian || self.start_bit % 8 != 0 || self.bit_width % 8 != 0 {
            return None;
        }
        let start = (self.start_bit / 8) as usize;
        Some(start..start + (self.bit_width / 8) as usize)
    }
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Two's-complement signed integer
    Signed,
    /// Unsigned integer
    Unsigned,
}

/// The layout database
pub struct LayoutDatabase {
    /// Key: CAN ID, Value: layouts with that ID (can be multiple from different DBCs)
    messages: HashMap<u32, Vec<MessageLayout>>,
}

impl LayoutDatabase {
    /// Create a new empty database
    pub fn new() -> Self {
        Self {
            messages: HashMap::new(),
        }
    }

    /// Add a message layout to the database
    pub fn add_message(&mut self, message: MessageLayout) {
        self.messages.entry(message.id).or_default().push(message);
    }

    /// Get all layouts registered for a given CAN ID
    pub fn get_messages(&self, can_id: u32) -> &[MessageLayout] {
        self.messages.get(&can_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Get a specific message layout (first one found for given CAN ID)
    pub fn get_message(&self, can_id: u32) -> Option<&MessageLayout> {
        self.messages.get(&can_id).and_then(|msgs| msgs.first())
    }

    /// Get database statistics
    pub fn stats(&self) -> DatabaseStats {
        let num_messages: usize = self.messages.values().map(|v| v.len()).sum();
        let num_signals: usize = self
            .messages
            .values()
            .flat_map(|msgs| msgs.iter())
            .map(|msg| msg.signals.len())
            .sum();

        DatabaseStats {
            num_messages,
            num_signals,
        }
    }
}

/// Database statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message layouts
    pub num_messages: usize,
    /// Total number of signal layouts
    pub num_signals: usize,
}

impl Default for LayoutDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_database() {
        let db = LayoutDatabase::new();
        let stats = db.stats();
        assert_eq!(stats.num_messages, 0);
        assert_eq!(stats.num_signals, 0);
    }

    #[test]
    fn test_add_message() {
        let mut db = LayoutDatabase::new();

        let message = MessageLayout {
            id: 0x4D,
            name: "BMS_Pack_Status".to_string(),
            size: 8,
            sender: Some("BMS".to_string()),
            signals: vec![SignalLayout::le_bytes("Pack_Current", 0..2, ValueType::Signed, "A")],
            source: "test.dbc".to_string(),
        };

        db.add_message(message);

        let stats = db.stats();
        assert_eq!(stats.num_messages, 1);
        assert_eq!(stats.num_signals, 1);

        let msg = db.get_message(0x4D).unwrap();
        assert_eq!(msg.name, "BMS_Pack_Status");
        assert!(msg.signal("Pack_Current").is_some());
        assert_eq!(db.get_messages(0x4D).len(), 1);
        assert!(db.get_messages(0x181).is_empty());
    }

    #[test]
    fn test_le_bytes_layout() {
        let sig = SignalLayout::le_bytes("position actual", 2..6, ValueType::Signed, "");
        assert_eq!(sig.start_bit, 16);
        assert_eq!(sig.bit_width, 32);
        assert_eq!(sig.byte_range(), Some(2..6));
        assert_eq!(sig.min, -2147483648.0);
        assert_eq!(sig.max, 2147483647.0);
    }

    #[test]
    fn test_declared_range() {
        let sig = SignalLayout::le_bytes("motor temp", 1..2, ValueType::Unsigned, "°C");
        assert!(sig.in_range(0.0));
        assert!(sig.in_range(255.0));
        assert!(!sig.in_range(256.0));
        assert!(!sig.in_range(-1.0));

        let mut unspecified = sig.clone();
        unspecified.min = 0.0;
        unspecified.max = 0.0;
        assert!(unspecified.in_range(1e6));

        // 32767 * 0.1 lands just above the declared 3276.7
        let mut current = SignalLayout::le_bytes("Pack_Current", 0..2, ValueType::Signed, "A");
        current.scale = 0.1;
        current.min = -3276.8;
        current.max = 3276.7;
        assert!(current.in_range(32767.0 * 0.1));
        assert!(current.in_range(-32768.0 * 0.1));
        assert!(!current.in_range(3277.0));
    }

    #[test]
    fn test_unaligned_layout_has_no_byte_range() {
        let mut sig = SignalLayout::le_bytes("Pack_SOC", 3..4, ValueType::Unsigned, "%");
        sig.start_bit = 28;
        assert_eq!(sig.byte_range(), None);

        let mut motorola = SignalLayout::le_bytes("Speed", 0..2, ValueType::Unsigned, "");
        motorola.byte_order = ByteOrder::BigEndian;
        assert_eq!(motorola.byte_range(), None);
    }
}
