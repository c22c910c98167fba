//! Motor controller PDO decoding
//!
//! The motor controller broadcasts four transmit PDOs. Each has a fixed layout of
//! little-endian fields; PDO3 and PDO4 come in a short and a long variant that
//! differ in their last field. The layouts are registered in the layout database
//! under their CAN IDs, one [`MessageLayout`] per payload length.

use crate::codec;
use crate::messages::MessageKind;
use crate::signals::{MessageLayout, SignalLayout};
use crate::types::{Reading, Result, TelemetryError};

use crate::signals::ValueType::{Signed, Unsigned};

const BUILTIN_SOURCE: &str = "builtin";

fn layout(kind: MessageKind, size: usize, signals: Vec<SignalLayout>) -> MessageLayout {
    MessageLayout {
        id: kind.id(),
        name: format!("{} ({} bytes)", kind, size),
        size,
        sender: Some("MC".to_string()),
        signals,
        source: BUILTIN_SOURCE.to_string(),
    }
}

/// Fixed layouts of every PDO variant
pub fn builtin_layouts() -> Vec<MessageLayout> {
    let pdo3_common = || {
        vec![
            SignalLayout::le_bytes("motor current actual", 0..2, Signed, "A"),
            SignalLayout::le_bytes("electrical angle", 2..4, Signed, ""),
            SignalLayout::le_bytes("phase a current", 4..6, Signed, "A"),
        ]
    };
    let pdo4_common = || {
        vec![
            SignalLayout::le_bytes("torque regulator", 0..2, Signed, ""),
            SignalLayout::le_bytes("flux regulator count", 2..4, Signed, ""),
        ]
    };

    let mut pdo3_long = pdo3_common();
    pdo3_long.push(SignalLayout::le_bytes("phase b current", 6..8, Signed, "A"));

    let mut pdo4_short = pdo4_common();
    pdo4_short.push(SignalLayout::le_bytes("velocity actual value", 4..6, Signed, ""));

    let mut pdo4_long = pdo4_common();
    pdo4_long.push(SignalLayout::le_bytes("velocity actual value", 4..8, Signed, ""));

    vec![
        layout(
            MessageKind::MotorPdo1,
            8,
            vec![
                SignalLayout::le_bytes("status word", 0..2, Unsigned, ""),
                SignalLayout::le_bytes("position actual", 2..6, Signed, ""),
                SignalLayout::le_bytes("torque actual", 6..8, Signed, ""),
            ],
        ),
        layout(
            MessageKind::MotorPdo2,
            8,
            vec![
                SignalLayout::le_bytes("controller temp", 0..1, Signed, "°C"),
                SignalLayout::le_bytes("motor temp", 1..2, Unsigned, "°C"),
                SignalLayout::le_bytes("DC link circuit voltage", 2..4, Signed, "V"),
                SignalLayout::le_bytes("logic power supply voltage", 4..6, Signed, "V"),
                SignalLayout::le_bytes("current demand", 6..8, Signed, "A"),
            ],
        ),
        layout(MessageKind::MotorPdo3, 6, pdo3_common()),
        layout(MessageKind::MotorPdo3, 8, pdo3_long),
        layout(MessageKind::MotorPdo4, 7, pdo4_short),
        layout(MessageKind::MotorPdo4, 8, pdo4_long),
    ]
}

/// Decode a PDO payload against the variants registered for its kind
///
/// The variant is chosen by payload length. A length that matches no variant is
/// rejected outright rather than decoded into garbage.
pub fn decode_pdo(kind: MessageKind, variants: &[MessageLayout], payload: &[u8]) -> Result<Vec<Reading>> {
    let layout = variants.iter().find(|v| v.size == payload.len()).ok_or_else(|| {
        let expected: Vec<usize> = variants.iter().map(|v| v.size).collect();
        TelemetryError::out_of_range(
            kind.to_string(),
            format!("payload is {} bytes, expected one of {:?}", payload.len(), expected),
        )
    })?;

    layout
        .signals
        .iter()
        .map(|signal| {
            let value = codec::decode_signal(payload, signal)?;
            Ok(Reading::new(signal.name.clone(), value, signal.unit.clone()))
        })
        .collect()
}
