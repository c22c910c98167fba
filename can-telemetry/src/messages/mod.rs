//! Message kinds and their decoders
//!
//! Every frame is routed exactly once, from its parsed numeric ID, to one of the
//! kinds below. Frames with any other ID are bus traffic this bridge does not
//! care about.

pub mod bms;
pub mod motor;

use crate::types::Source;
use std::fmt;

/// The messages this bridge decodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// BMS pack summary
    Bms,
    /// Motor controller transmit PDO 1 (status word, position, torque)
    MotorPdo1,
    /// Motor controller transmit PDO 2 (temperatures, voltages, current demand)
    MotorPdo2,
    /// Motor controller transmit PDO 3 (currents, electrical angle)
    MotorPdo3,
    /// Motor controller transmit PDO 4 (regulators, velocity)
    MotorPdo4,
}

/// Routing table: CAN ID → message kind
const ROUTES: [(u32, MessageKind); 5] = [
    (bms::BMS_MESSAGE_ID, MessageKind::Bms),
    (0x181, MessageKind::MotorPdo1),
    (0x281, MessageKind::MotorPdo2),
    (0x381, MessageKind::MotorPdo3),
    (0x481, MessageKind::MotorPdo4),
];

impl MessageKind {
    /// Look up the kind for a CAN ID
    pub fn from_id(id: u32) -> Option<Self> {
        ROUTES.iter().find(|(route_id, _)| *route_id == id).map(|(_, kind)| *kind)
    }

    /// CAN ID carrying this kind
    pub fn id(&self) -> u32 {
        ROUTES
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(id, _)| *id)
            .unwrap_or_default()
    }

    /// Label used when publishing this kind's readings
    pub fn source(&self) -> Source {
        match self {
            MessageKind::Bms => Source::Bms,
            _ => Source::Mc,
        }
    }

    /// PDO index for motor controller kinds
    pub fn pdo_number(&self) -> Option<u8> {
        match self {
            MessageKind::Bms => None,
            MessageKind::MotorPdo1 => Some(1),
            MessageKind::MotorPdo2 => Some(2),
            MessageKind::MotorPdo3 => Some(3),
            MessageKind::MotorPdo4 => Some(4),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pdo_number() {
            Some(pdo) => write!(f, "MC PDO{}", pdo),
            None => write!(f, "BMS"),
        }
    }
}
