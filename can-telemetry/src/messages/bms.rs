//! BMS pack summary decoding
//!
//! The byte layout of the BMS message comes from the DBC loaded into the layout
//! database. On top of the raw signals the decoder keeps a short history of pack
//! current to estimate how many hours of charge remain.

use crate::codec;
use crate::config::BmsConfig;
use crate::signals::MessageLayout;
use crate::types::Reading;
use std::fmt;

/// CAN ID of the BMS pack summary
pub const BMS_MESSAGE_ID: u32 = 0x04D;

/// Number of current samples averaged for the prediction
pub const CURRENT_HISTORY_LEN: usize = 10;

const PACK_CURRENT: &str = "Pack_Current";
const PACK_VOLTAGE: &str = "Pack_Summed_Voltage";
const PACK_SOC: &str = "Pack_SOC";

const PREDICTED_SOC: &str = "Predictive State of Charge";

/// How one DBC signal is published
struct ReadingDef {
    signal: &'static str,
    name: &'static str,
    unit: &'static str,
    max: f64,
    round: bool,
}

/// Published readings, in order
const READINGS: [ReadingDef; 7] = [
    ReadingDef { signal: "High_Temperature", name: "Battery Temperature", unit: "°C", max: 60.0, round: false },
    ReadingDef { signal: PACK_CURRENT, name: "Battery Current", unit: "A", max: 100.0, round: true },
    ReadingDef { signal: PACK_SOC, name: "Battery State of Charge", unit: "%", max: 100.0, round: true },
    ReadingDef { signal: PACK_VOLTAGE, name: "Battery Voltage", unit: "V", max: 100.0, round: true },
    ReadingDef { signal: "Maximum_Pack_DCL", name: "Battery DCL", unit: "A", max: 80.0, round: false },
    ReadingDef { signal: "Failsafe_Statuses", name: "Battery Status", unit: "", max: 100.0, round: false },
    ReadingDef { signal: "CRC_Checksum", name: "Battery Checksum", unit: "", max: 100.0, round: false },
];

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Fixed-capacity ring buffer of the most recent current samples
///
/// Pushing into a full buffer evicts the oldest sample. Iteration yields samples
/// oldest first.
#[derive(Debug, Clone)]
pub struct CurrentHistory<const N: usize = CURRENT_HISTORY_LEN> {
    samples: [f64; N],
    /// Slot the next sample is written to
    next: usize,
    len: usize,
}

impl<const N: usize> CurrentHistory<N> {
    pub fn new() -> Self {
        Self {
            samples: [0.0; N],
            next: 0,
            len: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a sample, evicting the oldest one when full
    pub fn push(&mut self, sample: f64) {
        if N == 0 {
            return;
        }
        self.samples[self.next] = sample;
        self.next = (self.next + 1) % N;
        self.len = (self.len + 1).min(N);
    }

    /// Samples in insertion order, oldest first
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let start = (self.next + N - self.len) % N.max(1);
        (0..self.len).map(move |i| self.samples[(start + i) % N])
    }

    /// Arithmetic mean of the held samples
    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.iter().sum::<f64>() / self.len as f64)
    }
}

impl<const N: usize> Default for CurrentHistory<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Failsafe status bits reported by the BMS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FailsafeFlag {
    Voltage = 1,
    Current = 2,
    Relay = 4,
    CellBalancing = 8,
    ChargeInterlock = 16,
    ThermistorBValueInvalid = 32,
    InputPowerSupply = 64,
    Reserved = 128,
}

impl FailsafeFlag {
    pub const ALL: [FailsafeFlag; 8] = [
        FailsafeFlag::Voltage,
        FailsafeFlag::Current,
        FailsafeFlag::Relay,
        FailsafeFlag::CellBalancing,
        FailsafeFlag::ChargeInterlock,
        FailsafeFlag::ThermistorBValueInvalid,
        FailsafeFlag::InputPowerSupply,
        FailsafeFlag::Reserved,
    ];

    pub fn bit(self) -> u8 {
        self as u8
    }

    /// Flags set in a failsafe status byte, lowest bit first
    pub fn decompose(bits: u8) -> Vec<FailsafeFlag> {
        Self::ALL.into_iter().filter(|flag| bits & flag.bit() != 0).collect()
    }

    pub fn name(self) -> &'static str {
        match self {
            FailsafeFlag::Voltage => "VOLTAGE",
            FailsafeFlag::Current => "CURRENT",
            FailsafeFlag::Relay => "RELAY",
            FailsafeFlag::CellBalancing => "CELL_BALANCING",
            FailsafeFlag::ChargeInterlock => "CHARGE_INTERLOCK",
            FailsafeFlag::ThermistorBValueInvalid => "THERMISTOR_B_VALUE_INVALID",
            FailsafeFlag::InputPowerSupply => "INPUT_POWER_SUPPLY",
            FailsafeFlag::Reserved => "RESERVED",
        }
    }
}

impl fmt::Display for FailsafeFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stateful BMS decoder
///
/// The only state is the current history behind the remaining-time prediction;
/// it has a single writer, the decode call.
#[derive(Debug, Clone)]
pub struct BmsDecoder {
    nominal_pack_capacity: f64,
    history: CurrentHistory,
    out_of_range: u64,
}

impl BmsDecoder {
    pub fn new(config: &BmsConfig) -> Self {
        Self {
            nominal_pack_capacity: config.nominal_pack_capacity,
            history: CurrentHistory::new(),
            out_of_range: 0,
        }
    }

    /// Current samples behind the prediction
    pub fn history(&self) -> &CurrentHistory {
        &self.history
    }

    /// Values decoded outside the range their layout declares
    pub fn out_of_range_count(&self) -> u64 {
        self.out_of_range
    }

    /// Decode a BMS payload with the given layout
    ///
    /// Signals missing from the layout or out of range of the payload are left
    /// out; the remaining readings still decode. A value outside the layout's
    /// declared `[min|max]` is published as decoded and logged.
    pub fn decode(&mut self, layout: &MessageLayout, payload: &[u8]) -> Vec<Reading> {
        let mut out_of_range = 0;
        let mut decode_named = |signal: &str| -> Option<f64> {
            let Some(signal_layout) = layout.signal(signal) else {
                log::warn!("BMS layout '{}' has no signal '{}'", layout.name, signal);
                return None;
            };
            match codec::decode_signal(payload, signal_layout) {
                Ok(value) => {
                    if !signal_layout.in_range(value) {
                        out_of_range += 1;
                        log::warn!(
                            "BMS signal '{}' = {} outside [{}|{}]",
                            signal,
                            value,
                            signal_layout.min,
                            signal_layout.max
                        );
                    }
                    Some(value)
                }
                Err(e) => {
                    log::warn!("Skipping BMS signal: {}", e);
                    None
                }
            }
        };

        let mut readings = Vec::with_capacity(READINGS.len() + 1);
        let mut current = None;
        let mut voltage = None;
        let mut soc = None;

        for def in &READINGS {
            let Some(value) = decode_named(def.signal) else {
                continue;
            };
            match def.signal {
                PACK_CURRENT => current = Some(value),
                PACK_VOLTAGE => voltage = Some(value),
                PACK_SOC => soc = Some(value),
                _ => {}
            }
            let value = if def.round { round2(value) } else { value };
            readings.push(Reading::new(def.name, value, def.unit).with_max(def.max));
        }
        self.out_of_range += out_of_range;

        let predicted = match (current, voltage, soc) {
            (Some(current), Some(voltage), Some(soc)) => self.predict_soc_hours(current, voltage, soc),
            _ => 0.0,
        };
        readings.push(Reading::new(PREDICTED_SOC, predicted, "Hours").with_max(100.0));

        readings
    }

    /// Estimate the remaining hours of charge
    ///
    /// Returns 0 without touching the history when current, voltage or state of
    /// charge is exactly zero, i.e. when the bus is momentarily idle.
    pub fn predict_soc_hours(&mut self, current: f64, voltage: f64, soc: f64) -> f64 {
        if current == 0.0 || voltage == 0.0 || soc == 0.0 {
            return 0.0;
        }

        self.history.push(current);
        let Some(avg_current) = self.history.mean() else {
            return 0.0;
        };

        let avg_power = avg_current * voltage;
        let hours = (soc * self.nominal_pack_capacity) / avg_power;
        if hours.is_finite() {
            hours.round()
        } else {
            0.0
        }
    }
}
