//! Signal codec
//!
//! Pure functions that turn payload bytes into numbers: multi-byte reassembly,
//! arbitrary bit-field extraction, two's-complement conversion and physical
//! scaling. Every frame decoder is built on these.

use crate::signals::{ByteOrder, SignalLayout, ValueType};
use crate::types::{Result, TelemetryError};
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use std::ops::Range;

/// Reassemble an unsigned integer from a byte range of the payload
///
/// With `LittleEndian` the first byte of the range is the least significant one,
/// which is how every field on this bus is transmitted.
pub fn decode_unsigned(payload: &[u8], bytes: Range<usize>, byte_order: ByteOrder) -> Result<u64> {
    let len = bytes.len();
    if len == 0 || len > 8 {
        return Err(TelemetryError::out_of_range(
            format!("bytes {:?}", bytes),
            format!("cannot reassemble {} bytes into a 64-bit value", len),
        ));
    }
    if bytes.end > payload.len() {
        return Err(TelemetryError::out_of_range(
            format!("bytes {:?}", bytes),
            format!("payload only has {} bytes", payload.len()),
        ));
    }

    let slice = &payload[bytes];
    Ok(match byte_order {
        ByteOrder::LittleEndian => LittleEndian::read_uint(slice, len),
        ByteOrder::BigEndian => BigEndian::read_uint(slice, len),
    })
}

/// Extract a bit field from the payload
///
/// Intel (little-endian) layouts name the LSB in `start_bit` and grow towards
/// higher bits. Motorola (big-endian) layouts name the MSB using DBC sawtooth
/// numbering (bit 7 of byte 0 is bit 7, bit 0 of byte 1 is bit 8).
pub fn extract_bits(payload: &[u8], start_bit: usize, bit_width: usize, byte_order: ByteOrder) -> Result<u64> {
    if bit_width == 0 || bit_width > 64 {
        return Err(TelemetryError::out_of_range(
            format!("bit {}", start_bit),
            format!("unsupported width of {} bits", bit_width),
        ));
    }

    match byte_order {
        ByteOrder::LittleEndian => {
            let required_bytes = (start_bit + bit_width).div_ceil(8);
            if required_bytes > payload.len() {
                return Err(TelemetryError::out_of_range(
                    format!("bit {}", start_bit),
                    format!("needs {} bytes but payload has {}", required_bytes, payload.len()),
                ));
            }

            let mut result: u64 = 0;
            for i in 0..bit_width {
                let bit_pos = start_bit + i;
                let bit_value = (payload[bit_pos / 8] >> (bit_pos % 8)) & 0x01;
                result |= (bit_value as u64) << i;
            }
            Ok(result)
        }
        ByteOrder::BigEndian => {
            let mut result: u64 = 0;
            let mut bit_pos = start_bit;
            for i in 0..bit_width {
                let byte_idx = bit_pos / 8;
                let byte = payload.get(byte_idx).ok_or_else(|| {
                    TelemetryError::out_of_range(
                        format!("bit {}", start_bit),
                        format!("runs past byte {} of a {} byte payload", byte_idx, payload.len()),
                    )
                })?;
                result = (result << 1) | ((byte >> (bit_pos % 8)) & 0x01) as u64;

                if i + 1 < bit_width {
                    // Walk towards the LSB: down within a byte, then to bit 7 of the next byte
                    bit_pos = if bit_pos % 8 == 0 { bit_pos + 15 } else { bit_pos - 1 };
                }
            }
            Ok(result)
        }
    }
}

/// Two's-complement conversion of a `bit_width`-bit value
///
/// Bits above `bit_width` are ignored.
pub fn to_signed(value: u64, bit_width: u32) -> i64 {
    if bit_width == 0 {
        return 0;
    }
    if bit_width >= 64 {
        return value as i64;
    }

    let mask = !0u64 << bit_width;
    let value = value & !mask;
    if value >= 1u64 << (bit_width - 1) {
        // value - 2^bit_width, computed by filling the upper bits
        (value | mask) as i64
    } else {
        value as i64
    }
}

/// Convert a raw integer into its engineering value
pub fn apply_scale(raw: i64, scale: f64, offset: f64) -> f64 {
    raw as f64 * scale + offset
}

/// Extract the raw (sign-converted, unscaled) value of a signal
pub fn decode_raw(payload: &[u8], layout: &SignalLayout) -> Result<i64> {
    let unsigned = match layout.byte_range() {
        Some(bytes) if bytes.len() <= 8 => decode_unsigned(payload, bytes, layout.byte_order),
        _ => extract_bits(
            payload,
            layout.start_bit as usize,
            layout.bit_width as usize,
            layout.byte_order,
        ),
    }
    .map_err(|e| match e {
        TelemetryError::SignalOutOfRange { reason, .. } => TelemetryError::out_of_range(&layout.name, reason),
        other => other,
    })?;

    Ok(match layout.value_type {
        ValueType::Signed => to_signed(unsigned, layout.bit_width as u32),
        ValueType::Unsigned => unsigned as i64,
    })
}

/// Extract the physical value of a signal
pub fn decode_signal(payload: &[u8], layout: &SignalLayout) -> Result<f64> {
    let raw = decode_raw(payload, layout)?;
    Ok(apply_scale(raw, layout.scale, layout.offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_unsigned_little_endian() {
        let data = [0xAB, 0xCD, 0xEF, 0x12];
        assert_eq!(decode_unsigned(&data, 0..1, ByteOrder::LittleEndian).unwrap(), 0xAB);
        assert_eq!(decode_unsigned(&data, 0..2, ByteOrder::LittleEndian).unwrap(), 0xCDAB);
        assert_eq!(decode_unsigned(&data, 1..4, ByteOrder::LittleEndian).unwrap(), 0x12EFCD);
        assert_eq!(decode_unsigned(&data, 0..4, ByteOrder::BigEndian).unwrap(), 0xABCDEF12);
    }

    #[test]
    fn test_decode_unsigned_out_of_range() {
        let data = [0x01, 0x02];
        let err = decode_unsigned(&data, 1..3, ByteOrder::LittleEndian).unwrap_err();
        assert!(matches!(err, TelemetryError::SignalOutOfRange { .. }));
        assert!(decode_unsigned(&data, 1..1, ByteOrder::LittleEndian).is_err());
    }

    #[test]
    fn test_extract_little_endian_cross_byte() {
        // 12 bits starting at bit 4: high nibble of byte 0 + all of byte 1
        let data = [0xA5, 0x3C];
        assert_eq!(extract_bits(&data, 4, 12, ByteOrder::LittleEndian).unwrap(), 0x3CA);
        assert_eq!(extract_bits(&data, 0, 16, ByteOrder::LittleEndian).unwrap(), 0x3CA5);
    }

    #[test]
    fn test_extract_big_endian_motorola() {
        let data = [0x12, 0x34, 0x56];
        // MSB at bit 7 of byte 0, 16 bits => bytes 0..2 read big-endian
        assert_eq!(extract_bits(&data, 7, 16, ByteOrder::BigEndian).unwrap(), 0x1234);
        // Single byte field
        assert_eq!(extract_bits(&data, 15, 8, ByteOrder::BigEndian).unwrap(), 0x34);
        // Nibble at bits 3..0 of byte 2
        assert_eq!(extract_bits(&data, 19, 4, ByteOrder::BigEndian).unwrap(), 0x6);
    }

    #[test]
    fn test_extract_bits_out_of_range() {
        let data = [0xFF; 2];
        assert!(extract_bits(&data, 8, 16, ByteOrder::LittleEndian).is_err());
        assert!(extract_bits(&data, 15, 16, ByteOrder::BigEndian).is_err());
        assert!(extract_bits(&data, 0, 0, ByteOrder::LittleEndian).is_err());
    }

    #[test]
    fn test_to_signed_boundaries() {
        assert_eq!(to_signed(0x7F, 8), 127);
        assert_eq!(to_signed(0x80, 8), -128);
        assert_eq!(to_signed(0xFF, 8), -1);
        assert_eq!(to_signed(0x8000, 16), -32768);
        assert_eq!(to_signed(0xFFFF_FFFF, 32), -1);
        assert_eq!(to_signed(0x7FFF_FFFF, 32), 2147483647);
    }

    #[test]
    fn test_to_signed_round_trip() {
        for bit_width in [8u32, 12, 16, 24, 32] {
            let min = -(1i64 << (bit_width - 1));
            let max = (1i64 << (bit_width - 1)) - 1;
            for x in [min, min + 1, -1, 0, 1, max - 1, max] {
                let unsigned = (x as u64) & ((1u64 << bit_width) - 1);
                assert_eq!(to_signed(unsigned, bit_width), x, "width {} value {}", bit_width, x);
            }
        }
    }

    #[test]
    fn test_apply_scale() {
        assert_eq!(apply_scale(3125, 0.1, 0.0), 312.5);
        assert_eq!(apply_scale(100, 1.0, -40.0), 60.0);
    }

    #[test]
    fn test_decode_signal_with_layout() {
        let layout = SignalLayout::le_bytes("torque actual", 6..8, ValueType::Signed, "");
        let data = [0, 0, 0, 0, 0, 0, 0x18, 0xFC];
        assert_eq!(decode_signal(&data, &layout).unwrap(), -1000.0);

        let err = decode_signal(&data[..7], &layout).unwrap_err();
        match err {
            TelemetryError::SignalOutOfRange { signal, .. } => assert_eq!(signal, "torque actual"),
            other => panic!("unexpected error: {}", other),
        }
    }
}
