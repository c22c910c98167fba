//! Frame tokenizer
//!
//! Splits one captured bus frame, transmitted as whitespace-delimited text, into a
//! [`RawFrame`]. The text has the shape printed by common CAN capture tools:
//!
//! ```text
//! Timestamp: 1711111111.123456    ID: 0181    S Rx    DL:  8    01 02 03 04 05 06 07 08    Channel: can0
//! ```
//!
//! Fields are positional: timestamp at token 1, hexadecimal ID at token 3, data
//! length at token 7 and exactly that many payload octets after it. Anything past
//! the payload is kept as an opaque trailer.

use crate::types::{RawFrame, Result, TelemetryError};

const TIMESTAMP_TOKEN: usize = 1;
const ID_TOKEN: usize = 3;
const DLC_TOKEN: usize = 7;
const PAYLOAD_START: usize = 8;

/// Largest data length code of a classic CAN frame
pub const MAX_DATA_LENGTH: u8 = 8;

/// Tokenize a single frame line
pub fn tokenize(line: &str) -> Result<RawFrame> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    if tokens.len() < PAYLOAD_START {
        return Err(TelemetryError::MalformedFrame(format!(
            "expected at least {} tokens, got {}",
            PAYLOAD_START,
            tokens.len()
        )));
    }

    let timestamp: f64 = tokens[TIMESTAMP_TOKEN]
        .parse()
        .ok()
        .filter(|t: &f64| t.is_finite())
        .ok_or_else(|| {
            TelemetryError::MalformedFrame(format!("invalid timestamp '{}'", tokens[TIMESTAMP_TOKEN]))
        })?;

    let id = parse_id(tokens[ID_TOKEN])?;

    let dlc_token = tokens[DLC_TOKEN];
    let data_length: u8 = Some(dlc_token)
        .filter(|t| t.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|t| t.parse().ok())
        .filter(|dl| *dl <= MAX_DATA_LENGTH)
        .ok_or_else(|| {
            TelemetryError::MalformedFrame(format!("invalid data length code '{}'", dlc_token))
        })?;

    let payload_end = PAYLOAD_START + data_length as usize;
    if tokens.len() < payload_end {
        return Err(TelemetryError::MalformedFrame(format!(
            "data length code is {} but only {} payload tokens follow",
            data_length,
            tokens.len() - PAYLOAD_START
        )));
    }

    let payload = tokens[PAYLOAD_START..payload_end]
        .iter()
        .map(|token| parse_octet(token))
        .collect::<Result<Vec<u8>>>()?;

    let trailer = tokens[payload_end..].iter().map(|t| t.to_string()).collect();

    Ok(RawFrame {
        timestamp,
        id,
        data_length,
        payload,
        trailer,
    })
}

/// Parse a hexadecimal CAN ID; "181" and "0181" name the same message
fn parse_id(token: &str) -> Result<u32> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(TelemetryError::MalformedFrame(format!("invalid message ID '{}'", token)));
    }
    u32::from_str_radix(digits, 16)
        .map_err(|_| TelemetryError::MalformedFrame(format!("invalid message ID '{}'", token)))
}

/// Parse one payload byte written as exactly two hex digits
fn parse_octet(token: &str) -> Result<u8> {
    if token.len() != 2 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(TelemetryError::MalformedFrame(format!("invalid payload byte '{}'", token)));
    }
    u8::from_str_radix(token, 16)
        .map_err(|_| TelemetryError::MalformedFrame(format!("invalid payload byte '{}'", token)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_full_frame() {
        let line = "Timestamp: 1711111111.250000    ID: 0181    S Rx                DL:  8    01 02 03 04 05 06 07 08     Channel: can0";
        let frame = tokenize(line).unwrap();
        assert_eq!(frame.timestamp, 1711111111.25);
        assert_eq!(frame.id, 0x181);
        assert_eq!(frame.data_length, 8);
        assert_eq!(frame.payload, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(frame.trailer, vec!["Channel:".to_string(), "can0".to_string()]);
    }

    #[test]
    fn test_three_and_four_digit_ids_match() {
        let short = tokenize("Timestamp: 1.0 ID: 181 S Rx DL: 0").unwrap();
        let padded = tokenize("Timestamp: 1.0 ID: 0181 S Rx DL: 0").unwrap();
        assert_eq!(short.id, padded.id);
        assert!(short.payload.is_empty());
        assert_eq!(tokenize("Timestamp: 1.0 ID: 04d S Rx DL: 0").unwrap().id, 0x4D);
    }

    #[test]
    fn test_too_few_tokens() {
        let err = tokenize("Timestamp: 1.0 ID: 181").unwrap_err();
        assert!(matches!(err, TelemetryError::MalformedFrame(_)));
        assert!(tokenize("").is_err());
    }

    #[test]
    fn test_data_length_exceeds_tokens() {
        let err = tokenize("Timestamp: 1.0 ID: 181 S Rx DL: 8 01 02 03").unwrap_err();
        assert!(matches!(err, TelemetryError::MalformedFrame(_)));
    }

    #[test]
    fn test_invalid_data_length_code() {
        assert!(tokenize("Timestamp: 1.0 ID: 181 S Rx DL: x 01").is_err());
        assert!(tokenize("Timestamp: 1.0 ID: 181 S Rx DL: -1 01").is_err());
        assert!(tokenize("Timestamp: 1.0 ID: 181 S Rx DL: 9 01 02 03 04 05 06 07 08 09").is_err());
    }

    #[test]
    fn test_invalid_fields() {
        assert!(tokenize("Timestamp: never ID: 181 S Rx DL: 0").is_err());
        assert!(tokenize("Timestamp: 1.0 ID: zz S Rx DL: 0").is_err());
        assert!(tokenize("Timestamp: 1.0 ID: 181 S Rx DL: 2 01 0G").is_err());
        assert!(tokenize("Timestamp: 1.0 ID: 181 S Rx DL: 2 01 123").is_err());
    }

    #[test]
    fn test_non_finite_timestamp_rejected() {
        for ts in ["NaN", "inf", "-inf", "infinity"] {
            let line = format!("Timestamp: {} ID: 181 S Rx DL: 0", ts);
            assert!(matches!(tokenize(&line), Err(TelemetryError::MalformedFrame(_))), "{}", ts);
        }
    }

    #[test]
    fn test_signed_data_length_rejected() {
        assert!(tokenize("Timestamp: 1.0 ID: 181 S Rx DL: +1 01").is_err());
        assert!(tokenize("Timestamp: 1.0 ID: 181 S Rx DL: -0").is_err());
        assert!(tokenize("Timestamp: 1.0 ID: 181 S Rx DL: 1 01").is_ok());
    }
}
