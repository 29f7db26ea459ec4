//! Raw trouble-code decoding and validation.
//!
//! Mode 0x03/0x07 responses carry codes as two-byte pairs packed per SAE
//! J2012: the top two bits of the first byte select the system letter,
//! the rest are four hex digits.

use std::sync::LazyLock;

use regex::Regex;

// P0420, C0035, B1000, U0100: letter, 0-3, three hex digits
static RE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[PCBU][0-3][0-9A-F]{3}$").unwrap());

/// Decode two raw bytes into a standard code string (e.g., "P0300").
///
/// Returns `None` for the `0x0000` padding pair ECUs use to fill out a
/// response frame.
pub fn decode_code_bytes(b1: u8, b2: u8) -> Option<String> {
    if b1 == 0x00 && b2 == 0x00 {
        return None;
    }

    let letter = match (b1 >> 6) & 0x03 {
        0 => 'P',
        1 => 'C',
        2 => 'B',
        _ => 'U',
    };

    let digit1 = (b1 >> 4) & 0x03;
    let digit2 = b1 & 0x0F;
    let digit3 = (b2 >> 4) & 0x0F;
    let digit4 = b2 & 0x0F;

    Some(format!("{letter}{digit1}{digit2:X}{digit3:X}{digit4:X}"))
}

/// Uppercase and trim a user- or wire-supplied code string.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Whether a (normalized) string is a well-formed trouble code.
pub fn is_valid_code(code: &str) -> bool {
    RE_CODE.is_match(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_p0300() {
        assert_eq!(decode_code_bytes(0x03, 0x00).as_deref(), Some("P0300"));
    }

    #[test]
    fn decode_p0171() {
        assert_eq!(decode_code_bytes(0x01, 0x71).as_deref(), Some("P0171"));
    }

    #[test]
    fn decode_c0035() {
        assert_eq!(decode_code_bytes(0x40, 0x35).as_deref(), Some("C0035"));
    }

    #[test]
    fn decode_b0100() {
        assert_eq!(decode_code_bytes(0x81, 0x00).as_deref(), Some("B0100"));
    }

    #[test]
    fn decode_u0100() {
        assert_eq!(decode_code_bytes(0xC1, 0x00).as_deref(), Some("U0100"));
    }

    #[test]
    fn padding_returns_none() {
        assert_eq!(decode_code_bytes(0x00, 0x00), None);
    }

    #[test]
    fn decoded_codes_validate() {
        for (b1, b2) in [(0x03, 0x00), (0x04, 0x20), (0x40, 0x35), (0xC1, 0x00)] {
            let code = decode_code_bytes(b1, b2).unwrap();
            assert!(is_valid_code(&code), "{code} failed validation");
        }
    }

    #[test]
    fn validation_rejects_malformed() {
        assert!(is_valid_code("P0420"));
        assert!(is_valid_code(&normalize_code("  p0420 ")));
        assert!(!is_valid_code("P042"));
        assert!(!is_valid_code("P04200"));
        assert!(!is_valid_code("X0420"));
        assert!(!is_valid_code("P4420")); // first digit is two bits on the wire
        assert!(!is_valid_code("P0G20"));
        assert!(!is_valid_code(""));
    }
}
