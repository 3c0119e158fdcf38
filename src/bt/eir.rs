//! Extended Inquiry Response parsing.
//!
//! EIR is a sequence of `[len][type][data; len - 1]` structures. A zero
//! length ends the significant part; the rest of the buffer is padding.

use super::DeviceName;
use crate::config::MAX_BDNAME_LEN;

/// EIR data type: Shortened Local Name.
pub const EIR_TYPE_SHORT_LOCAL_NAME: u8 = 0x08;
/// EIR data type: Complete Local Name.
pub const EIR_TYPE_CMPL_LOCAL_NAME: u8 = 0x09;

/// Find the payload of the first structure of type `eir_type`.
pub fn find_field(data: &[u8], eir_type: u8) -> Option<&[u8]> {
    let mut i = 0;
    while i < data.len() {
        let len = data[i] as usize;
        if len == 0 || i + len >= data.len() {
            break;
        }
        if data[i + 1] == eir_type {
            return Some(&data[i + 2..i + 1 + len]);
        }
        i += len + 1;
    }
    None
}

/// Recover a device name: the complete local name if present, otherwise
/// the shortened one. Longer names are silently truncated.
pub fn extract_name(eir: &[u8]) -> Option<DeviceName> {
    let raw = find_field(eir, EIR_TYPE_CMPL_LOCAL_NAME)
        .or_else(|| find_field(eir, EIR_TYPE_SHORT_LOCAL_NAME))?;
    DeviceName::from_bytes(&raw[..raw.len().min(MAX_BDNAME_LEN)])
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEVICE_NAME_CAP, EIR_DATA_LEN};

    #[test]
    fn extract_complete_local_name() {
        // len=7, type=0x09 (Complete Local Name), "Pixel7"
        let eir = [0x07, 0x09, b'P', b'i', b'x', b'e', b'l', b'7'];
        let name = extract_name(&eir).unwrap();
        assert_eq!(name.as_str(), "Pixel7");
        assert_eq!(name.len(), 6);
    }

    #[test]
    fn extract_shortened_local_name() {
        let eir = [0x05, 0x08, b'B', b'T', b' ', b'K'];
        assert_eq!(extract_name(&eir).unwrap().as_str(), "BT K");
    }

    #[test]
    fn complete_name_preferred_over_earlier_short_name() {
        let eir = [
            0x03, 0x08, b'J', b'B', // short name first
            0x02, 0x01, 0x06, // flags
            0x06, 0x09, b'J', b'B', b'L', b' ', b'5', // complete name later
        ];
        assert_eq!(extract_name(&eir).unwrap().as_str(), "JBL 5");
    }

    #[test]
    fn empty_blob_has_no_name() {
        assert!(extract_name(&[]).is_none());
    }

    #[test]
    fn zero_filled_blob_has_no_name() {
        let eir = [0u8; EIR_DATA_LEN];
        assert!(extract_name(&eir).is_none());
    }

    #[test]
    fn no_name_field() {
        // Flags + 16-bit service UUID list only.
        let eir = [0x02, 0x01, 0x06, 0x03, 0x03, 0x0B, 0x11];
        assert!(extract_name(&eir).is_none());
    }

    #[test]
    fn name_after_padding_is_ignored() {
        let eir = [0x02, 0x01, 0x06, 0x00, 0x04, 0x09, b'A', b'B', b'C'];
        assert!(extract_name(&eir).is_none());
    }

    #[test]
    fn truncated_structure_is_ignored() {
        // Declares 9 bytes but only 4 follow.
        let eir = [0x09, 0x09, b'T', b'r', b'u'];
        assert!(extract_name(&eir).is_none());
    }

    #[test]
    fn long_name_truncated_to_display_cap() {
        let mut eir = [0u8; EIR_DATA_LEN];
        eir[0] = 101; // type + 100 name bytes
        eir[1] = EIR_TYPE_CMPL_LOCAL_NAME;
        for b in &mut eir[2..102] {
            *b = b'X';
        }
        let name = extract_name(&eir).unwrap();
        assert_eq!(name.len(), DEVICE_NAME_CAP);
        assert!(name.as_str().bytes().all(|b| b == b'X'));
    }

    #[test]
    fn find_field_returns_exact_payload() {
        let eir = [0x02, 0x01, 0x1A, 0x05, 0x03, 0x0B, 0x11, 0x0E, 0x11];
        assert_eq!(find_field(&eir, 0x01), Some(&[0x1A][..]));
        assert_eq!(find_field(&eir, 0x03), Some(&[0x0B, 0x11, 0x0E, 0x11][..]));
        assert_eq!(find_field(&eir, 0xFF), None);
    }
}
