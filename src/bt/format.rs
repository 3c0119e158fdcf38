//! Text rendering of device addresses and service identifiers.
//!
//! Both layouts are reproduced byte-for-byte from the stack's own
//! console output: `xx:xx:xx:xx:xx:xx` for addresses and, for 128-bit
//! identifiers, the hyphenated form read from byte 15 down to byte 0.

use core::fmt::Write;

use heapless::String;

use super::BdAddr;
use crate::error::Error;

/// `xx:xx:xx:xx:xx:xx`
pub type AddressString = String<17>;

/// Longest identifier: `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
pub type UuidString = String<36>;

/// Render a 6-byte address as lowercase, colon-separated hex.
pub fn format_address(bytes: &[u8]) -> Result<AddressString, Error> {
    BdAddr::from_slice(bytes).map(|addr| address_string(&addr))
}

pub fn address_string(addr: &BdAddr) -> AddressString {
    let mut out = AddressString::new();
    // 17 bytes always fit.
    let _ = write!(out, "{addr}");
    out
}

/// Render a 2-, 4- or 16-byte service identifier.
///
/// 2 and 4 byte values are little-endian and print as zero-padded hex.
/// 16 byte values print in 8-4-4-4-12 groups starting from the last
/// byte. Any other length is `MalformedInput`.
pub fn format_uuid(bytes: &[u8]) -> Result<UuidString, Error> {
    let mut out = UuidString::new();
    let written = match *bytes {
        [a, b] => write!(out, "{:04x}", u16::from_le_bytes([a, b])),
        [a, b, c, d] => write!(out, "{:08x}", u32::from_le_bytes([a, b, c, d])),
        _ if bytes.len() == 16 => write_uuid128(&mut out, bytes),
        _ => return Err(Error::MalformedInput),
    };
    written.map_err(|_| Error::MalformedInput)?;
    Ok(out)
}

fn write_uuid128(out: &mut UuidString, bytes: &[u8]) -> core::fmt::Result {
    for (i, byte) in bytes.iter().rev().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.write_char('-')?;
        }
        write!(out, "{byte:02x}")?;
    }
    Ok(())
}
