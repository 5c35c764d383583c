//! Base-128 varints as used for the length of every delimited sub-message.
//!
//! Seven payload bits per byte, least-significant group first, high bit set
//! on every byte except the last. A 32-bit value takes at most five bytes.

use super::WireError;
use crate::constants::MAX_VARINT32_SIZE;

/// Number of bytes `value` occupies once encoded.
pub const fn varint32_size(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

pub fn write_varint32(mut value: u32, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Reads one varint from the front of `buf`, advancing it past the bytes
/// consumed.
///
/// Bits beyond the 32nd are discarded. Fails with
/// [`WireError::MalformedVarint`] when the fifth byte still has its
/// continuation bit set, and with [`WireError::Truncated`] when `buf` runs
/// out first.
pub fn read_varint32(buf: &mut &[u8]) -> Result<u32, WireError> {
    let mut result: u32 = 0;

    for i in 0..MAX_VARINT32_SIZE {
        let Some((&byte, rest)) = buf.split_first() else {
            return Err(WireError::Truncated { needed: 1 });
        };
        *buf = rest;

        result |= ((byte & 0x7F) as u32) << (7 * i);

        if byte & 0x80 == 0 {
            return Ok(result);
        }
    }

    Err(WireError::MalformedVarint)
}
