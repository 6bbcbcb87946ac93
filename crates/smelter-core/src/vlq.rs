//! Variable-length quantities as used by standard MIDI files.
//!
//! Big-endian base-128: seven payload bits per byte, high bit set on every byte
//! except the last. Zero encodes as the single byte `0x00`.

use crate::error::{Result, SmelterError};

/// Largest value a four-byte quantity can carry
pub const MAX: u32 = 0x0FFF_FFFF;

/// Append the encoding of `value` to `out`
pub fn write(out: &mut Vec<u8>, value: u64) -> Result<()> {
    if value > MAX as u64 {
        return Err(SmelterError::DeltaOverflow(value));
    }
    let mut buffer = [0u8; 4];
    let mut start = buffer.len() - 1;
    let mut rest = value;
    buffer[start] = (rest & 0x7F) as u8;
    rest >>= 7;
    while rest > 0 {
        start -= 1;
        buffer[start] = (rest & 0x7F) as u8 | 0x80;
        rest >>= 7;
    }
    out.extend_from_slice(&buffer[start..]);
    Ok(())
}

pub fn encode(value: u64) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(4);
    write(&mut out, value)?;
    Ok(out)
}

/// Decode one quantity from the front of `bytes`, returning it with the byte count used.
///
/// `None` for truncated input or more than four bytes.
pub fn decode(bytes: &[u8]) -> Option<(u32, usize)> {
    let mut value = 0u32;
    for (index, byte) in bytes.iter().take(4).enumerate() {
        value = (value << 7) | (byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            return Some((value, index + 1));
        }
    }
    None
}
