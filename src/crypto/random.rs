//! Random values: certificate serial numbers and raw random blocks.

use crate::error::{CertToolError, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use uuid::Uuid;

/// Draw a fresh 128-bit serial from a random (v4) unique identifier.
///
/// The sixteen identifier bytes are read big-endian as an unsigned
/// integer, so the value is never negative and never exceeds 128 bits.
/// No counter is kept between invocations.
pub fn random_serial() -> u128 {
    Uuid::new_v4().as_u128()
}

/// Minimal big-endian bytes of a serial, with a leading zero octet when the
/// top bit is set so the DER INTEGER stays positive.
pub fn serial_bytes(serial: u128) -> Vec<u8> {
    let bytes = serial.to_be_bytes();
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let trimmed = &bytes[first..];

    let mut out = Vec::with_capacity(trimmed.len() + 1);
    if trimmed[0] & 0x80 != 0 {
        out.push(0);
    }
    out.extend_from_slice(trimmed);
    out
}

/// Produce `count` blocks of `block_size` bytes from the OS RNG.
pub fn random_blocks(count: usize, block_size: usize) -> Result<Vec<Vec<u8>>> {
    if block_size == 0 {
        return Err(CertToolError::InputError(
            "Block size must be at least one byte".to_string(),
        ));
    }

    let mut blocks = Vec::with_capacity(count);
    for _ in 0..count {
        let mut block = vec![0u8; block_size];
        OsRng
            .try_fill_bytes(&mut block)
            .map_err(|e| CertToolError::InputError(format!("RNG failure: {}", e)))?;
        blocks.push(block);
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_serials_differ() {
        let a = random_serial();
        let b = random_serial();
        assert_ne!(a, b);
    }

    #[test]
    fn test_serial_bytes_trims_leading_zeros() {
        assert_eq!(serial_bytes(0xAB), vec![0x00, 0xAB]);
        assert_eq!(serial_bytes(0x7F), vec![0x7F]);
        assert_eq!(serial_bytes(0x0102), vec![0x01, 0x02]);
        assert_eq!(serial_bytes(0), vec![0x00]);
    }

    #[test]
    fn test_serial_bytes_full_width() {
        let bytes = serial_bytes(u128::MAX);
        assert_eq!(bytes.len(), 17);
        assert_eq!(bytes[0], 0);
    }

    #[test]
    fn test_random_blocks_shape() {
        let blocks = random_blocks(3, 16).unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| b.len() == 16));
        assert_ne!(blocks[0], blocks[1]);
    }

    #[test]
    fn test_random_blocks_zero_size() {
        assert!(matches!(
            random_blocks(1, 0),
            Err(CertToolError::InputError(_))
        ));
    }
}
