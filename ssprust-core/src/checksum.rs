//! SSP CRC-16
//!
//! Polynomial 0x8005, initial value 0xFFFF, MSB first, no reflection and no
//! final XOR. The same checksum protects the outer frame (computed over
//! `SEQ | LEN | DATA`) and the inner encrypted record.
//!
//! On the wire the CRC is sent low byte first.

use tracing::trace;

/// Generator polynomial
pub const POLYNOMIAL: u16 = 0x8005;

/// Register value before the first byte
pub const INITIAL_VALUE: u16 = 0xFFFF;

/// Lookup table, one entry per possible high byte of the register
pub static TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc: u16 = 0;
        let mut a: u16 = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            if (crc ^ a) & 0x8000 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
            a <<= 1;
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Calculate the CRC of `bytes`
///
/// # Examples
///
/// ```
/// use ssprust_core::checksum;
///
/// let crc = checksum::calculate(&[0x80, 0x01, 0xF0]);
/// assert_eq!(crc.to_le_bytes(), [0x23, 0x80]);
/// ```
pub fn calculate(bytes: &[u8]) -> u16 {
    let crc = bytes.iter().fold(INITIAL_VALUE, |crc, &b| {
        (crc << 8) ^ TABLE[((crc >> 8) as u8 ^ b) as usize]
    });

    trace!(
        len = bytes.len(),
        checksum = format!("0x{:04X}", crc),
        "Calculated checksum"
    );

    crc
}

/// Verify `bytes` against a received checksum
pub fn verify(bytes: &[u8], expected: u16) -> bool {
    calculate(bytes) == expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Bit-by-bit reference used to check the table
    fn reference(bytes: &[u8]) -> u16 {
        let mut crc = INITIAL_VALUE;
        for &b in bytes {
            crc ^= (b as u16) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 {
                    (crc << 1) ^ POLYNOMIAL
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    #[test]
    fn test_table_corners() {
        assert_eq!(TABLE[0], 0x0000);
        assert_eq!(TABLE[1], 0x8005);
        assert_eq!(TABLE[255], 0x0202);
    }

    #[test]
    fn test_known_ok_reply() {
        // 7F 80 01 F0 23 80 is the canonical OK reply with sequence bit set
        assert_eq!(calculate(&[0x80, 0x01, 0xF0]), 0x8023);
    }

    #[test]
    fn test_known_sync_command() {
        // 7F 80 01 11 65 82
        assert_eq!(calculate(&[0x80, 0x01, 0x11]), 0x8265);
    }

    #[test]
    fn test_empty_input_is_initial_value() {
        assert_eq!(calculate(&[]), INITIAL_VALUE);
    }

    #[test]
    fn test_verify() {
        let data = [0x00, 0x01, 0x07];
        let crc = calculate(&data);
        assert!(verify(&data, crc));
        assert!(!verify(&data, crc ^ 1));
    }

    proptest! {
        #[test]
        fn table_matches_bitwise(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
            prop_assert_eq!(calculate(&bytes), reference(&bytes));
        }

        #[test]
        fn single_bit_flip_detected(
            bytes in prop::collection::vec(any::<u8>(), 1..64),
            idx in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut flipped = bytes.clone();
            let i = idx.index(flipped.len());
            flipped[i] ^= 1 << bit;
            prop_assert_ne!(calculate(&bytes), calculate(&flipped));
        }
    }
}
