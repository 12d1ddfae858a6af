//! Table-driven CRC-8 shared by the bridge and the host.
//!
//! Polynomial 0x07, initial value 0x00, no reflection and no final XOR.
//! Both ends of the wired link must use this exact variant.

/// CRC-8 generator polynomial.
pub const CRC8_POLY: u8 = 0x07;

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC8_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Lookup table for [`crc8`].
pub static CRC8_TABLE: [u8; 256] = build_table();

/// Compute the CRC-8 of `data`.
pub fn crc8(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |crc, &byte| CRC8_TABLE[(crc ^ byte) as usize])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_reference_rows() {
        // First and last rows of the table the hub ships with.
        assert_eq!(
            &CRC8_TABLE[..8],
            &[0x00, 0x07, 0x0E, 0x09, 0x1C, 0x1B, 0x12, 0x15]
        );
        assert_eq!(
            &CRC8_TABLE[248..],
            &[0xE6, 0xE1, 0xE8, 0xEF, 0xFA, 0xFD, 0xF4, 0xF3]
        );
    }

    #[test]
    fn test_crc8_check_value() {
        // Standard check value for CRC-8/SMBUS.
        assert_eq!(crc8(b"123456789"), 0xF4);
        assert_eq!(crc8(&[]), 0x00);
    }

    #[test]
    fn test_single_bit_flip_changes_crc() {
        let data = [0x12u8; 16];
        let mut corrupted = data;
        corrupted[5] ^= 0x01;
        assert_ne!(crc8(&data), crc8(&corrupted));
    }
}
