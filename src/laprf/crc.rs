//! # CRC16 Implementation
//!
//! Reflected CRC-16 checksum for LapRF records.
//!
//! **Polynomial**: 0x8005 (x^16 + x^15 + x^2 + 1)
//! **Initial Value**: 0x0000
//! **Reflection**: input bytes and final remainder are bit-reversed
//!
//! The checksum covers the whole unescaped record, SOR to EOR, with the
//! two CRC bytes at offset 3 taken as zero.

use crate::error::{LapRfError, Result};

use super::protocol::CRC_OFFSET;

/// CRC-16 polynomial
const CRC16_POLY: u16 = 0x8005;

/// Precomputed CRC16 lookup table for fast calculation
const CRC16_TABLE: [u16; 256] = generate_crc16_table();

/// Generate CRC16 lookup table at compile time
const fn generate_crc16_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;

    while i < 256 {
        let mut remainder = (i as u16) << 8;
        let mut j = 0;

        while j < 8 {
            if (remainder & 0x8000) != 0 {
                remainder = (remainder << 1) ^ CRC16_POLY;
            } else {
                remainder <<= 1;
            }
            j += 1;
        }

        table[i] = remainder;
        i += 1;
    }

    table
}

/// Incremental CRC16 state
///
/// # Examples
///
/// ```no_run
/// use laprf_codec::laprf::crc::{crc16, Crc16};
///
/// let record = [0x5A, 0x0A, 0x00, 0x00, 0x00, 0x0C, 0xDA, 0x02, 0x00, 0x5B];
/// let crc = Crc16::new().update(&record[..5]).update(&record[5..]).finish();
/// assert_eq!(crc, crc16(&record));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc16 {
    remainder: u16,
}

impl Crc16 {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the running remainder
    pub fn update(mut self, data: &[u8]) -> Self {
        for &byte in data {
            let index = (byte.reverse_bits() ^ (self.remainder >> 8) as u8) as usize;
            self.remainder = CRC16_TABLE[index] ^ (self.remainder << 8);
        }
        self
    }

    pub fn finish(self) -> u16 {
        self.remainder.reverse_bits()
    }
}

/// Calculate the CRC16 checksum of a byte slice using the lookup table
pub fn crc16(data: &[u8]) -> u16 {
    Crc16::new().update(data).finish()
}

/// Compute the checksum a record should carry, treating its CRC field as zero
///
/// # Errors
///
/// Returns `OutOfRange` if the record is too short to hold a CRC field
pub fn record_crc(record: &[u8]) -> Result<u16> {
    check_crc_field(record)?;
    Ok(Crc16::new()
        .update(&record[..CRC_OFFSET])
        .update(&[0, 0])
        .update(&record[CRC_OFFSET + 2..])
        .finish())
}

/// Verify the CRC carried at offset 3 (little-endian) against the record contents
///
/// The record is not modified.
///
/// # Errors
///
/// Returns `CrcMismatch` if the checksums differ, `OutOfRange` if the record
/// is too short to hold a CRC field
pub fn verify(record: &[u8]) -> Result<()> {
    check_crc_field(record)?;
    let received = u16::from_le_bytes([record[CRC_OFFSET], record[CRC_OFFSET + 1]]);
    let computed = record_crc(record)?;

    if received != computed {
        return Err(LapRfError::CrcMismatch { received, computed });
    }

    Ok(())
}

fn check_crc_field(record: &[u8]) -> Result<()> {
    if record.len() < CRC_OFFSET + 2 {
        return Err(LapRfError::OutOfRange {
            position: CRC_OFFSET,
            requested: 2,
            capacity: record.len(),
        });
    }
    Ok(())
}

/// Calculate CRC16 using the direct reflected algorithm (slow, for verification)
///
/// Bit-by-bit form of the same checksum with the reflected polynomial 0xA001.
/// Used primarily for testing the lookup table implementation.
#[allow(dead_code)]
fn crc16_slow(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;

    for &byte in data {
        crc ^= u16::from(byte);

        for _ in 0..8 {
            if (crc & 0x0001) != 0 {
                crc = (crc >> 1) ^ CRC16_POLY.reverse_bits();
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(hex_str: &str) -> Vec<u8> {
        hex::decode(hex_str).unwrap()
    }

    #[test]
    fn test_crc16_empty() {
        assert_eq!(crc16(&[]), 0x0000);
    }

    #[test]
    fn test_crc16_check_value() {
        // Standard check string for the reflected 0x8005 CRC-16
        assert_eq!(crc16(b"123456789"), 0xBB3D);
    }

    #[test]
    fn test_crc16_lookup_table_matches_slow() {
        let test_data = [
            vec![0x01, 0x02, 0x03],
            vec![0xFF, 0xFE, 0xFD],
            vec![0x5A, 0x0E, 0x00, 0x00, 0x00, 0x07, 0xDA, 0x5B],
            vec![0x00; 24],
            vec![0xFF; 10],
        ];

        for data in test_data.iter() {
            assert_eq!(crc16(data), crc16_slow(data), "CRC mismatch for data: {:?}", data);
        }
    }

    #[test]
    fn test_crc16_regression_rf_setup_capture_without_eor() {
        // RF setup capture truncated before EOR, CRC field zeroed
        let mut data = bytes("5a2500065d02da01010120020100220201002102020024023a0023040080894425028016");
        data[3] = 0;
        data[4] = 0;
        assert_eq!(crc16(&data), 0x8689);
    }

    #[test]
    fn test_record_crc_matches_carried_value() {
        let record = bytes("5a2500065d02da01010120020100220201002102020024023a00230400808944250280165b");
        assert_eq!(record_crc(&record).unwrap(), 0x5D06);

        let record = bytes("5a0e00a40507da2604701700005b");
        assert_eq!(record_crc(&record).unwrap(), 0x05A4);
    }

    #[test]
    fn test_verify_accepts_valid_record() {
        let record = bytes("5a1c00d52b0cda02086051fcaf01000000200800000000000000005b");
        assert!(verify(&record).is_ok());
    }

    #[test]
    fn test_verify_rejects_tampered_record() {
        let mut record = bytes("5a0e00a40507da2604701700005b");
        record[9] ^= 0x01;

        let err = verify(&record).unwrap_err();
        assert!(matches!(err, LapRfError::CrcMismatch { received: 0x05A4, .. }));
    }

    #[test]
    fn test_verify_too_short() {
        assert!(matches!(
            verify(&[0x5A, 0x08, 0x00]),
            Err(LapRfError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_crc16_changes_with_data() {
        let data1 = [0x5A, 0x0E, 0x00, 0x04];
        let data2 = [0x5A, 0x0E, 0x00, 0x05];

        assert_ne!(crc16(&data1), crc16(&data2), "CRC should change when data changes");
    }
}
