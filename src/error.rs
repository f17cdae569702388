//! # Error Types
//!
//! Custom error types for the LapRF codec using `thiserror`.

use thiserror::Error;

use crate::laprf::number::NumberType;
use crate::laprf::protocol::RecordType;

/// Main error type for the LapRF codec
#[derive(Debug, Error)]
pub enum LapRfError {
    /// Record delimiters could not be located or are malformed
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// Header length field disagrees with the unescaped record length
    #[error("Length mismatch: header declares {declared} bytes, record has {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    /// Checksum carried in the record does not match the computed one
    #[error("CRC mismatch: record carries 0x{received:04X}, computed 0x{computed:04X}")]
    CrcMismatch { received: u16, computed: u16 },

    /// Record type code not defined by the protocol
    #[error("Unknown record type: 0x{0:04X}")]
    UnknownRecordType(u16),

    /// Record type known to the protocol but carrying no decodable schema
    #[error("Unsupported record type: {0:?}")]
    UnsupportedRecordType(RecordType),

    /// Declared field size disagrees with the schema, or is not a legal width
    #[error(
        "Size mismatch in record 0x{record_type:04X}, field 0x{signature:02X}: expected {expected:?}, found {actual}"
    )]
    SizeMismatch {
        record_type: u16,
        signature: u8,
        expected: Option<u8>,
        actual: u8,
    },

    /// Required fields were absent once the record was fully read
    #[error("Incomplete {record} record, missing: {}", missing.join(", "))]
    IncompleteRecord {
        record: &'static str,
        missing: Vec<String>,
    },

    /// A slot value arrived before any slotIndex field
    #[error("Slot field 0x{signature:02X} appeared before any slotIndex")]
    MissingSlotIndex { signature: u8 },

    /// Slot index outside 1..=8
    #[error("Slot index {0} is outside 1..=8")]
    InvalidSlot(u8),

    /// Cursor access beyond the buffer bound
    #[error("Out of range: {requested} bytes at position {position} exceeds capacity {capacity}")]
    OutOfRange {
        position: usize,
        requested: usize,
        capacity: usize,
    },

    /// 64-bit value cannot be represented exactly as f64
    #[error("Precision loss: {value} exceeds 2^53 - 1")]
    PrecisionLoss { value: u64 },

    /// Field name not present in the record schema (encode path)
    #[error("Unknown field '{field}' for record {record}")]
    UnknownField { record: &'static str, field: String },

    /// Value type differs from the schema's declared number type (encode path)
    #[error("Field '{field}' expects {expected:?}, got {actual:?}")]
    TypeMismatch {
        field: &'static str,
        expected: NumberType,
        actual: NumberType,
    },

    /// Schema table construction errors
    #[error("Schema error: {0}")]
    Schema(String),

    /// Channel name or band/channel pair not in the frequency table
    #[error("Unknown channel: {0}")]
    UnknownChannel(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),
}

/// Framing failures while locating or unescaping a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("no start-of-record byte found")]
    MissingSor,

    #[error("no end-of-record byte after start-of-record")]
    MissingEor,

    #[error("record of {len} bytes is shorter than the minimum header")]
    TooShort { len: usize },

    #[error("record of {len} bytes exceeds the maximum of {max}")]
    TooLong { len: usize, max: usize },

    #[error("record delimiters are 0x{first:02X}..0x{last:02X}")]
    BadDelimiter { first: u8, last: u8 },

    #[error("{pending} pending bytes without a complete record, buffer discarded")]
    Overflow { pending: usize },
}

/// Non-fatal conditions found while decoding an otherwise valid record
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DecodeWarning {
    /// Field signature not in the schema; its bytes were skipped
    #[error("unknown field 0x{signature:02X} ({size} bytes) skipped in record {record}")]
    UnknownFieldSignature {
        record: &'static str,
        signature: u8,
        size: u8,
    },

    /// 64-bit value above 2^53 - 1, exact here but lossy for f64 consumers
    #[error("field {field} value {value} exceeds 2^53 - 1")]
    PrecisionLoss { field: &'static str, value: u64 },
}

/// Result type alias for the LapRF codec
pub type Result<T> = std::result::Result<T, LapRfError>;
