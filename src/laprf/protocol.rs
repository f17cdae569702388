//! # LapRF Protocol Constants and Types
//!
//! Core protocol definitions for LapRF record framing.

use serde::Serialize;

/// Start of record delimiter
pub const SOR: u8 = 0x5A;

/// End of record delimiter
pub const EOR: u8 = 0x5B;

/// Escape byte, precedes an interior reserved byte
pub const ESC: u8 = 0x5C;

/// Added to an escaped byte's original value
pub const ESC_OFFSET: u8 = 0x40;

/// Maximum unescaped record length, also the encoder's buffer capacity
pub const MAX_RECORD_LEN: usize = 1024;

/// Header layout offsets
/// Frame structure: sor(1) + length(2) + crc(2) + type(2) + fields(N) + eor(1)
pub const LENGTH_OFFSET: usize = 1;
pub const CRC_OFFSET: usize = 3;
pub const RECORD_TYPE_OFFSET: usize = 5;
pub const FIELDS_OFFSET: usize = 7;

/// Smallest legal record: header (7 bytes) + EOR
pub const MIN_RECORD_LEN: usize = FIELDS_OFFSET + 1;

/// Number of receiver slots on the timer
pub const MAX_SLOTS: u8 = 8;

/// Signature of the slotIndex field, shared by every record type that has one
pub const SLOT_INDEX_SIGNATURE: u8 = 0x01;

/// Record type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordType {
    Rssi,
    RfSetup,
    StateControl,
    Settings,
    Descriptor,
    Passing,
    Status,
    Time,
    Error,
}

impl RecordType {
    /// All record types known to the protocol
    pub const ALL: [RecordType; 9] = [
        RecordType::Rssi,
        RecordType::RfSetup,
        RecordType::StateControl,
        RecordType::Settings,
        RecordType::Descriptor,
        RecordType::Passing,
        RecordType::Status,
        RecordType::Time,
        RecordType::Error,
    ];

    /// Map a wire code to a record type
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0xDA01 => Some(RecordType::Rssi),
            0xDA02 => Some(RecordType::RfSetup),
            0xDA04 => Some(RecordType::StateControl),
            0xDA07 => Some(RecordType::Settings),
            0xDA08 => Some(RecordType::Descriptor),
            0xDA09 => Some(RecordType::Passing),
            0xDA0A => Some(RecordType::Status),
            0xDA0C => Some(RecordType::Time),
            0xFFFF => Some(RecordType::Error),
            _ => None,
        }
    }

    /// Wire code
    pub const fn code(self) -> u16 {
        match self {
            RecordType::Rssi => 0xDA01,
            RecordType::RfSetup => 0xDA02,
            RecordType::StateControl => 0xDA04,
            RecordType::Settings => 0xDA07,
            RecordType::Descriptor => 0xDA08,
            RecordType::Passing => 0xDA09,
            RecordType::Status => 0xDA0A,
            RecordType::Time => 0xDA0C,
            RecordType::Error => 0xFFFF,
        }
    }

    /// Protocol name, used for schema lookup by name
    pub const fn name(self) -> &'static str {
        match self {
            RecordType::Rssi => "rssi",
            RecordType::RfSetup => "rfSetup",
            RecordType::StateControl => "stateControl",
            RecordType::Settings => "settings",
            RecordType::Descriptor => "descriptor",
            RecordType::Passing => "passing",
            RecordType::Status => "status",
            RecordType::Time => "time",
            RecordType::Error => "error",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

/// Gate state carried by StateControl and Status records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum GateState {
    Idle,
    Active,
    Crashed,
    /// Also observed on device reset
    Shutdown,
}

impl GateState {
    pub const fn code(self) -> u8 {
        match self {
            GateState::Idle => 0x00,
            GateState::Active => 0x01,
            GateState::Crashed => 0x02,
            GateState::Shutdown => 0xFE,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(GateState::Idle),
            0x01 => Some(GateState::Active),
            0x02 => Some(GateState::Crashed),
            0xFE => Some(GateState::Shutdown),
            _ => None,
        }
    }
}

/// Check whether a slot index addresses a physical receiver slot
pub fn is_valid_slot(slot: u8) -> bool {
    (1..=MAX_SLOTS).contains(&slot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_bytes() {
        assert_eq!(SOR, 0x5A);
        assert_eq!(EOR, 0x5B);
        assert_eq!(ESC, 0x5C);
        assert_eq!(ESC_OFFSET, 0x40);
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(LENGTH_OFFSET, 1);
        assert_eq!(CRC_OFFSET, 3);
        assert_eq!(RECORD_TYPE_OFFSET, 5);
        assert_eq!(MIN_RECORD_LEN, 8);
    }

    #[test]
    fn test_record_type_codes_round_trip() {
        for record_type in RecordType::ALL {
            assert_eq!(RecordType::from_code(record_type.code()), Some(record_type));
            assert_eq!(RecordType::from_name(record_type.name()), Some(record_type));
        }
    }

    #[test]
    fn test_unknown_record_type_code() {
        assert_eq!(RecordType::from_code(0xDA03), None);
        assert_eq!(RecordType::from_code(0x0000), None);
        assert_eq!(RecordType::from_name("lap"), None);
    }

    #[test]
    fn test_gate_state_codes() {
        assert_eq!(GateState::from_code(0xFE), Some(GateState::Shutdown));
        assert_eq!(GateState::Active.code(), 0x01);
        assert_eq!(GateState::from_code(0x03), None);
    }

    #[test]
    fn test_slot_range() {
        assert!(!is_valid_slot(0));
        assert!(is_valid_slot(1));
        assert!(is_valid_slot(8));
        assert!(!is_valid_slot(9));
    }
}
