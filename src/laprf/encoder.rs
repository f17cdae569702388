//! # LapRF Record Encoder
//!
//! Assembles outgoing records and provides the command builders a host
//! sends to the timer.
//!
//! Every encode owns its buffer: a [`RecordEncoder`] holds a fixed
//! `[u8; MAX_RECORD_LEN]` array for the span of one record, so encoders can
//! be interleaved freely.

use tracing::debug;

use crate::config::RfSetupConfig;
use crate::error::{LapRfError, Result};

use super::channels;
use super::crc::record_crc;
use super::cursor::ByteCursor;
use super::framer::escape;
use super::number::Number;
use super::protocol::{
    is_valid_slot, GateState, RecordType, EOR, LENGTH_OFFSET, MAX_RECORD_LEN, MAX_SLOTS, SLOT_INDEX_SIGNATURE,
    SOR,
};
use super::record::{
    PassingRecord, Record, RfSetupRecord, RssiRecord, SettingsRecord, StateControlRecord, StatusRecord,
    TimeRecord,
};
use super::schema::{RecordSchema, SchemaRegistry};

/// Builder for one outgoing record
///
/// # Examples
///
/// ```no_run
/// use laprf_codec::laprf::encoder::RecordEncoder;
/// use laprf_codec::laprf::protocol::RecordType;
///
/// let mut encoder = RecordEncoder::start(RecordType::Settings)?;
/// encoder.named("minLapTime", 6000u32)?;
/// let bytes = encoder.finish()?;
/// assert_eq!(bytes[0], 0x5A);
/// # Ok::<(), laprf_codec::error::LapRfError>(())
/// ```
#[derive(Debug)]
pub struct RecordEncoder<'r> {
    cursor: ByteCursor<[u8; MAX_RECORD_LEN]>,
    record_type: RecordType,
    schema: Option<&'r RecordSchema>,
}

impl RecordEncoder<'static> {
    /// Start a record using the built-in protocol tables
    pub fn start(record_type: RecordType) -> Result<Self> {
        Self::start_with(SchemaRegistry::global(), record_type)
    }
}

impl<'r> RecordEncoder<'r> {
    /// Start a record against a specific registry
    ///
    /// Writes SOR, zeroed length and CRC placeholders, then the record type.
    pub fn start_with(registry: &'r SchemaRegistry, record_type: RecordType) -> Result<Self> {
        let mut encoder = Self {
            cursor: ByteCursor::new([0u8; MAX_RECORD_LEN]),
            record_type,
            schema: registry.schema(record_type),
        };

        encoder.cursor.write_u8(SOR)?;
        encoder.cursor.write_u16(0)?;
        encoder.cursor.write_u16(0)?;
        encoder.cursor.write_u16(record_type.code())?;

        Ok(encoder)
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Write `[signature][byte width][value]`
    pub fn field(&mut self, signature: u8, value: Number) -> Result<&mut Self> {
        self.cursor.write_u8(signature)?;
        self.cursor.write_u8(value.number_type().byte_width() as u8)?;
        self.cursor.write(value)?;
        Ok(self)
    }

    /// Write a field by schema name, checking the value's type
    ///
    /// # Errors
    ///
    /// Returns `UnknownField` if the record has no such field and
    /// `TypeMismatch` if the value's type differs from the schema
    pub fn named(&mut self, name: &str, value: impl Into<Number>) -> Result<&mut Self> {
        let value = value.into();
        let descriptor = self
            .schema
            .and_then(|schema| schema.field_by_name(name))
            .ok_or_else(|| LapRfError::UnknownField {
                record: self.record_type.name(),
                field: name.to_string(),
            })?;

        if descriptor.number_type != value.number_type() {
            return Err(LapRfError::TypeMismatch {
                field: descriptor.name,
                expected: descriptor.number_type,
                actual: value.number_type(),
            });
        }

        let signature = descriptor.signature;
        self.field(signature, value)
    }

    /// Write a bare value with no signature or size byte
    ///
    /// Only for irregular records such as the RTC time request.
    pub fn raw(&mut self, value: Number) -> Result<&mut Self> {
        self.cursor.write(value)?;
        Ok(self)
    }

    /// Close the record: EOR, length, CRC, then escape for the wire
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.cursor.write_u8(EOR)?;
        let length = self.cursor.position();

        let declared = u16::try_from(length).map_err(|_| LapRfError::OutOfRange {
            position: 0,
            requested: length,
            capacity: usize::from(u16::MAX),
        })?;
        self.cursor.seek(LENGTH_OFFSET)?;
        self.cursor.write_u16(declared)?;

        let crc = record_crc(self.cursor.slice(0, length)?)?;
        self.cursor.write_u16(crc)?;

        let wire = escape(self.cursor.slice(0, length)?);
        debug!(
            "Encoded {} record: {} bytes, {} on the wire, crc 0x{:04X}",
            self.record_type.name(),
            length,
            wire.len(),
            crc
        );
        Ok(wire)
    }
}

/// Encode any typed record
///
/// Fields are emitted through schema name lookup in wire order, followed by
/// the slot groups, each led by its slotIndex.
///
/// # Errors
///
/// Returns `InvalidSlot` for a slot group keyed outside 1..=8, or any error
/// from [`RecordEncoder::named`]
pub fn encode_record(record: &Record) -> Result<Vec<u8>> {
    let mut encoder = RecordEncoder::start(record.record_type())?;

    for (name, value) in record.fields() {
        encoder.named(name, value)?;
    }

    for (slot, values) in record.slot_groups() {
        if !is_valid_slot(slot) {
            return Err(LapRfError::InvalidSlot(slot));
        }
        encoder.named("slotIndex", slot)?;
        for (name, value) in values {
            encoder.named(name, value)?;
        }
    }

    encoder.finish()
}

pub fn encode_rf_setup(record: &RfSetupRecord) -> Result<Vec<u8>> {
    encode_record(&Record::RfSetup(*record))
}

pub fn encode_rssi(record: &RssiRecord) -> Result<Vec<u8>> {
    encode_record(&Record::Rssi(*record))
}

pub fn encode_settings(record: &SettingsRecord) -> Result<Vec<u8>> {
    encode_record(&Record::Settings(*record))
}

pub fn encode_passing(record: &PassingRecord) -> Result<Vec<u8>> {
    encode_record(&Record::Passing(*record))
}

pub fn encode_status(record: &StatusRecord) -> Result<Vec<u8>> {
    encode_record(&Record::Status(record.clone()))
}

pub fn encode_time(record: &TimeRecord) -> Result<Vec<u8>> {
    encode_record(&Record::Time(*record))
}

pub fn encode_state_control(record: &StateControlRecord) -> Result<Vec<u8>> {
    encode_record(&Record::StateControl(*record))
}

/// Request the device real-time clock
///
/// The request is irregular: signature 0x02 with a zero size and no value.
pub fn get_rtc_time() -> Result<Vec<u8>> {
    let mut encoder = RecordEncoder::start(RecordType::Time)?;
    encoder.raw(Number::U8(0x02))?.raw(Number::U8(0x00))?;
    encoder.finish()
}

/// Request the minimum lap time (a zero minLapTime field)
pub fn get_min_lap_time() -> Result<Vec<u8>> {
    set_min_lap_time(0)
}

/// Set the minimum lap time
///
/// # Arguments
///
/// * `milliseconds` - Shortest lap the timer will register
pub fn set_min_lap_time(milliseconds: u32) -> Result<Vec<u8>> {
    let mut encoder = RecordEncoder::start(RecordType::Settings)?;
    encoder.named("minLapTime", milliseconds)?;
    encoder.finish()
}

/// Set the interval between status records
///
/// # Arguments
///
/// * `milliseconds` - Status update period
pub fn set_status_interval(milliseconds: u16) -> Result<Vec<u8>> {
    let mut encoder = RecordEncoder::start(RecordType::Settings)?;
    encoder.named("statusInterval", milliseconds)?;
    encoder.finish()
}

/// Request the RF setup of one slot, or of all eight
///
/// # Errors
///
/// Returns `InvalidSlot` if `slot` is outside 1..=8
pub fn get_rf_setup(slot: Option<u8>) -> Result<Vec<u8>> {
    let mut encoder = RecordEncoder::start(RecordType::RfSetup)?;

    match slot {
        Some(slot) if !is_valid_slot(slot) => return Err(LapRfError::InvalidSlot(slot)),
        Some(slot) => {
            encoder.field(SLOT_INDEX_SIGNATURE, Number::U8(slot))?;
        }
        None => {
            for slot in 1..=MAX_SLOTS {
                encoder.field(SLOT_INDEX_SIGNATURE, Number::U8(slot))?;
            }
        }
    }

    encoder.finish()
}

/// Settings for one receiver slot
#[derive(Debug, Clone, PartialEq)]
pub struct RfSetupCommand {
    /// Slot index, 1..=8
    pub slot: u8,
    /// Channel name from the channel table, e.g. "R1"
    pub channel: String,
    pub gain: u16,
    pub threshold: f32,
    pub enabled: bool,
}

impl RfSetupCommand {
    pub const DEFAULT_GAIN: u16 = 51;
    pub const DEFAULT_THRESHOLD: f32 = 900.0;

    /// Command for `slot` on `channel` with default gain, threshold and enabled
    pub fn new(slot: u8, channel: impl Into<String>) -> Self {
        Self {
            slot,
            channel: channel.into(),
            gain: Self::DEFAULT_GAIN,
            threshold: Self::DEFAULT_THRESHOLD,
            enabled: true,
        }
    }

    /// Command for `slot` on `channel` with configured gain, threshold and enabled
    pub fn from_config(slot: u8, channel: impl Into<String>, config: &RfSetupConfig) -> Self {
        Self {
            slot,
            channel: channel.into(),
            gain: config.gain,
            threshold: config.threshold,
            enabled: config.enabled,
        }
    }
}

/// Configure one receiver slot
///
/// # Errors
///
/// Returns `UnknownChannel` if the channel name is not in the table and
/// `InvalidSlot` if the slot is outside 1..=8
///
/// # Examples
///
/// ```no_run
/// use laprf_codec::laprf::encoder::{set_rf_setup, RfSetupCommand};
///
/// let bytes = set_rf_setup(&RfSetupCommand::new(1, "R1"))?;
/// # Ok::<(), laprf_codec::error::LapRfError>(())
/// ```
pub fn set_rf_setup(command: &RfSetupCommand) -> Result<Vec<u8>> {
    if !is_valid_slot(command.slot) {
        return Err(LapRfError::InvalidSlot(command.slot));
    }
    let channel = channels::resolve(&command.channel)?;

    encode_rf_setup(&RfSetupRecord {
        slot_index: command.slot,
        enabled: u16::from(command.enabled),
        channel: channel.channel,
        band: channel.band,
        threshold: command.threshold,
        gain: command.gain,
        frequency: channel.frequency,
    })
}

/// Change the gate state
pub fn set_gate_state(state: GateState) -> Result<Vec<u8>> {
    encode_state_control(&StateControlRecord {
        gate_state: state.code(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::laprf::framer::unescape;

    fn hex_of(bytes: Result<Vec<u8>>) -> String {
        hex::encode(bytes.unwrap())
    }

    #[test]
    fn test_get_rtc_time() {
        assert_eq!(hex_of(get_rtc_time()), "5a0a0096e30cda02005b");
    }

    #[test]
    fn test_min_lap_time_commands() {
        assert_eq!(hex_of(get_min_lap_time()), "5a0e00e07a07da2604000000005b");
        assert_eq!(hex_of(set_min_lap_time(6000)), "5a0e00a40507da2604701700005b");
    }

    #[test]
    fn test_set_status_interval() {
        assert_eq!(hex_of(set_status_interval(250)), "5a0c001a0707da2202fa005b");
    }

    #[test]
    fn test_get_rf_setup_single_slot_escapes_crc() {
        // CRC low byte is 0x5A and must be escaped
        let wire = get_rf_setup(Some(1)).unwrap();
        assert_eq!(hex::encode(&wire), "5a0b00195c9a02da0101015b");
        assert_eq!(hex::encode(unescape(&wire).unwrap()), "5a0b00195a02da0101015b");
    }

    #[test]
    fn test_get_rf_setup_all_slots() {
        assert_eq!(
            hex_of(get_rf_setup(None)),
            "5a2000e01e02da0101010101020101030101040101050101060101070101085b"
        );
    }

    #[test]
    fn test_get_rf_setup_invalid_slot() {
        assert!(matches!(get_rf_setup(Some(0)), Err(LapRfError::InvalidSlot(0))));
        assert!(matches!(get_rf_setup(Some(9)), Err(LapRfError::InvalidSlot(9))));
    }

    #[test]
    fn test_set_rf_setup_defaults() {
        let command = RfSetupCommand::new(1, "f2");
        assert_eq!(command.gain, 51);
        assert_eq!(command.threshold, 900.0);
        assert!(command.enabled);

        assert_eq!(
            hex_of(set_rf_setup(&command)),
            "5a2500a75c9b02da01010120020100210202002202010023040000614424023300250280165b"
        );
    }

    #[test]
    fn test_rf_setup_command_from_config() {
        let config = RfSetupConfig::default();
        assert_eq!(RfSetupCommand::from_config(1, "F2", &config), RfSetupCommand::new(1, "F2"));

        let config = RfSetupConfig {
            gain: 58,
            threshold: 1100.0,
            enabled: false,
        };
        let command = RfSetupCommand::from_config(3, "R1", &config);
        assert_eq!(command.gain, 58);
        assert_eq!(command.threshold, 1100.0);
        assert!(!command.enabled);
        assert!(set_rf_setup(&command).is_ok());
    }

    #[test]
    fn test_set_rf_setup_unknown_channel() {
        let err = set_rf_setup(&RfSetupCommand::new(1, "Q9")).unwrap_err();
        assert!(matches!(err, LapRfError::UnknownChannel(_)));
    }

    #[test]
    fn test_set_gate_state() {
        assert_eq!(hex_of(set_gate_state(GateState::Active)), "5a0b00130004da2001015b");
    }

    #[test]
    fn test_named_field_checks() {
        let mut encoder = RecordEncoder::start(RecordType::Settings).unwrap();

        let err = encoder.named("minLapTime", 6000u16).unwrap_err();
        assert!(matches!(
            err,
            LapRfError::TypeMismatch {
                field: "minLapTime",
                ..
            }
        ));

        let err = encoder.named("lapCount", 1u8).unwrap_err();
        assert!(matches!(err, LapRfError::UnknownField { record: "settings", .. }));
    }

    #[test]
    fn test_unsupported_record_has_no_named_fields() {
        let mut encoder = RecordEncoder::start(RecordType::Descriptor).unwrap();
        assert!(encoder.named("slotIndex", 1u8).is_err());
    }

    #[test]
    fn test_record_overflow_is_out_of_range() {
        let mut encoder = RecordEncoder::start(RecordType::Settings).unwrap();
        let mut result = Ok(());
        for _ in 0..200 {
            if let Err(e) = encoder.field(0x26, Number::U32(0)) {
                result = Err(e);
                break;
            }
        }
        assert!(matches!(result, Err(LapRfError::OutOfRange { .. })));
    }

    #[test]
    fn test_interleaved_encoders_do_not_share_buffers() {
        let rf_setup = RfSetupRecord {
            slot_index: 1,
            enabled: 1,
            channel: 2,
            band: 1,
            threshold: 900.0,
            gain: 51,
            frequency: 5760,
        };

        let mut first = RecordEncoder::start(RecordType::RfSetup).unwrap();
        let mut second = RecordEncoder::start(RecordType::Settings).unwrap();
        first.named("slotIndex", 1u8).unwrap();
        second.named("minLapTime", 6000u32).unwrap();
        first.named("enabled", 1u16).unwrap();
        first.named("channel", 2u16).unwrap();
        first.named("band", 1u16).unwrap();
        first.named("threshold", 900.0f32).unwrap();
        first.named("gain", 51u16).unwrap();
        first.named("frequency", 5760u16).unwrap();

        let settings = second.finish().unwrap();
        let rf = first.finish().unwrap();

        assert_eq!(rf, encode_rf_setup(&rf_setup).unwrap());
        assert_eq!(hex::encode(settings), "5a0e00a40507da2604701700005b");
    }

    #[test]
    fn test_encode_status_rejects_bad_slot() {
        let mut slots = std::collections::BTreeMap::new();
        slots.insert(9, crate::laprf::record::StatusSlot { last_rssi: 1.0 });
        let status = StatusRecord {
            flags: 0,
            battery_voltage: 4141,
            gate_state: 1,
            detection_count: 0,
            slots,
        };
        assert!(matches!(encode_status(&status), Err(LapRfError::InvalidSlot(9))));
    }
}
