//! # LapRF Records
//!
//! Typed values of the records a timer sends and accepts, plus the
//! name-keyed field collection the decoder fills before typing.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{LapRfError, Result};

use super::number::{FromNumber, Number};
use super::protocol::RecordType;

/// Field values of one record (or one slot group), keyed by schema name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues {
    values: BTreeMap<&'static str, Number>,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, returning the one it replaced
    pub fn insert(&mut self, name: &'static str, value: Number) -> Option<Number> {
        self.values.insert(name, value)
    }

    pub fn get(&self, name: &str) -> Option<Number> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Number)> + '_ {
        self.values.iter().map(|(&name, &value)| (name, value))
    }

    /// Typed value of an optional field
    pub fn optional<T: FromNumber>(&self, record: RecordType, name: &'static str) -> Result<Option<T>> {
        match self.get(name) {
            None => Ok(None),
            Some(number) => T::from_number(number).map(Some).ok_or_else(|| {
                LapRfError::Schema(format!(
                    "field {} of record {} holds {:?}",
                    name,
                    record.name(),
                    number.number_type()
                ))
            }),
        }
    }

    /// Typed value of a required field
    pub fn required<T: FromNumber>(&self, record: RecordType, name: &'static str) -> Result<T> {
        self.optional(record, name)?
            .ok_or_else(|| LapRfError::IncompleteRecord {
                record: record.name(),
                missing: vec![name.to_string()],
            })
    }
}

/// Slot groups of a record, keyed by slot index
pub type SlotGroups = BTreeMap<u8, FieldValues>;

/// RF setup of one receiver slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RfSetupRecord {
    pub slot_index: u8,
    pub enabled: u16,
    pub channel: u16,
    pub band: u16,
    pub threshold: f32,
    pub gain: u16,
    pub frequency: u16,
}

/// RSSI statistics of one receiver slot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RssiRecord {
    pub slot_index: u8,
    pub min_rssi: f32,
    pub max_rssi: f32,
    pub mean_rssi: f32,
    /// Undocumented u32 at signature 0x23
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown1: Option<u32>,
    /// Undocumented u32 at signature 0x26
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown2: Option<u32>,
}

/// Timer settings; a device reply carries only the settings that were requested
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRecord {
    /// Status record interval in milliseconds (the device's update period)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_interval: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_settings: Option<u8>,
    /// Minimum lap time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_lap_time: Option<u32>,
}

/// A pilot passing the gate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassingRecord {
    pub slot_index: u8,
    /// Device real-time clock, microseconds
    pub rtc_time: u64,
    pub decoder_id: u32,
    pub passing_number: u32,
    pub peak_height: u16,
    pub flags: u16,
}

/// Last RSSI reading of one slot in a status record
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSlot {
    pub last_rssi: f32,
}

/// Periodic device status
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub flags: u16,
    /// Millivolts
    pub battery_voltage: u16,
    pub gate_state: u8,
    pub detection_count: u32,
    /// Keyed by slot index 1..=8
    pub slots: BTreeMap<u8, StatusSlot>,
}

/// Device real-time clock reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRecord {
    pub rtc_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_rtc_time: Option<u64>,
}

/// Gate state command / echo
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateControlRecord {
    pub gate_state: u8,
}

/// A decoded LapRF record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Record {
    RfSetup(RfSetupRecord),
    Rssi(RssiRecord),
    Settings(SettingsRecord),
    Passing(PassingRecord),
    Status(StatusRecord),
    Time(TimeRecord),
    StateControl(StateControlRecord),
}

impl Record {
    pub fn record_type(&self) -> RecordType {
        match self {
            Record::RfSetup(_) => RecordType::RfSetup,
            Record::Rssi(_) => RecordType::Rssi,
            Record::Settings(_) => RecordType::Settings,
            Record::Passing(_) => RecordType::Passing,
            Record::Status(_) => RecordType::Status,
            Record::Time(_) => RecordType::Time,
            Record::StateControl(_) => RecordType::StateControl,
        }
    }

    /// Build a typed record from decoded field values
    ///
    /// # Errors
    ///
    /// Returns `IncompleteRecord` for a missing required field and
    /// `UnsupportedRecordType` for types without a typed form
    pub fn from_fields(record_type: RecordType, fields: &FieldValues, slots: &SlotGroups) -> Result<Self> {
        let t = record_type;
        Ok(match record_type {
            RecordType::RfSetup => Record::RfSetup(RfSetupRecord {
                slot_index: fields.required(t, "slotIndex")?,
                enabled: fields.required(t, "enabled")?,
                channel: fields.required(t, "channel")?,
                band: fields.required(t, "band")?,
                threshold: fields.required(t, "threshold")?,
                gain: fields.required(t, "gain")?,
                frequency: fields.required(t, "frequency")?,
            }),
            RecordType::Rssi => Record::Rssi(RssiRecord {
                slot_index: fields.required(t, "slotIndex")?,
                min_rssi: fields.required(t, "minRssi")?,
                max_rssi: fields.required(t, "maxRssi")?,
                mean_rssi: fields.required(t, "meanRssi")?,
                unknown1: fields.optional(t, "unknown1")?,
                unknown2: fields.optional(t, "unknown2")?,
            }),
            RecordType::Settings => Record::Settings(SettingsRecord {
                status_interval: fields.optional(t, "statusInterval")?,
                save_settings: fields.optional(t, "saveSettings")?,
                min_lap_time: fields.optional(t, "minLapTime")?,
            }),
            RecordType::Passing => Record::Passing(PassingRecord {
                slot_index: fields.required(t, "slotIndex")?,
                rtc_time: fields.required(t, "rtcTime")?,
                decoder_id: fields.required(t, "decoderId")?,
                passing_number: fields.required(t, "passingNumber")?,
                peak_height: fields.required(t, "peakHeight")?,
                flags: fields.required(t, "flags")?,
            }),
            RecordType::Status => {
                let mut status_slots = BTreeMap::new();
                for (&slot, values) in slots {
                    status_slots.insert(
                        slot,
                        StatusSlot {
                            last_rssi: values.required(t, "lastRssi")?,
                        },
                    );
                }
                Record::Status(StatusRecord {
                    flags: fields.required(t, "flags")?,
                    battery_voltage: fields.required(t, "batteryVoltage")?,
                    gate_state: fields.required(t, "gateState")?,
                    detection_count: fields.required(t, "detectionCount")?,
                    slots: status_slots,
                })
            }
            RecordType::Time => Record::Time(TimeRecord {
                rtc_time: fields.required(t, "rtcTime")?,
                time_rtc_time: fields.optional(t, "timeRtcTime")?,
            }),
            RecordType::StateControl => Record::StateControl(StateControlRecord {
                gate_state: fields.required(t, "gateState")?,
            }),
            RecordType::Descriptor | RecordType::Error => {
                return Err(LapRfError::UnsupportedRecordType(record_type))
            }
        })
    }

    /// Record-level fields in wire order, as (schema name, value)
    pub fn fields(&self) -> Vec<(&'static str, Number)> {
        let mut fields: Vec<(&'static str, Number)> = Vec::new();
        let mut push = |name: &'static str, value: Option<Number>| {
            if let Some(value) = value {
                fields.push((name, value));
            }
        };

        match self {
            Record::RfSetup(r) => {
                push("slotIndex", Some(r.slot_index.into()));
                push("enabled", Some(r.enabled.into()));
                push("channel", Some(r.channel.into()));
                push("band", Some(r.band.into()));
                push("threshold", Some(r.threshold.into()));
                push("gain", Some(r.gain.into()));
                push("frequency", Some(r.frequency.into()));
            }
            Record::Rssi(r) => {
                push("slotIndex", Some(r.slot_index.into()));
                push("minRssi", Some(r.min_rssi.into()));
                push("maxRssi", Some(r.max_rssi.into()));
                push("meanRssi", Some(r.mean_rssi.into()));
                push("unknown1", r.unknown1.map(Number::from));
                push("unknown2", r.unknown2.map(Number::from));
            }
            Record::Settings(r) => {
                push("statusInterval", r.status_interval.map(Number::from));
                push("saveSettings", r.save_settings.map(Number::from));
                push("minLapTime", r.min_lap_time.map(Number::from));
            }
            Record::Passing(r) => {
                push("slotIndex", Some(r.slot_index.into()));
                push("rtcTime", Some(r.rtc_time.into()));
                push("decoderId", Some(r.decoder_id.into()));
                push("passingNumber", Some(r.passing_number.into()));
                push("peakHeight", Some(r.peak_height.into()));
                push("flags", Some(r.flags.into()));
            }
            Record::Status(r) => {
                push("flags", Some(r.flags.into()));
                push("batteryVoltage", Some(r.battery_voltage.into()));
                push("gateState", Some(r.gate_state.into()));
                push("detectionCount", Some(r.detection_count.into()));
            }
            Record::Time(r) => {
                push("rtcTime", Some(r.rtc_time.into()));
                push("timeRtcTime", r.time_rtc_time.map(Number::from));
            }
            Record::StateControl(r) => {
                push("gateState", Some(r.gate_state.into()));
            }
        }

        fields
    }

    /// Slot groups in slot order, each as (slot index, slot values)
    pub fn slot_groups(&self) -> Vec<(u8, Vec<(&'static str, Number)>)> {
        match self {
            Record::Status(r) => r
                .slots
                .iter()
                .map(|(&slot, reading)| (slot, vec![("lastRssi", Number::from(reading.last_rssi))]))
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rf_setup_fields() -> FieldValues {
        let mut fields = FieldValues::new();
        fields.insert("slotIndex", Number::U8(1));
        fields.insert("enabled", Number::U16(1));
        fields.insert("channel", Number::U16(2));
        fields.insert("band", Number::U16(1));
        fields.insert("threshold", Number::F32(1100.0));
        fields.insert("gain", Number::U16(58));
        fields.insert("frequency", Number::U16(5760));
        fields
    }

    #[test]
    fn test_rf_setup_from_fields() {
        let record = Record::from_fields(RecordType::RfSetup, &rf_setup_fields(), &SlotGroups::new()).unwrap();
        assert_eq!(
            record,
            Record::RfSetup(RfSetupRecord {
                slot_index: 1,
                enabled: 1,
                channel: 2,
                band: 1,
                threshold: 1100.0,
                gain: 58,
                frequency: 5760,
            })
        );
    }

    #[test]
    fn test_missing_required_field() {
        let mut fields = rf_setup_fields();
        fields.values.remove("gain");

        let err = Record::from_fields(RecordType::RfSetup, &fields, &SlotGroups::new()).unwrap_err();
        assert!(matches!(err, LapRfError::IncompleteRecord { record: "rfSetup", .. }));
    }

    #[test]
    fn test_settings_fields_are_optional() {
        let mut fields = FieldValues::new();
        fields.insert("minLapTime", Number::U32(6000));

        let record = Record::from_fields(RecordType::Settings, &fields, &SlotGroups::new()).unwrap();
        assert_eq!(
            record,
            Record::Settings(SettingsRecord {
                min_lap_time: Some(6000),
                ..Default::default()
            })
        );
        assert_eq!(record.fields(), vec![("minLapTime", Number::U32(6000))]);
    }

    #[test]
    fn test_wrong_number_type_is_rejected() {
        let mut fields = rf_setup_fields();
        fields.insert("gain", Number::U32(58));
        assert!(Record::from_fields(RecordType::RfSetup, &fields, &SlotGroups::new()).is_err());
    }

    #[test]
    fn test_unsupported_types() {
        let err = Record::from_fields(RecordType::Descriptor, &FieldValues::new(), &SlotGroups::new()).unwrap_err();
        assert!(matches!(err, LapRfError::UnsupportedRecordType(RecordType::Descriptor)));
    }

    #[test]
    fn test_status_slot_groups() {
        let mut slots = BTreeMap::new();
        slots.insert(1, StatusSlot { last_rssi: 829.0 });
        slots.insert(2, StatusSlot { last_rssi: 830.0 });
        let record = Record::Status(StatusRecord {
            flags: 0,
            battery_voltage: 4141,
            gate_state: 1,
            detection_count: 0,
            slots,
        });

        let groups = record.slot_groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1], (2, vec![("lastRssi", Number::F32(830.0))]));
        assert_eq!(record.fields().len(), 4);
    }

    #[test]
    fn test_record_serializes_with_type_tag() {
        let record = Record::Time(TimeRecord {
            rtc_time: 7_247_516_000,
            time_rtc_time: None,
        });
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"type": "time", "rtcTime": 7247516000u64}));
    }
}
