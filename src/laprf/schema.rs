//! # Schema Registry
//!
//! Static mapping between record types and their field descriptors.
//!
//! Lookups by record code (decode path) go through a `match` on
//! [`RecordType`]; lookups by field signature index a 256-entry table per
//! record, so both are O(1). Lookups by name (encode path) use hash maps.
//! The tables are built once, on first use, and never mutated.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{LapRfError, Result};

use super::number::NumberType;
use super::protocol::{RecordType, SLOT_INDEX_SIGNATURE};

/// Where a field lives within its record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Record-level field, must be present when `required`
    Field { required: bool },
    /// Slot sub-group key, starts a new slot group
    SlotIndex,
    /// Value stored into the current slot group
    SlotValue,
}

/// One field of a record schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub signature: u8,
    pub name: &'static str,
    pub number_type: NumberType,
    pub role: FieldRole,
}

impl FieldDescriptor {
    const fn required(signature: u8, number_type: NumberType, name: &'static str) -> Self {
        Self {
            signature,
            name,
            number_type,
            role: FieldRole::Field { required: true },
        }
    }

    const fn optional(signature: u8, number_type: NumberType, name: &'static str) -> Self {
        Self {
            signature,
            name,
            number_type,
            role: FieldRole::Field { required: false },
        }
    }

    const fn slot(signature: u8, number_type: NumberType, name: &'static str) -> Self {
        let role = if signature == SLOT_INDEX_SIGNATURE {
            FieldRole::SlotIndex
        } else {
            FieldRole::SlotValue
        };
        Self {
            signature,
            name,
            number_type,
            role,
        }
    }

    pub fn is_slot_field(&self) -> bool {
        matches!(self.role, FieldRole::SlotIndex | FieldRole::SlotValue)
    }

    pub fn is_required(&self) -> bool {
        matches!(self.role, FieldRole::Field { required: true })
    }

    /// Byte width the size byte must declare for this field
    pub fn byte_width(&self) -> u8 {
        self.number_type.byte_width() as u8
    }
}

/// Static definition of one record type's fields
#[derive(Debug, Clone, Copy)]
pub struct RecordDef {
    pub record_type: RecordType,
    pub fields: &'static [FieldDescriptor],
    pub slot_fields: &'static [FieldDescriptor],
}

use FieldDescriptor as F;
use NumberType::{F32, U16, U32, U64, U8};

/// Protocol field tables
///
/// RSSI fields 0x24 (customRate) and 0x25 (packetRate) have no known wire
/// type and are left to the unknown-signature path.
pub const PROTOCOL_TABLES: &[RecordDef] = &[
    RecordDef {
        record_type: RecordType::Rssi,
        fields: &[
            F::required(0x01, U8, "slotIndex"),
            F::required(0x20, F32, "minRssi"),
            F::required(0x21, F32, "maxRssi"),
            F::required(0x22, F32, "meanRssi"),
            F::optional(0x23, U32, "unknown1"),
            F::optional(0x26, U32, "unknown2"),
        ],
        slot_fields: &[],
    },
    RecordDef {
        record_type: RecordType::RfSetup,
        fields: &[
            F::required(0x01, U8, "slotIndex"),
            F::required(0x20, U16, "enabled"),
            F::required(0x21, U16, "channel"),
            F::required(0x22, U16, "band"),
            F::required(0x23, F32, "threshold"),
            F::required(0x24, U16, "gain"),
            F::required(0x25, U16, "frequency"),
        ],
        slot_fields: &[],
    },
    RecordDef {
        record_type: RecordType::StateControl,
        fields: &[F::required(0x20, U8, "gateState")],
        slot_fields: &[],
    },
    RecordDef {
        record_type: RecordType::Settings,
        fields: &[
            F::optional(0x22, U16, "statusInterval"),
            F::optional(0x25, U8, "saveSettings"),
            F::optional(0x26, U32, "minLapTime"),
        ],
        slot_fields: &[],
    },
    RecordDef {
        record_type: RecordType::Passing,
        fields: &[
            F::required(0x01, U8, "slotIndex"),
            F::required(0x02, U64, "rtcTime"),
            F::required(0x20, U32, "decoderId"),
            F::required(0x21, U32, "passingNumber"),
            F::required(0x22, U16, "peakHeight"),
            F::required(0x23, U16, "flags"),
        ],
        slot_fields: &[],
    },
    RecordDef {
        record_type: RecordType::Status,
        fields: &[
            F::required(0x03, U16, "flags"),
            F::required(0x21, U16, "batteryVoltage"),
            F::required(0x23, U8, "gateState"),
            F::required(0x24, U32, "detectionCount"),
        ],
        slot_fields: &[F::slot(0x01, U8, "slotIndex"), F::slot(0x22, F32, "lastRssi")],
    },
    RecordDef {
        record_type: RecordType::Time,
        fields: &[
            F::required(0x02, U64, "rtcTime"),
            F::optional(0x20, U64, "timeRtcTime"),
        ],
        slot_fields: &[],
    },
];

/// Indexed schema of one record type
#[derive(Debug)]
pub struct RecordSchema {
    record_type: RecordType,
    descriptors: Vec<FieldDescriptor>,
    by_signature: [Option<u8>; 256],
    by_name: HashMap<&'static str, usize>,
}

impl RecordSchema {
    fn build(def: &RecordDef) -> Result<Self> {
        let record_name = def.record_type.name();
        let mut descriptors = Vec::with_capacity(def.fields.len() + def.slot_fields.len());
        let mut by_signature = [None; 256];
        let mut by_name = HashMap::new();

        for descriptor in def.fields.iter().chain(def.slot_fields) {
            let index = descriptors.len();
            let slot = &mut by_signature[descriptor.signature as usize];
            if slot.is_some() {
                return Err(LapRfError::Schema(format!(
                    "duplicate signature 0x{:02X} in record {}",
                    descriptor.signature, record_name
                )));
            }
            *slot = Some(index as u8);

            if by_name.insert(descriptor.name, index).is_some() {
                return Err(LapRfError::Schema(format!(
                    "duplicate field name '{}' in record {}",
                    descriptor.name, record_name
                )));
            }

            descriptors.push(*descriptor);
        }

        Ok(Self {
            record_type: def.record_type,
            descriptors,
            by_signature,
            by_name,
        })
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn code(&self) -> u16 {
        self.record_type.code()
    }

    pub fn name(&self) -> &'static str {
        self.record_type.name()
    }

    pub fn field_by_signature(&self, signature: u8) -> Option<&FieldDescriptor> {
        self.by_signature[signature as usize].map(|index| &self.descriptors[index as usize])
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|&index| &self.descriptors[index])
    }

    /// Record-level fields
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.descriptors.iter().filter(|d| !d.is_slot_field())
    }

    /// Per-slot sub-group fields
    pub fn slot_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.descriptors.iter().filter(|d| d.is_slot_field())
    }

    pub fn has_slots(&self) -> bool {
        self.descriptors.iter().any(FieldDescriptor::is_slot_field)
    }
}

/// All record schemas, indexed by record type and by name
#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: Vec<RecordSchema>,
    by_type: HashMap<RecordType, usize>,
    by_name: HashMap<&'static str, usize>,
}

static GLOBAL_REGISTRY: OnceLock<SchemaRegistry> = OnceLock::new();

impl SchemaRegistry {
    /// Build a registry from record definitions
    ///
    /// # Errors
    ///
    /// Returns `Schema` if a record type is registered twice, or a record
    /// repeats a field signature or name
    pub fn from_defs(defs: &[RecordDef]) -> Result<Self> {
        let mut schemas = Vec::with_capacity(defs.len());
        let mut by_type = HashMap::new();
        let mut by_name = HashMap::new();

        for def in defs {
            let index = schemas.len();
            if by_type.insert(def.record_type, index).is_some() {
                return Err(LapRfError::Schema(format!(
                    "record {} registered twice",
                    def.record_type.name()
                )));
            }
            by_name.insert(def.record_type.name(), index);
            schemas.push(RecordSchema::build(def)?);
        }

        Ok(Self {
            schemas,
            by_type,
            by_name,
        })
    }

    /// Process-wide registry of the protocol tables
    ///
    /// # Panics
    ///
    /// Panics on first use if the built-in tables are inconsistent, which is
    /// a programming error rather than a runtime condition.
    pub fn global() -> &'static SchemaRegistry {
        GLOBAL_REGISTRY.get_or_init(|| match SchemaRegistry::from_defs(PROTOCOL_TABLES) {
            Ok(registry) => registry,
            Err(e) => panic!("invalid built-in LapRF schema: {}", e),
        })
    }

    pub fn schema(&self, record_type: RecordType) -> Option<&RecordSchema> {
        self.by_type.get(&record_type).map(|&index| &self.schemas[index])
    }

    pub fn schema_by_code(&self, code: u16) -> Option<&RecordSchema> {
        RecordType::from_code(code).and_then(|record_type| self.schema(record_type))
    }

    pub fn schema_by_name(&self, name: &str) -> Option<&RecordSchema> {
        self.by_name.get(name).map(|&index| &self.schemas[index])
    }

    /// Field lookup on the decode path
    pub fn field_by_code(&self, record_type: RecordType, signature: u8) -> Option<&FieldDescriptor> {
        self.schema(record_type)?.field_by_signature(signature)
    }

    /// Field lookup on the encode path
    pub fn field_by_name(&self, record_name: &str, field_name: &str) -> Option<&FieldDescriptor> {
        self.schema_by_name(record_name)?.field_by_name(field_name)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &RecordSchema> {
        self.schemas.iter()
    }
}
