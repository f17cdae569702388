//! # LapRF Record Decoder
//!
//! Validates and parses incoming records into typed [`Record`] values.
//!
//! Each record walks a fixed sequence of stages:
//!
//! ```text
//! Framed -> LengthChecked -> CrcChecked -> TypeRead -> FieldLoop -> Decoded
//!    \            \               \            \            \
//!     +------------+---------------+------------+------------+--> Failed
//! ```
//!
//! A failure ends that record only; [`decode_packet`] carries on with the
//! next record in the packet.

use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::error::{DecodeWarning, FramingError, LapRfError, Result};

use super::crc;
use super::cursor::ByteCursor;
use super::framer::split_records;
use super::number::is_legal_width;
use super::protocol::{
    is_valid_slot, RecordType, EOR, FIELDS_OFFSET, LENGTH_OFFSET, MAX_RECORD_LEN, MAX_SLOTS,
    MIN_RECORD_LEN, RECORD_TYPE_OFFSET, SLOT_INDEX_SIGNATURE, SOR,
};
use super::record::{FieldValues, Record, SlotGroups};
use super::schema::{FieldRole, RecordSchema, SchemaRegistry};

/// Decode stage, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Framed,
    LengthChecked,
    CrcChecked,
    TypeRead,
    FieldLoop,
    Decoded,
    Failed,
}

/// A decoded record with any non-fatal findings
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub record: Record,
    pub warnings: Vec<DecodeWarning>,
}

/// Decoder limits and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Longest unescaped record accepted
    pub max_record_len: usize,
    /// Log skipped unknown fields at warn level rather than debug
    pub warn_unknown_fields: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_record_len: MAX_RECORD_LEN,
            warn_unknown_fields: true,
        }
    }
}

/// Record decoder bound to a schema registry
///
/// Holds no per-record state; every call works on its own cursor.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'r> {
    registry: &'r SchemaRegistry,
    options: DecodeOptions,
}

impl Default for Decoder<'static> {
    fn default() -> Self {
        Self::new(DecodeOptions::default())
    }
}

impl Decoder<'static> {
    /// Decoder over the built-in protocol tables
    pub fn new(options: DecodeOptions) -> Self {
        Self::with_registry(SchemaRegistry::global(), options)
    }
}

impl<'r> Decoder<'r> {
    pub fn with_registry(registry: &'r SchemaRegistry, options: DecodeOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    /// Decode one unescaped record (SOR through EOR)
    ///
    /// # Arguments
    ///
    /// * `record` - Unescaped record bytes, as produced by the framer
    ///
    /// # Returns
    ///
    /// * `Result<Decoded>` - Typed record and warnings
    ///
    /// # Errors
    ///
    /// Returns the error that moved the record to `Failed`: framing, length,
    /// CRC, record type, field size, slot or completeness failures
    pub fn decode_record(&self, record: &[u8]) -> Result<Decoded> {
        let mut stage = Stage::Framed;
        let result = self.run(record, &mut stage);

        match &result {
            Ok(decoded) => {
                transition(&mut stage, Stage::Decoded);
                debug!(
                    "Decoded {} record ({} bytes, {} warnings)",
                    decoded.record.record_type().name(),
                    record.len(),
                    decoded.warnings.len()
                );
            }
            Err(e) => {
                debug!("Record failed at {:?}: {}", stage, e);
                transition(&mut stage, Stage::Failed);
            }
        }

        result
    }

    /// Split a packet and decode each record independently
    pub fn decode_packet(&self, packet: &[u8]) -> Vec<Result<Decoded>> {
        split_records(packet)
            .into_iter()
            .map(|framed| framed.and_then(|record| self.decode_record(&record)))
            .collect()
    }

    fn run(&self, record: &[u8], stage: &mut Stage) -> Result<Decoded> {
        check_frame(record, self.options.max_record_len)?;
        let mut cursor = ByteCursor::new(record);

        cursor.seek(LENGTH_OFFSET)?;
        let declared = usize::from(cursor.read_u16()?);
        if declared != record.len() {
            return Err(LapRfError::LengthMismatch {
                declared,
                actual: record.len(),
            });
        }
        transition(stage, Stage::LengthChecked);

        crc::verify(record)?;
        transition(stage, Stage::CrcChecked);

        cursor.seek(RECORD_TYPE_OFFSET)?;
        let code = cursor.read_u16()?;
        let record_type = RecordType::from_code(code).ok_or(LapRfError::UnknownRecordType(code))?;
        let schema = self
            .registry
            .schema(record_type)
            .ok_or(LapRfError::UnsupportedRecordType(record_type))?;
        transition(stage, Stage::TypeRead);

        transition(stage, Stage::FieldLoop);
        let mut fields = FieldLoop::new(schema, self.options.warn_unknown_fields);
        // The cursor stops short of the EOR so truncated values read out of range
        fields.run(&mut ByteCursor::new(&record[..record.len() - 1]))?;
        fields.finish()
    }
}

fn transition(stage: &mut Stage, next: Stage) {
    trace!("{:?} -> {:?}", stage, next);
    *stage = next;
}

fn check_frame(record: &[u8], max_record_len: usize) -> Result<()> {
    if record.len() < MIN_RECORD_LEN {
        return Err(FramingError::TooShort { len: record.len() }.into());
    }
    if record.len() > max_record_len {
        return Err(FramingError::TooLong {
            len: record.len(),
            max: max_record_len,
        }
        .into());
    }

    let first = record[0];
    let last = record[record.len() - 1];
    if first != SOR || last != EOR {
        return Err(FramingError::BadDelimiter { first, last }.into());
    }

    Ok(())
}

/// Field-loop state for one record
struct FieldLoop<'s> {
    schema: &'s RecordSchema,
    warn_unknown: bool,
    fields: FieldValues,
    slots: SlotGroups,
    current_slot: Option<u8>,
    warnings: Vec<DecodeWarning>,
}

impl<'s> FieldLoop<'s> {
    fn new(schema: &'s RecordSchema, warn_unknown: bool) -> Self {
        Self {
            schema,
            warn_unknown,
            fields: FieldValues::new(),
            slots: BTreeMap::new(),
            current_slot: None,
            warnings: Vec::new(),
        }
    }

    fn run(&mut self, cursor: &mut ByteCursor<&[u8]>) -> Result<()> {
        cursor.seek(FIELDS_OFFSET)?;

        while cursor.remaining() > 0 {
            let signature = cursor.read_u8()?;
            if signature == EOR {
                break;
            }
            let size = cursor.read_u8()?;
            self.field(cursor, signature, size)?;
        }

        Ok(())
    }

    fn field(&mut self, cursor: &mut ByteCursor<&[u8]>, signature: u8, size: u8) -> Result<()> {
        let Some(descriptor) = self.schema.field_by_signature(signature).copied() else {
            if !is_legal_width(size) {
                return Err(self.size_mismatch(signature, None, size));
            }
            cursor.skip(usize::from(size))?;
            self.unknown_field(signature, size);
            return Ok(());
        };

        if size != descriptor.byte_width() {
            return Err(self.size_mismatch(signature, Some(descriptor.byte_width()), size));
        }

        let value = cursor.read(descriptor.number_type)?;
        if let Some(raw) = value.as_u64().filter(|_| value.exceeds_safe_integer()) {
            warn!(
                "Field {} of record {} holds {}, above 2^53 - 1",
                descriptor.name,
                self.schema.name(),
                raw
            );
            self.warnings.push(DecodeWarning::PrecisionLoss {
                field: descriptor.name,
                value: raw,
            });
        }

        match descriptor.role {
            FieldRole::Field { .. } => {
                if descriptor.signature == SLOT_INDEX_SIGNATURE {
                    check_slot(value.as_u64())?;
                }
                self.fields.insert(descriptor.name, value);
            }
            FieldRole::SlotIndex => {
                let slot = check_slot(value.as_u64())?;
                self.slots.entry(slot).or_default();
                self.current_slot = Some(slot);
            }
            FieldRole::SlotValue => {
                let slot = self
                    .current_slot
                    .ok_or(LapRfError::MissingSlotIndex { signature })?;
                self.slots.entry(slot).or_default().insert(descriptor.name, value);
            }
        }

        Ok(())
    }

    fn unknown_field(&mut self, signature: u8, size: u8) {
        let record = self.schema.name();
        if self.warn_unknown {
            warn!("Skipping unknown field 0x{:02X} ({} bytes) in {} record", signature, size, record);
        } else {
            debug!("Skipping unknown field 0x{:02X} ({} bytes) in {} record", signature, size, record);
        }
        self.warnings.push(DecodeWarning::UnknownFieldSignature {
            record,
            signature,
            size,
        });
    }

    fn size_mismatch(&self, signature: u8, expected: Option<u8>, actual: u8) -> LapRfError {
        LapRfError::SizeMismatch {
            record_type: self.schema.code(),
            signature,
            expected,
            actual,
        }
    }

    /// Completeness check, then typing
    fn finish(self) -> Result<Decoded> {
        let mut missing: Vec<String> = self
            .schema
            .fields()
            .filter(|d| d.is_required() && !self.fields.contains(d.name))
            .map(|d| d.name.to_string())
            .collect();

        if self.schema.has_slots() {
            for slot in 1..=MAX_SLOTS {
                let values = self.slots.get(&slot);
                for descriptor in self.schema.slot_fields() {
                    if descriptor.role != FieldRole::SlotValue {
                        continue;
                    }
                    if !values.map_or(false, |v| v.contains(descriptor.name)) {
                        missing.push(format!("slot {} {}", slot, descriptor.name));
                    }
                }
            }
        }

        if !missing.is_empty() {
            return Err(LapRfError::IncompleteRecord {
                record: self.schema.name(),
                missing,
            });
        }

        let record = Record::from_fields(self.schema.record_type(), &self.fields, &self.slots)?;
        Ok(Decoded {
            record,
            warnings: self.warnings,
        })
    }
}

fn check_slot(value: Option<u64>) -> Result<u8> {
    let slot = value.and_then(|v| u8::try_from(v).ok()).unwrap_or(0);
    if !is_valid_slot(slot) {
        return Err(LapRfError::InvalidSlot(slot));
    }
    Ok(slot)
}

/// Decode one unescaped record with default options
pub fn decode_record(record: &[u8]) -> Result<Decoded> {
    Decoder::default().decode_record(record)
}

/// Split and decode a packet with default options
///
/// # Examples
///
/// ```no_run
/// use laprf_codec::laprf::decoder::decode_packet;
///
/// let packet = [0x5A, 0x0E, 0x00, 0xA4, 0x05, 0x07, 0xDA, 0x26, 0x04, 0x70, 0x17, 0x00, 0x00, 0x5B];
/// for result in decode_packet(&packet) {
///     match result {
///         Ok(decoded) => println!("{:?}", decoded.record),
///         Err(e) => eprintln!("{}", e),
///     }
/// }
/// ```
pub fn decode_packet(packet: &[u8]) -> Vec<Result<Decoded>> {
    Decoder::default().decode_packet(packet)
}
