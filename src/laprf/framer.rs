//! # Record Framing
//!
//! Splits raw transport data into records and handles escaping of the
//! reserved bytes (SOR, EOR, ESC).
//!
//! On the wire, any reserved byte inside a record other than the leading SOR
//! and trailing EOR is sent as `ESC, byte + ESC_OFFSET`.
//!
//! [`split_records`] handles one self-contained packet. [`StreamFramer`] keeps
//! a partial record between transport chunks for links that split records
//! across reads (serial, Bluetooth).

use bytes::{Buf, BytesMut};
use tracing::{debug, warn};

use crate::error::{FramingError, LapRfError, Result};

use super::protocol::{EOR, ESC, ESC_OFFSET, MAX_RECORD_LEN, SOR};

fn is_reserved(byte: u8) -> bool {
    byte == SOR || byte == EOR || byte == ESC
}

/// Escape a complete record for transmission
///
/// The first and last bytes are the structural SOR/EOR delimiters and are
/// emitted literally; every other reserved byte is escaped.
pub fn escape(plain: &[u8]) -> Vec<u8> {
    let mut output = Vec::with_capacity(plain.len() + plain.len() / 4);
    let last = plain.len().saturating_sub(1);

    for (offset, &byte) in plain.iter().enumerate() {
        if is_reserved(byte) && offset != 0 && offset != last {
            output.push(ESC);
            output.push(byte.wrapping_add(ESC_OFFSET));
        } else {
            output.push(byte);
        }
    }

    output
}

/// Remove escapes from a wire record, stopping at the first unescaped EOR
///
/// Bytes after the EOR are ignored.
///
/// # Errors
///
/// Returns `Framing(MissingEor)` if the input ends before an EOR
pub fn unescape(escaped: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(escaped.len());
    let mut is_escaped = false;

    for &byte in escaped {
        if is_escaped {
            is_escaped = false;
            output.push(byte.wrapping_sub(ESC_OFFSET));
        } else if byte == ESC {
            is_escaped = true;
        } else if byte == EOR {
            output.push(byte);
            return Ok(output);
        } else {
            output.push(byte);
        }
    }

    Err(FramingError::MissingEor.into())
}

/// Split a packet into unescaped records
///
/// Scans for SOR, then for the next EOR, and unescapes each `[SOR..=EOR]`
/// span. Noise before a SOR is skipped. A record cut short by a fresh SOR,
/// or a trailing SOR without EOR, is reported as `MissingEor` and its bytes
/// are dropped; scanning resumes at the fresh SOR. A non-empty packet
/// without any SOR yields a single `MissingSor`.
///
/// # Examples
///
/// ```no_run
/// use laprf_codec::laprf::framer::split_records;
///
/// let packet = [0x5A, 0x08, 0x00, 0x00, 0x00, 0x0C, 0xDA, 0x5B];
/// let records = split_records(&packet);
/// assert_eq!(records.len(), 1);
/// ```
pub fn split_records(packet: &[u8]) -> Vec<Result<Vec<u8>>> {
    let mut records = Vec::new();
    let mut position = 0;

    loop {
        let Some(start) = find(packet, SOR, position) else {
            if records.is_empty() && !packet.is_empty() {
                records.push(Err(FramingError::MissingSor.into()));
            }
            break;
        };

        let end = find(packet, EOR, start);

        // A fresh SOR before the EOR means the earlier record was cut short
        if let Some(next_start) = find(packet, SOR, start + 1) {
            if end.map_or(true, |end| next_start < end) {
                debug!("Record restarted before EOR, dropping {} bytes", next_start - start);
                records.push(Err(FramingError::MissingEor.into()));
                position = next_start;
                continue;
            }
        }

        let Some(end) = end else {
            debug!("Dropping {} trailing bytes without EOR", packet.len() - start);
            records.push(Err(FramingError::MissingEor.into()));
            break;
        };

        records.push(unescape(&packet[start..=end]));
        position = end + 1;
    }

    records
}

fn find(haystack: &[u8], needle: u8, from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .iter()
        .position(|&byte| byte == needle)
        .map(|offset| from + offset)
}

/// Reassembles records that arrive split across transport chunks
///
/// Bytes before a SOR are discarded. A partial record is kept until its EOR
/// arrives; if pending data grows past `max_pending` without completing a
/// record, the buffer is discarded and `Framing(Overflow)` is reported.
#[derive(Debug)]
pub struct StreamFramer {
    pending: BytesMut,
    max_pending: usize,
    records: u64,
    discarded_bytes: u64,
}

impl Default for StreamFramer {
    fn default() -> Self {
        Self::new(MAX_RECORD_LEN * 4)
    }
}

impl StreamFramer {
    /// Create a framer keeping at most `max_pending` unframed bytes
    pub fn new(max_pending: usize) -> Self {
        Self {
            pending: BytesMut::with_capacity(max_pending.min(MAX_RECORD_LEN * 4)),
            max_pending,
            records: 0,
            discarded_bytes: 0,
        }
    }

    /// Append a transport chunk and return every record it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Vec<u8>>> {
        self.pending.extend_from_slice(chunk);
        let mut records = Vec::new();

        loop {
            let Some(start) = find(&self.pending, SOR, 0) else {
                self.discard(self.pending.len());
                break;
            };
            self.discard(start);

            let next_start = find(&self.pending, SOR, 1);
            let end = find(&self.pending, EOR, 0);

            // A fresh SOR before the EOR means the earlier record was cut short
            if let Some(next_start) = next_start {
                if end.map_or(true, |end| next_start < end) {
                    debug!("Record restarted before EOR, dropping partial record");
                    records.push(Err(LapRfError::Framing(FramingError::MissingEor)));
                    self.discard(next_start);
                    continue;
                }
            }

            let Some(end) = end else {
                break;
            };

            let record = unescape(&self.pending[..=end]);
            self.pending.advance(end + 1);
            if record.is_ok() {
                self.records += 1;
            }
            records.push(record);
        }

        if self.pending.len() > self.max_pending {
            let pending = self.pending.len();
            warn!("Discarding {} pending bytes without a complete record", pending);
            self.discard(pending);
            records.push(Err(LapRfError::Framing(FramingError::Overflow { pending })));
        }

        records
    }

    /// Bytes held while waiting for the rest of a record
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Records successfully framed so far
    pub fn record_count(&self) -> u64 {
        self.records
    }

    /// Noise and overflow bytes thrown away so far
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn discard(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        debug!("Discarding {} bytes outside a record", count);
        self.pending.advance(count);
        self.discarded_bytes += count as u64;
    }
}
