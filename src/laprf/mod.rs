//! # LapRF Protocol Module
//!
//! Implementation of the ImmersionRC LapRF wire protocol.
//!
//! This module handles:
//! - Byte cursor I/O over fixed buffers
//! - Record framing with SOR/EOR delimiters and byte escaping
//! - CRC-16 checksum calculation and verification
//! - Schema tables for every record type
//! - Record encoding, command builders and decoding

pub mod protocol;
pub mod number;
pub mod cursor;
pub mod crc;
pub mod framer;
pub mod schema;
pub mod record;
pub mod encoder;
pub mod decoder;
pub mod channels;
