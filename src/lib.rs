//! # LapRF Codec Library
//!
//! Encode and decode the wire protocol of ImmersionRC LapRF lap timers.
//!
//! This library provides the framed, escaped, CRC-protected record codec,
//! the command builders a host sends to the timer, and a thin async link
//! over serial or TCP transports.

pub mod config;
pub mod error;
pub mod laprf;
pub mod transport;
