//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LapRfError, Result};
use crate::laprf::decoder::DecodeOptions;
use crate::laprf::protocol::{MAX_RECORD_LEN, MIN_RECORD_LEN};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub rf_setup: RfSetupConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the timer is reached
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// LapRF 8-way over Ethernet
    #[default]
    Tcp,
    /// LapRF Personal over USB serial
    Serial,
}

/// Transport configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,

    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_serial_port")]
    pub serial_port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

/// Codec limits
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CodecConfig {
    #[serde(default = "default_max_record_len")]
    pub max_record_len: usize,

    #[serde(default = "default_max_pending_bytes")]
    pub max_pending_bytes: usize,

    #[serde(default = "default_warn_unknown_fields")]
    pub warn_unknown_fields: bool,
}

/// Defaults applied to slot setup commands
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RfSetupConfig {
    #[serde(default = "default_gain")]
    pub gain: u16,

    #[serde(default = "default_threshold")]
    pub threshold: f32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Daily rolling log files are written here when set
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

// Default value functions
fn default_address() -> String { "192.168.1.9:5403".to_string() }
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_read_buffer_size() -> usize { 1024 }

fn default_max_record_len() -> usize { MAX_RECORD_LEN }
fn default_max_pending_bytes() -> usize { MAX_RECORD_LEN * 4 }
fn default_warn_unknown_fields() -> bool { true }

fn default_gain() -> u16 { 51 }
fn default_threshold() -> f32 { 900.0 }
fn default_enabled() -> bool { true }

fn default_log_level() -> String { "info".to_string() }

const BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            address: default_address(),
            serial_port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_record_len: default_max_record_len(),
            max_pending_bytes: default_max_pending_bytes(),
            warn_unknown_fields: default_warn_unknown_fields(),
        }
    }
}

impl Default for RfSetupConfig {
    fn default() -> Self {
        Self {
            gain: default_gain(),
            threshold: default_threshold(),
            enabled: default_enabled(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: None,
        }
    }
}

impl CodecConfig {
    /// Decoder options for these limits
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            max_record_len: self.max_record_len,
            warn_unknown_fields: self.warn_unknown_fields,
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> LapRfError {
    LapRfError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use laprf_codec::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        let transport = &self.transport;
        if transport.address.is_empty() && transport.kind == TransportKind::Tcp {
            return Err(invalid("transport address cannot be empty"));
        }

        if transport.serial_port.is_empty() && transport.kind == TransportKind::Serial {
            return Err(invalid("serial_port cannot be empty"));
        }

        if !BAUD_RATES.contains(&transport.baud_rate) {
            return Err(invalid("baud_rate must be one of: 9600, 19200, 38400, 57600, 115200"));
        }

        if !(64..=65536).contains(&transport.read_buffer_size) {
            return Err(invalid("read_buffer_size must be between 64 and 65536"));
        }

        let codec = &self.codec;
        if !(MIN_RECORD_LEN..=MAX_RECORD_LEN).contains(&codec.max_record_len) {
            return Err(invalid(format!(
                "max_record_len must be between {} and {}",
                MIN_RECORD_LEN, MAX_RECORD_LEN
            )));
        }

        if codec.max_pending_bytes < codec.max_record_len {
            return Err(invalid("max_pending_bytes must be at least max_record_len"));
        }

        let threshold = self.rf_setup.threshold;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(invalid("rf_setup threshold must be a finite, non-negative number"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "log level '{}' must be one of: trace, debug, info, warn, error",
                self.logging.level
            )));
        }

        Ok(())
    }
}
