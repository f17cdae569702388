//! # LapRF Monitor
//!
//! Connects to a LapRF timer and prints every decoded record as a JSON line.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (path from the first argument, defaults otherwise)
//!    - Set up logging to stderr, or to daily files when `logging.log_dir` is set
//!    - Connect over TCP or serial
//!
//! 2. **Main Loop**
//!    - Apply `SLOT=CHANNEL` arguments with the `[rf_setup]` defaults
//!    - Request the RTC time and the RF setup of every slot
//!    - Print each decoded record to stdout, stamped with the host time
//!    - Handle Ctrl+C for graceful shutdown
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- config/default.toml 1=R1 2=R3
//! ```
//!
//! Expected output:
//! ```text
//! {"received_at":"2026-05-02T10:15:03.120Z","record":{"type":"time","rtcTime":7247516000,"timeRtcTime":0},"warnings":[]}
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use laprf_codec::config::{Config, LoggingConfig, RfSetupConfig, TransportKind};
use laprf_codec::laprf::decoder::Decoded;
use laprf_codec::laprf::encoder::{get_rf_setup, get_rtc_time, set_rf_setup, RfSetupCommand};
use laprf_codec::transport::{connect_stream, open_port, LapRfLink};

/// Log file name prefix inside `logging.log_dir`
const LOG_FILE_PREFIX: &str = "laprf-monitor.log";

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => Config::load(&path).with_context(|| format!("Failed to load config {}", path))?,
        None => Config::default(),
    };
    let setups = args
        .map(|arg| parse_slot_setup(&arg, &config.rf_setup))
        .collect::<Result<Vec<_>>>()?;

    let _guard = init_logging(&config.logging);
    info!("LapRF Monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let transport = &config.transport;
    match transport.kind {
        TransportKind::Tcp => {
            let stream = connect_stream(&transport.address).await?;
            monitor(LapRfLink::with_config(stream, &config.codec, transport.read_buffer_size), &setups).await
        }
        TransportKind::Serial => {
            let port = open_port(&transport.serial_port, transport.baud_rate)?;
            monitor(LapRfLink::with_config(port, &config.codec, transport.read_buffer_size), &setups).await
        }
    }
}

/// Initialise tracing; the guard must live as long as file logging is needed
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            // stdout carries the records
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}

/// Parse a `SLOT=CHANNEL` argument, e.g. `1=R1`
fn parse_slot_setup(arg: &str, defaults: &RfSetupConfig) -> Result<RfSetupCommand> {
    let (slot, channel) = arg
        .split_once('=')
        .with_context(|| format!("Expected SLOT=CHANNEL, got '{}'", arg))?;
    let slot: u8 = slot
        .trim()
        .parse()
        .with_context(|| format!("Invalid slot in '{}'", arg))?;
    Ok(RfSetupCommand::from_config(slot, channel.trim(), defaults))
}

async fn monitor<S: AsyncRead + AsyncWrite + Unpin>(
    mut link: LapRfLink<S>,
    setups: &[RfSetupCommand],
) -> Result<()> {
    for setup in setups {
        link.send(&set_rf_setup(setup)?).await?;
        info!("Slot {} set to {}", setup.slot, setup.channel);
    }
    link.send(&get_rtc_time()?).await?;
    link.send(&get_rf_setup(None)?).await?;
    info!("Monitoring, press Ctrl+C to exit");

    let mut record_count: u64 = 0;
    let mut error_count: u64 = 0;

    loop {
        tokio::select! {
            results = link.receive() => {
                for result in results? {
                    match result {
                        Ok(decoded) => {
                            record_count += 1;
                            println!("{}", record_line(&decoded, Utc::now()));
                        }
                        Err(e) => {
                            error_count += 1;
                            warn!("Dropped record: {}", e);
                        }
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!(
                    "Records decoded: {}, dropped: {}, noise bytes: {}",
                    record_count,
                    error_count,
                    link.framer().discarded_bytes()
                );
                break;
            }
        }
    }

    Ok(())
}

/// One JSON output line for a decoded record
fn record_line(decoded: &Decoded, received_at: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "received_at": received_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        "record": decoded.record,
        "warnings": decoded.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use laprf_codec::error::DecodeWarning;
    use laprf_codec::laprf::record::{Record, SettingsRecord};

    #[test]
    fn test_record_line_format() {
        let decoded = Decoded {
            record: Record::Settings(SettingsRecord {
                min_lap_time: Some(6000),
                ..Default::default()
            }),
            warnings: vec![DecodeWarning::UnknownFieldSignature {
                record: "settings",
                signature: 0x30,
                size: 4,
            }],
        };
        let at = Utc.with_ymd_and_hms(2026, 5, 2, 10, 15, 3).unwrap();

        let line = record_line(&decoded, at);
        assert_eq!(line["received_at"], "2026-05-02T10:15:03.000Z");
        assert_eq!(line["record"]["type"], "settings");
        assert_eq!(line["record"]["minLapTime"], 6000);
        assert!(line["record"].get("statusInterval").is_none());
        assert_eq!(line["warnings"][0]["kind"], "unknownFieldSignature");
        assert_eq!(line["warnings"][0]["signature"], 0x30);
    }

    #[test]
    fn test_parse_slot_setup() {
        let defaults = RfSetupConfig::default();
        let command = parse_slot_setup("2=R3", &defaults).unwrap();
        assert_eq!(command, RfSetupCommand::new(2, "R3"));

        assert!(parse_slot_setup("R3", &defaults).is_err());
        assert!(parse_slot_setup("x=R3", &defaults).is_err());
    }

    #[test]
    fn test_log_file_prefix() {
        assert_eq!(LOG_FILE_PREFIX, "laprf-monitor.log");
    }
}
