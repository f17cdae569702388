//! # Transport Module
//!
//! Thin async adapter between a timer connection and the codec.
//!
//! This module handles:
//! - Opening the USB serial port (8N1, no flow control)
//! - Connecting to a networked timer over TCP
//! - Writing encoded records
//! - Reading chunks, reassembling records across reads and decoding them
//!
//! Retries, reconnection and device session state belong to the caller.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::config::CodecConfig;
use crate::error::{LapRfError, Result};
use crate::laprf::decoder::{DecodeOptions, Decoded, Decoder};
use crate::laprf::framer::StreamFramer;
use crate::laprf::protocol::MAX_RECORD_LEN;

/// Default read size per `receive` call
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// A byte stream speaking LapRF
///
/// `S` is anything readable and writable: a serial port, a TCP stream or an
/// in-memory mock in tests.
pub struct LapRfLink<S> {
    stream: S,
    framer: StreamFramer,
    decoder: Decoder<'static>,
    read_buffer: Vec<u8>,
}

impl<S> std::fmt::Debug for LapRfLink<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LapRfLink")
            .field("framer", &self.framer)
            .field("decoder", &self.decoder.options())
            .field("read_buffer_size", &self.read_buffer.len())
            .finish_non_exhaustive()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> LapRfLink<S> {
    /// Wrap a stream with default codec limits
    pub fn new(stream: S) -> Self {
        Self::with_options(
            stream,
            DecodeOptions::default(),
            MAX_RECORD_LEN * 4,
            DEFAULT_READ_BUFFER_SIZE,
        )
    }

    /// Wrap a stream with configured codec limits
    pub fn with_config(stream: S, codec: &CodecConfig, read_buffer_size: usize) -> Self {
        Self::with_options(
            stream,
            codec.decode_options(),
            codec.max_pending_bytes,
            read_buffer_size,
        )
    }

    pub fn with_options(
        stream: S,
        options: DecodeOptions,
        max_pending_bytes: usize,
        read_buffer_size: usize,
    ) -> Self {
        Self {
            stream,
            framer: StreamFramer::new(max_pending_bytes),
            decoder: Decoder::new(options),
            read_buffer: vec![0u8; read_buffer_size.max(1)],
        }
    }

    /// Send an encoded record
    ///
    /// # Arguments
    ///
    /// * `bytes` - Escaped record bytes from the encoder
    ///
    /// # Errors
    ///
    /// Returns `Io` if the write or flush fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use laprf_codec::laprf::encoder::get_rtc_time;
    /// use laprf_codec::transport::connect_tcp;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let mut link = connect_tcp("192.168.1.9:5403").await?;
    ///     link.send(&get_rtc_time()?).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        debug!("Sent {} bytes", bytes.len());
        Ok(())
    }

    /// Read once and decode every record completed by the chunk
    ///
    /// A chunk holding only part of a record yields an empty list; the rest
    /// is kept for the next call.
    ///
    /// # Errors
    ///
    /// Returns `Io(UnexpectedEof)` when the stream is closed, or any read
    /// error. Per-record failures are returned inside the list.
    pub async fn receive(&mut self) -> Result<Vec<Result<Decoded>>> {
        let count = self.stream.read(&mut self.read_buffer).await?;
        if count == 0 {
            return Err(LapRfError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "timer closed the connection",
            )));
        }
        debug!("Received {} bytes", count);

        let decoder = self.decoder;
        Ok(self
            .framer
            .push(&self.read_buffer[..count])
            .into_iter()
            .map(|framed| framed.and_then(|record| decoder.decode_record(&record)))
            .collect())
    }

    /// Framer state, for diagnostics
    pub fn framer(&self) -> &StreamFramer {
        &self.framer
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// Open a serial-connected timer
///
/// # Arguments
///
/// * `path` - Device path (e.g., "/dev/ttyUSB0")
/// * `baud_rate` - Line speed
///
/// # Errors
///
/// Returns `Serial` if the port cannot be opened
pub fn open_serial(path: &str, baud_rate: u32) -> Result<LapRfLink<tokio_serial::SerialStream>> {
    Ok(LapRfLink::new(open_port(path, baud_rate)?))
}

/// Open the serial port alone, 8N1 without flow control
///
/// For callers that wrap the stream with [`LapRfLink::with_config`].
pub fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| LapRfError::Serial(format!("Failed to open {}: {}", path, e)))?;
    info!("Opened LapRF serial port {} at {} baud", path, baud_rate);
    Ok(port)
}

/// Connect to a networked timer
///
/// # Errors
///
/// Returns `Io` if the connection fails
pub async fn connect_tcp(address: &str) -> Result<LapRfLink<TcpStream>> {
    Ok(LapRfLink::new(connect_stream(address).await?))
}

/// Connect the TCP stream alone, with Nagle disabled
pub async fn connect_stream(address: &str) -> Result<TcpStream> {
    let stream = TcpStream::connect(address).await?;
    stream.set_nodelay(true)?;
    info!("Connected to LapRF timer at {}", address);
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::laprf::encoder::{get_rtc_time, set_min_lap_time};
    use crate::laprf::record::{Record, SettingsRecord};
    use tokio_test::io::Builder;

    const SETTINGS: &str = "5a0e00a40507da2604701700005b";
    const TIME: &str = "5a1c00d52b0cda02086051fcaf01000000200800000000000000005b";

    #[tokio::test]
    async fn test_send_writes_encoded_record() {
        let request = get_rtc_time().unwrap();
        let mock = Builder::new().write(&request).build();

        let mut link = LapRfLink::new(mock);
        link.send(&request).await.unwrap();
    }

    #[tokio::test]
    async fn test_receive_decodes_records_in_one_chunk() {
        let mut chunk = hex::decode(SETTINGS).unwrap();
        chunk.extend(hex::decode(TIME).unwrap());
        let mock = Builder::new().read(&chunk).build();

        let mut link = LapRfLink::new(mock);
        let results = link.receive().await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0].as_ref().unwrap().record,
            Record::Settings(SettingsRecord {
                min_lap_time: Some(6000),
                ..Default::default()
            })
        );
        assert!(matches!(results[1].as_ref().unwrap().record, Record::Time(_)));
    }

    #[tokio::test]
    async fn test_receive_reassembles_across_reads() {
        let record = hex::decode(TIME).unwrap();
        let (head, tail) = record.split_at(9);
        let mock = Builder::new().read(head).read(tail).build();

        let mut link = LapRfLink::new(mock);
        assert!(link.receive().await.unwrap().is_empty());
        assert_eq!(link.framer().pending_len(), 9);

        let results = link.receive().await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_ok());
    }

    #[tokio::test]
    async fn test_receive_reports_bad_record_and_continues() {
        let mut corrupt = hex::decode(SETTINGS).unwrap();
        corrupt[10] ^= 0x01;
        let mut chunk = corrupt;
        chunk.extend(hex::decode(TIME).unwrap());
        let mock = Builder::new().read(&chunk).build();

        let mut link = LapRfLink::new(mock);
        let results = link.receive().await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(LapRfError::CrcMismatch { .. })));
        assert!(results[1].is_ok());
    }

    #[tokio::test]
    async fn test_receive_eof() {
        let mock = Builder::new().build();

        let mut link = LapRfLink::new(mock);
        let err = link.receive().await.unwrap_err();
        match err {
            LapRfError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof),
            other => panic!("Expected Io error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_request_response_exchange() {
        let request = set_min_lap_time(6000).unwrap();
        let reply = hex::decode(SETTINGS).unwrap();
        let mock = Builder::new().write(&request).read(&reply).build();

        let mut link = LapRfLink::with_config(mock, &CodecConfig::default(), 256);
        link.send(&request).await.unwrap();
        let results = link.receive().await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].as_ref().unwrap().warnings.is_empty());
    }

    #[test]
    fn test_open_port_with_invalid_path_returns_error() {
        let err = open_port("/dev/nonexistent_laprf_device_12345", 115200).unwrap_err();
        assert!(matches!(err, LapRfError::Serial(_)));
    }

    #[tokio::test]
    async fn test_connect_stream_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = connect_stream(&address).await.unwrap_err();
        assert!(matches!(err, LapRfError::Io(_)));
    }

    #[test]
    fn test_open_serial_with_invalid_path_returns_error() {
        let err = open_serial("/dev/nonexistent_laprf_device_12345", 115200).unwrap_err();
        match err {
            LapRfError::Serial(msg) => {
                assert!(msg.contains("/dev/nonexistent_laprf_device_12345"));
                assert!(msg.contains("Failed to open"));
            }
            other => panic!("Expected Serial error, got: {:?}", other),
        }
    }

    // Integration test - only runs against a real timer
    #[tokio::test]
    #[ignore] // Run with: cargo test -- --ignored
    async fn test_rtc_time_with_real_hardware() {
        let Ok(mut link) = connect_tcp("192.168.1.9:5403").await else {
            println!("No LapRF timer reachable (skipping)");
            return;
        };
        link.send(&get_rtc_time().unwrap()).await.unwrap();
        let results = link.receive().await.unwrap();
        println!("Received {:?}", results);
    }
}
