//! Serial port transport implementation
//!
//! Backs both field links: the RS-485 soil-sensor bus (with RTS-driven
//! direction control) and the GSM modem UART.

use super::{BusDirection, LinkTransport, TransportError, TransportStats};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

/// Serial port parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SerialParity {
    /// No parity
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

/// Serial port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialLinkConfig {
    /// Port name (e.g., COM3, /dev/ttyUSB0)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
}

impl SerialLinkConfig {
    /// Create a new serial configuration with 8N1 framing
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
        }
    }

    /// Set data bits
    #[must_use]
    pub fn data_bits(mut self, bits: u8) -> Self {
        self.data_bits = bits;
        self
    }

    /// Set stop bits
    #[must_use]
    pub fn stop_bits(mut self, bits: u8) -> Self {
        self.stop_bits = bits;
        self
    }

    /// Set parity
    #[must_use]
    pub fn parity(mut self, parity: SerialParity) -> Self {
        self.parity = parity;
        self
    }
}

impl Default for SerialLinkConfig {
    fn default() -> Self {
        Self::new("/dev/ttyUSB0", 9600)
    }
}

/// Serial port transport
pub struct SerialLink {
    config: SerialLinkConfig,
    port: Arc<Mutex<Box<dyn SerialPort + Send>>>,
    stats: Arc<RwLock<TransportStats>>,
}

impl SerialLink {
    /// Open the configured port.
    ///
    /// The port starts in receive direction with RTS de-asserted, matching
    /// the idle state of an RS-485 transceiver wired DE/RE-to-RTS.
    pub fn open(config: SerialLinkConfig) -> Result<Self, TransportError> {
        let data_bits = match config.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        };

        let stop_bits = match config.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        };

        let parity = match config.parity {
            SerialParity::Odd => Parity::Odd,
            SerialParity::Even => Parity::Even,
            SerialParity::None => Parity::None,
        };

        let mut port = serialport::new(&config.port, config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(10))
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => TransportError::PortNotFound(config.port.clone()),
                serialport::ErrorKind::Io(io_kind) => match io_kind {
                    std::io::ErrorKind::PermissionDenied => {
                        TransportError::PermissionDenied(config.port.clone())
                    }
                    _ => TransportError::ConnectionFailed(e.to_string()),
                },
                _ => TransportError::ConnectionFailed(e.to_string()),
            })?;

        port.write_request_to_send(false)
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            config,
            port: Arc::new(Mutex::new(port)),
            stats: Arc::new(RwLock::new(TransportStats::default())),
        })
    }
}

#[async_trait]
impl LinkTransport for SerialLink {
    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut port = self.port.lock();
        port.write_all(data).map_err(TransportError::IoError)?;

        let mut stats = self.stats.write();
        stats.bytes_sent += data.len() as u64;
        stats.writes += 1;

        Ok(data.len())
    }

    async fn flush(&mut self) -> Result<(), TransportError> {
        self.port.lock().flush().map_err(TransportError::IoError)
    }

    async fn receive(&mut self) -> Result<Bytes, TransportError> {
        let mut port = self.port.lock();
        let mut buffer = vec![0u8; 4096];

        match port.read(&mut buffer) {
            Ok(0) => Err(TransportError::Disconnected),
            Ok(n) => {
                buffer.truncate(n);
                drop(port);

                let mut stats = self.stats.write();
                stats.bytes_received += n as u64;
                stats.reads += 1;

                Ok(Bytes::from(buffer))
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Bytes::new()),
            Err(e) => Err(TransportError::IoError(e)),
        }
    }

    async fn discard_input(&mut self) -> Result<(), TransportError> {
        let mut port = self.port.lock();
        port.clear(serialport::ClearBuffer::Input)
            .map_err(|e| TransportError::IoError(std::io::Error::other(e)))
    }

    async fn set_direction(&mut self, direction: BusDirection) -> Result<(), TransportError> {
        // DE and /RE are tied together and driven from RTS on the MAX485
        // adapter, so one line swap covers both halves of the transceiver.
        let assert = matches!(direction, BusDirection::Transmit);
        self.port
            .lock()
            .write_request_to_send(assert)
            .map_err(|e| TransportError::IoError(std::io::Error::other(e)))
    }

    fn connection_info(&self) -> String {
        format!(
            "{} @ {} baud ({}{}{})",
            self.config.port,
            self.config.baud_rate,
            self.config.data_bits,
            match self.config.parity {
                SerialParity::None => "N",
                SerialParity::Odd => "O",
                SerialParity::Even => "E",
            },
            self.config.stop_bits,
        )
    }

    fn stats(&self) -> TransportStats {
        *self.stats.read()
    }
}

/// List available serial ports
pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>, TransportError> {
    serialport::available_ports().map_err(|e| TransportError::IoError(e.into()))
}
