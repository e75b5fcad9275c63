//! Transport layer for the two field links
//!
//! Supports:
//! - RS-485 half-duplex serial (soil sensor, explicit direction control)
//! - Plain UART serial (GSM modem)

mod serial;

pub use serial::{list_ports, SerialLink, SerialLinkConfig, SerialParity};

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// Bus direction for half-duplex transceivers.
///
/// A transport is in exactly one direction at a time; there is no way to
/// assert transmit and receive simultaneously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusDirection {
    /// Driver enabled, receiver disabled
    Transmit,
    /// Driver disabled, receiver enabled
    Receive,
}

impl fmt::Display for BusDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transmit => write!(f, "transmit"),
            Self::Receive => write!(f, "receive"),
        }
    }
}

/// Transport error types
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Port not found
    #[error("Port not found: {0}")]
    PortNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Port already in use
    #[error("Port already in use: {0}")]
    PortInUse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Not connected
    #[error("Not connected")]
    Disconnected,
}

/// Transport statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct TransportStats {
    /// Bytes sent
    pub bytes_sent: u64,
    /// Bytes received
    pub bytes_received: u64,
    /// Write calls
    pub writes: u64,
    /// Read calls that returned data
    pub reads: u64,
}

/// Byte transport owned by exactly one link driver.
///
/// Both protocol drivers poll this interface under their own deadlines; a
/// `receive` that returns an empty buffer means "nothing pending yet", not
/// end of stream.
#[async_trait]
pub trait LinkTransport: Send {
    /// Send data
    async fn send(&mut self, data: &[u8]) -> Result<usize, TransportError>;

    /// Block until previously sent bytes are physically transmitted
    async fn flush(&mut self) -> Result<(), TransportError>;

    /// Receive whatever is pending (returns immediately, possibly empty)
    async fn receive(&mut self) -> Result<Bytes, TransportError>;

    /// Drop any bytes sitting in the receive buffer
    async fn discard_input(&mut self) -> Result<(), TransportError> {
        while !self.receive().await?.is_empty() {}
        Ok(())
    }

    /// Switch bus direction (half-duplex transceivers only; no-op otherwise)
    async fn set_direction(&mut self, _direction: BusDirection) -> Result<(), TransportError> {
        Ok(())
    }

    /// Get connection info string
    fn connection_info(&self) -> String;

    /// Get statistics
    fn stats(&self) -> TransportStats;
}
