//! Soil sensor link driver
//!
//! Modbus-RTU master for a 7-register soil probe on a half-duplex RS-485
//! bus. One public call does one complete transaction: direction switch,
//! request, direction switch back, bounded wait, validate, decode.

pub mod sampling;

pub use sampling::{NullObserver, SampleObserver, SamplingAggregator};

use crate::core::protocol::{build_read_request, decode_registers, response_len, FrameError};
use crate::core::transport::{BusDirection, LinkTransport, TransportError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, Instant};

/// Sensor driver errors
#[derive(Error, Debug)]
pub enum SensorError {
    /// Response did not complete within the configured timeout
    #[error("Response timeout: {received} of {expected} bytes received")]
    Timeout {
        /// Bytes that did arrive before the deadline
        received: usize,
        /// Full response length
        expected: usize,
    },

    /// Response arrived but failed validation
    #[error("Invalid response frame: {0}")]
    Frame(#[from] FrameError),

    /// Register count in the configuration does not match the probe's map
    #[error("Register map mismatch: expected {expected} registers, got {got}")]
    RegisterMap {
        /// Registers the measurement layout needs
        expected: usize,
        /// Registers actually decoded
        got: usize,
    },

    /// Underlying transport failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Every sample in an averaging run failed
    #[error("No valid sensor readings in {attempted} samples")]
    NoValidSamples {
        /// Samples attempted
        attempted: usize,
    },
}

/// One decoded soil measurement.
///
/// A value of this type only exists after a response passed header and
/// length validation; failed reads surface as [`SensorError`] instead of
/// partially-populated measurements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoilMeasurement {
    /// Relative humidity, %RH
    pub humidity: f32,
    /// Temperature, °C (register is signed)
    pub temperature: f32,
    /// Electrical conductivity, µS/cm
    pub ec: f32,
    /// pH value
    pub ph: f32,
    /// Nitrogen, mg/kg
    pub nitrogen: f32,
    /// Phosphorus, mg/kg
    pub phosphorus: f32,
    /// Potassium, mg/kg
    pub potassium: f32,
}

/// Registers in the probe's measurement map
pub const MEASUREMENT_REGISTERS: usize = 7;

impl SoilMeasurement {
    /// Scale raw registers into engineering units.
    ///
    /// Humidity, temperature, and pH are tenths; EC and N/P/K are plain
    /// integers. The temperature register is two's-complement so sub-zero
    /// soil reads correctly.
    pub fn from_registers(regs: &[u16]) -> Result<Self, SensorError> {
        if regs.len() != MEASUREMENT_REGISTERS {
            return Err(SensorError::RegisterMap {
                expected: MEASUREMENT_REGISTERS,
                got: regs.len(),
            });
        }

        Ok(Self {
            humidity: regs[0] as f32 / 10.0,
            temperature: regs[1] as i16 as f32 / 10.0,
            ec: regs[2] as f32,
            ph: regs[3] as f32 / 10.0,
            nitrogen: regs[4] as f32,
            phosphorus: regs[5] as f32,
            potassium: regs[6] as f32,
        })
    }
}

/// Sensor driver configuration.
///
/// Defaults are the deployed probe's constants; the settle and inter-sample
/// delays are hardware lower bounds, not tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Modbus slave address
    pub slave_addr: u8,
    /// First holding register to read
    pub start_register: u16,
    /// Number of registers to read
    pub register_count: u16,
    /// Response deadline in ms
    pub response_timeout_ms: u64,
    /// Transceiver direction-switch settle time in ms
    pub settle_time_ms: u64,
    /// Sleep between receive polls in ms
    pub poll_interval_ms: u64,
    /// Delay between samples when averaging, in ms
    pub read_delay_ms: u64,
    /// Samples per averaged reading
    pub samples: usize,
    /// Verify the response CRC trailer (off matches the probe's deployed
    /// master; turning it on rejects trailer-corrupt frames that previously
    /// passed)
    pub verify_crc: bool,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            slave_addr: 0x01,
            start_register: 0x0000,
            register_count: 7,
            response_timeout_ms: 1500,
            settle_time_ms: 5,
            poll_interval_ms: 1,
            read_delay_ms: 1000,
            samples: 5,
            verify_crc: false,
        }
    }
}

/// Modbus-RTU master for the soil probe.
///
/// Exclusively owns its RS-485 transport; each `read_measurement` call runs
/// to completion (success or timeout) before another can be issued, so no
/// two transactions ever interleave on the bus.
pub struct SensorLink<T: LinkTransport> {
    transport: T,
    config: SensorConfig,
    request: Vec<u8>,
}

impl<T: LinkTransport> SensorLink<T> {
    /// Create a driver over an opened transport.
    pub fn new(transport: T, config: SensorConfig) -> Self {
        let request =
            build_read_request(config.slave_addr, config.start_register, config.register_count);
        Self {
            transport,
            config,
            request,
        }
    }

    /// Driver configuration
    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Underlying transport (for stats/info)
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Acquire one measurement from the probe.
    ///
    /// Direction goes receive, transmit, then back to receive, entered
    /// fresh on every call. Stale receive bytes are dropped before the
    /// request is sent and
    /// transmission is fully flushed before the bus is turned around.
    pub async fn read_measurement(&mut self) -> Result<SoilMeasurement, SensorError> {
        let settle = Duration::from_millis(self.config.settle_time_ms);
        let expected = response_len(self.config.register_count);

        self.transport.discard_input().await?;

        self.transport.set_direction(BusDirection::Transmit).await?;
        sleep(settle).await;
        self.transport.send(&self.request).await?;
        self.transport.flush().await?;

        self.transport.set_direction(BusDirection::Receive).await?;
        sleep(settle).await;

        let deadline = Instant::now() + Duration::from_millis(self.config.response_timeout_ms);
        let mut buffer: Vec<u8> = Vec::with_capacity(expected);

        while buffer.len() < expected {
            let chunk = self.transport.receive().await?;
            if !chunk.is_empty() {
                buffer.extend_from_slice(&chunk);
                continue;
            }
            if Instant::now() >= deadline {
                break;
            }
            sleep(Duration::from_millis(self.config.poll_interval_ms)).await;
        }

        if buffer.len() < expected {
            tracing::warn!(
                received = buffer.len(),
                expected,
                "sensor response timeout"
            );
            return Err(SensorError::Timeout {
                received: buffer.len(),
                expected,
            });
        }

        let registers = decode_registers(
            &buffer,
            self.config.slave_addr,
            self.config.register_count,
            self.config.verify_crc,
        )
        .map_err(|e| {
            tracing::warn!(frame = %hex::encode(&buffer), error = %e, "invalid sensor response");
            e
        })?;

        let measurement = SoilMeasurement::from_registers(&registers)?;
        tracing::debug!(?measurement, "soil reading");
        Ok(measurement)
    }
}
