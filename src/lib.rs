//! # Agrilink Core Library
//!
//! Link drivers for a field soil-chemistry data collector:
//! - Modbus-RTU master for a 7-register soil probe on a half-duplex
//!   RS-485 bus with explicit direction control
//! - AT-command driver for a SIM800-class GSM modem, including a
//!   prompt-gated SMS submission engine
//!
//! ## Features
//!
//! - Bounded deadline polling everywhere; no operation blocks forever
//! - Typed failure outcomes; a failed read never yields partial data
//! - Multi-sample averaging that skips bad frames
//! - Phone-number normalization and SMS templating as pure functions
//! - Datalog and sync-payload formatting at the collaborator boundaries
//!
//! ## Example
//!
//! ```rust,no_run
//! use agrilink_core::{SensorConfig, SensorLink, SerialLink, SerialLinkConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let port = SerialLink::open(SerialLinkConfig::new("/dev/ttyUSB0", 4800))?;
//!     let mut link = SensorLink::new(port, SensorConfig::default());
//!
//!     let reading = link.read_measurement().await?;
//!     println!("pH {:.1}, {:.1} %RH", reading.ph, reading.humidity);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{exit_code_description, ExitCodes};
pub use crate::config::AppConfig;
pub use crate::core::modem::{
    build_message, format_phone_number, MessageValues, ModemConfig, ModemError, ModemLink,
    SendOutcome, SignalQuality, SmsError, SmsSender,
};
pub use crate::core::record::{MeasurementRecord, SmsSettings};
pub use crate::core::sensor::{
    NullObserver, SampleObserver, SamplingAggregator, SensorConfig, SensorError, SensorLink,
    SoilMeasurement,
};
pub use crate::core::sync::{ServerTime, SyncResponse};
pub use crate::core::transport::{
    list_ports, BusDirection, LinkTransport, SerialLink, SerialLinkConfig, SerialParity,
    TransportError, TransportStats,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
