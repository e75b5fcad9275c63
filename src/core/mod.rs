//! Core module containing the main functionality of Agrilink
//!
//! This module provides:
//! - Transport layer for the two serial links (RS-485 bus, modem UART)
//! - Modbus-RTU wire protocol for the soil probe
//! - Sensor link driver and multi-sample averaging
//! - GSM modem link driver and SMS transaction engine
//! - Storage- and sync-boundary data formatting

pub mod modem;
pub mod protocol;
pub mod record;
pub mod sensor;
pub mod sync;
pub mod transport;
