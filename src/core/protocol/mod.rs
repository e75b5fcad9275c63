//! Sensor wire protocol
//!
//! Modbus-RTU framing for the soil probe: fixed read-holding-registers
//! request, fixed-length response validation, register decoding.

pub mod checksum;
pub mod frame;

pub use frame::{build_read_request, decode_registers, response_len, FrameError};
