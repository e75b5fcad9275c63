//! CLI Exit Codes
//!
//! Standard exit codes for CLI operations and automation.

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Port could not be opened
    pub const PORT_ERROR: u8 = 3;

    /// Sensor response timeout
    pub const SENSOR_TIMEOUT: u8 = 4;

    /// No valid samples in an averaging run
    pub const NO_VALID_SAMPLES: u8 = 5;

    /// Modem did not respond to bring-up
    pub const MODEM_NOT_READY: u8 = 6;

    /// SIM absent or locked
    pub const SIM_NOT_READY: u8 = 7;

    /// Not registered on the network
    pub const NOT_REGISTERED: u8 = 8;

    /// SMS submission failed (rejected or timed out)
    pub const SMS_FAILED: u8 = 9;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 10;
}

/// Get human-readable description of an exit code
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        ExitCodes::SUCCESS => "Success",
        ExitCodes::ERROR => "General error",
        ExitCodes::INVALID_ARGS => "Invalid arguments",
        ExitCodes::PORT_ERROR => "Port could not be opened",
        ExitCodes::SENSOR_TIMEOUT => "Sensor response timeout",
        ExitCodes::NO_VALID_SAMPLES => "No valid samples",
        ExitCodes::MODEM_NOT_READY => "Modem not ready",
        ExitCodes::SIM_NOT_READY => "SIM not ready",
        ExitCodes::NOT_REGISTERED => "Not registered on the network",
        ExitCodes::SMS_FAILED => "SMS submission failed",
        ExitCodes::CONFIG_ERROR => "Configuration error",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptions() {
        assert_eq!(exit_code_description(0), "Success");
        assert_eq!(exit_code_description(ExitCodes::SMS_FAILED), "SMS submission failed");
        assert_eq!(exit_code_description(200), "Unknown");
    }
}
