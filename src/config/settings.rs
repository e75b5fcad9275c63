//! Device settings
//!
//! One TOML file covering both links. The defaults mirror the deployed
//! field unit: probe on a 4800-baud RS-485 adapter, modem on a 9600-baud
//! UART, five samples per reading.

use crate::core::modem::ModemConfig;
use crate::core::sensor::SensorConfig;
use crate::core::transport::SerialLinkConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// RS-485 port for the soil probe
    pub sensor_port: SerialLinkConfig,
    /// Sensor driver settings
    pub sensor: SensorConfig,
    /// UART port for the GSM modem
    pub modem_port: SerialLinkConfig,
    /// Modem driver settings
    pub modem: ModemConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sensor_port: SerialLinkConfig::new("/dev/ttyUSB0", 4800),
            sensor: SensorConfig::default(),
            modem_port: SerialLinkConfig::new("/dev/ttyUSB1", 9600),
            modem: ModemConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load config from the default location
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = super::config_dir()
            .ok_or("Could not determine config directory")?
            .join("config.toml");

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let config_path = super::config_dir()
            .ok_or("Could not determine config directory")?
            .join("config.toml");
        self.save_to(&config_path)
    }

    /// Save config to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_field_unit() {
        let config = AppConfig::default();
        assert_eq!(config.sensor_port.baud_rate, 4800);
        assert_eq!(config.modem_port.baud_rate, 9600);
        assert_eq!(config.sensor.slave_addr, 0x01);
        assert_eq!(config.sensor.samples, 5);
        assert_eq!(config.modem.country_code, "63");
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.sensor_port.port = "/dev/ttyAMA2".to_string();
        config.sensor.verify_crc = true;
        config.modem.country_code = "44".to_string();
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.sensor_port.port, "/dev/ttyAMA2");
        assert!(loaded.sensor.verify_crc);
        assert_eq!(loaded.modem.country_code, "44");
    }
}
