//! Storage-boundary formatting
//!
//! The core never touches the SD card: it hands the caller formatted field
//! strings for the datalog and round-trips the SMS settings blob the
//! storage layer persists.

use crate::core::sensor::SoilMeasurement;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One datalog row: who, when, and the averaged measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    /// Farmer identifier
    pub farmer_id: String,
    /// Timestamp string from the time-keeping collaborator
    pub timestamp: String,
    /// Averaged measurement
    pub measurement: SoilMeasurement,
}

impl MeasurementRecord {
    /// Build a record for persistence
    pub fn new(farmer_id: &str, timestamp: &str, measurement: SoilMeasurement) -> Self {
        Self {
            farmer_id: farmer_id.to_string(),
            timestamp: timestamp.to_string(),
            measurement,
        }
    }

    /// Field strings in datalog column order.
    ///
    /// Humidity, temperature, and pH carry one decimal; EC and N/P/K are
    /// rounded to whole numbers, matching the historical datalog format.
    pub fn csv_fields(&self) -> Vec<String> {
        let m = &self.measurement;
        vec![
            self.farmer_id.clone(),
            self.timestamp.clone(),
            format!("{:.1}", m.humidity),
            format!("{:.1}", m.temperature),
            format!("{:.0}", m.ec),
            format!("{:.1}", m.ph),
            format!("{:.0}", m.nitrogen),
            format!("{:.0}", m.phosphorus),
            format!("{:.0}", m.potassium),
        ]
    }
}

impl fmt::Display for MeasurementRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.csv_fields().join(","))
    }
}

/// SMS enablement and template, as persisted by the storage layer and
/// refreshed by the sync layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsSettings {
    /// Whether automatic SMS notification is on
    pub enabled: bool,
    /// Message template with `{placeholder}` markers
    pub template: String,
}

impl SmsSettings {
    /// Render as the two-part config blob: first line `1`/`0`, rest template.
    pub fn to_config_text(&self) -> String {
        format!("{}\n{}", if self.enabled { "1" } else { "0" }, self.template)
    }

    /// Parse the config blob written by [`Self::to_config_text`].
    ///
    /// A missing or non-`1` first line disables SMS; surrounding
    /// whitespace on the template is dropped.
    pub fn parse_config_text(text: &str) -> Self {
        let mut lines = text.splitn(2, '\n');
        let enabled = lines.next().map(str::trim) == Some("1");
        let template = lines.next().unwrap_or("").trim().to_string();
        Self { enabled, template }
    }
}
