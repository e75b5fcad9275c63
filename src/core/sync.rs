//! Network-sync boundary types
//!
//! The HTTP transfer itself lives outside the core; what arrives here is
//! the already-fetched JSON body. The core extracts the SMS settings (for
//! the storage layer to persist) and the server clock (for the RTC
//! collaborator) and nothing else.

use crate::core::record::SmsSettings;
use chrono::NaiveDate;
use serde::Deserialize;

/// Server clock reading carried in a sync response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ServerTime {
    /// Calendar year
    pub year: i32,
    /// Month 1-12
    pub month: u32,
    /// Day of month
    pub day: u32,
    /// Hour 0-23
    pub hour: u32,
    /// Minute
    pub minute: u32,
    /// Second
    pub second: u32,
}

impl ServerTime {
    /// Convert to a datetime for the time-keeping collaborator.
    ///
    /// Years at or below 2020 are treated as a server misconfiguration
    /// and rejected along with out-of-range fields.
    pub fn to_naive_datetime(&self) -> Option<chrono::NaiveDateTime> {
        if self.year <= 2020 {
            return None;
        }
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)?
            .and_hms_opt(self.hour, self.minute, self.second)
    }
}

/// Parsed remote sync response.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncResponse {
    /// Server-side success flag
    #[serde(default)]
    pub success: bool,
    /// Optional server error message
    #[serde(default)]
    pub message: Option<String>,
    /// SMS settings pushed by the server, if any
    #[serde(default)]
    pub sms_settings: Option<SmsSettings>,
    /// Server clock, if provided
    #[serde(default)]
    pub server_time: Option<ServerTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_response() {
        let json = r#"{
            "success": true,
            "sms_settings": {"enabled": true, "template": "pH {ph}"},
            "server_time": {"year": 2024, "month": 6, "day": 1,
                            "hour": 7, "minute": 30, "second": 0}
        }"#;

        let resp: SyncResponse = serde_json::from_str(json).unwrap();
        assert!(resp.success);

        let settings = resp.sms_settings.unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.template, "pH {ph}");

        let dt = resp.server_time.unwrap().to_naive_datetime().unwrap();
        assert_eq!(dt.to_string(), "2024-06-01 07:30:00");
    }

    #[test]
    fn test_parse_minimal_response() {
        let resp: SyncResponse = serde_json::from_str(r#"{"success": false, "message": "no data"}"#).unwrap();
        assert!(!resp.success);
        assert_eq!(resp.message.as_deref(), Some("no data"));
        assert!(resp.sms_settings.is_none());
        assert!(resp.server_time.is_none());
    }

    #[test]
    fn test_server_time_sanity_check() {
        let stale = ServerTime {
            year: 2000,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        };
        assert!(stale.to_naive_datetime().is_none());

        let invalid = ServerTime {
            year: 2024,
            month: 13,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        };
        assert!(invalid.to_naive_datetime().is_none());
    }
}
