//! Location records.
//!
//! A [`LocationRecord`] is one captured GPS fix together with the name the
//! diver gave the site. Records live in memory until an upload attempt fails,
//! at which point they are persisted and picked up by the next batch run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single captured GPS fix awaiting or having completed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Local identity assigned by the store. `None` until persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Latitude in degrees.
    pub latitude: f64,

    /// Longitude in degrees.
    pub longitude: f64,

    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp: i64,

    /// User-supplied label for the dive site. May be empty.
    pub name: String,

    /// Whether the record was accepted by the remote service.
    #[serde(default)]
    pub sent: bool,
}

impl LocationRecord {
    /// Create an unpersisted record stamped with the current time.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, name: impl Into<String>) -> Self {
        Self::at(latitude, longitude, Utc::now().timestamp_millis(), name)
    }

    /// Create an unpersisted record with an explicit timestamp.
    #[must_use]
    pub fn at(latitude: f64, longitude: f64, timestamp: i64, name: impl Into<String>) -> Self {
        Self {
            id: None,
            latitude,
            longitude,
            timestamp,
            name: name.into(),
            sent: false,
        }
    }

    /// The capture time as a UTC date-time.
    ///
    /// Timestamps outside chrono's representable range fall back to the epoch.
    #[must_use]
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }

    /// Name suitable for log and terminal output.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "(unnamed)"
        } else {
            &self.name
        }
    }
}

impl std::fmt::Display for LocationRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}/{}",
            self.id.unwrap_or(0),
            self.name,
            self.timestamp,
            self.latitude,
            self.longitude,
            self.sent
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_new() {
        let before = Utc::now().timestamp_millis();
        let record = LocationRecord::new(43.5, 7.1, "Cap d'Antibes");
        let after = Utc::now().timestamp_millis();

        assert!(record.id.is_none());
        assert!(!record.sent);
        assert_eq!(record.name, "Cap d'Antibes");
        assert!(record.timestamp >= before && record.timestamp <= after);
    }

    #[test]
    fn test_record_datetime() {
        let record = LocationRecord::at(0.0, 0.0, 1_350_000_000_000, "");
        assert_eq!(record.datetime().timestamp(), 1_350_000_000);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(LocationRecord::at(0.0, 0.0, 0, "").display_name(), "(unnamed)");
        assert_eq!(LocationRecord::at(0.0, 0.0, 0, "Reef").display_name(), "Reef");
    }

    #[test]
    fn test_record_display() {
        let mut record = LocationRecord::at(1.5, -2.25, 1000, "Wreck");
        assert_eq!(record.to_string(), "0/Wreck/1000/1.5/-2.25/false");

        record.id = Some(7);
        record.sent = true;
        assert_eq!(record.to_string(), "7/Wreck/1000/1.5/-2.25/true");
    }

    #[test]
    fn test_record_serialization() {
        let record = LocationRecord::at(10.0, 20.0, 42, "Blue Hole");
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("\"id\""));

        let deserialized: LocationRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, deserialized);
    }
}
