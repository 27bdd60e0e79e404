use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder address used whenever reverse geocoding fails.
pub const ADDRESS_NOT_AVAILABLE: &str = "Address not available";
/// Placeholder short label used when no building or road is known.
pub const DEFAULT_PLACE_NAME: &str = "Location";

/// A raw reading straight from a positioning source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// Uncertainty radius in meters, `None` when the source doesn't report one.
    pub accuracy: Option<f64>,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64, accuracy: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
        }
    }

    /// Accuracy used for ranking. Unknown (or garbage) ranks as worst.
    pub fn rank(&self) -> f64 {
        accuracy_rank(self.accuracy)
    }

    /// True when this fix is strictly more accurate than `other`.
    pub fn is_better_than(&self, other: &Fix) -> bool {
        self.rank() < other.rank()
    }
}

pub fn accuracy_rank(accuracy: Option<f64>) -> f64 {
    accuracy.filter(|a| a.is_finite()).unwrap_or(f64::INFINITY)
}

/// Result of a reverse geocode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub address: String,
    pub place_name: String,
}

impl Place {
    /// The pair returned when a lookup could not be completed.
    pub fn unavailable() -> Self {
        Self {
            address: ADDRESS_NOT_AVAILABLE.to_string(),
            place_name: DEFAULT_PLACE_NAME.to_string(),
        }
    }

    /// Bare coordinates as the address, e.g. `"37.774900, -122.419400"`.
    pub fn from_coordinates(latitude: f64, longitude: f64) -> Self {
        Self {
            address: format!("{:.6}, {:.6}", latitude, longitude),
            place_name: DEFAULT_PLACE_NAME.to_string(),
        }
    }
}

/// Immutable snapshot handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationReading {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_name: Option<String>,
    /// Milliseconds since the epoch, stamped when the reading was accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl LocationReading {
    /// Accepts a fix now, without an address.
    pub fn accept(fix: Fix) -> Self {
        Self {
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            address: None,
            place_name: None,
            timestamp: Some(chrono::Utc::now().timestamp_millis()),
        }
    }

    pub fn with_place(mut self, place: Place) -> Self {
        self.address = Some(place.address);
        self.place_name = Some(place.place_name);
        self
    }

    pub fn fix(&self) -> Fix {
        Fix::new(self.latitude, self.longitude, self.accuracy)
    }

    pub fn is_better_than(&self, other: &LocationReading) -> bool {
        self.fix().is_better_than(&other.fix())
    }
}

/// Options passed to a positioning source for one request or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    /// `None` means the source may take as long as it likes.
    pub timeout: Option<Duration>,
    /// Oldest cached reading the source may hand back. Zero disables caching.
    pub maximum_age: Duration,
}

impl PositionOptions {
    /// High accuracy, no cached readings.
    pub fn precise(timeout: Option<Duration>) -> Self {
        Self {
            high_accuracy: true,
            timeout,
            maximum_age: Duration::ZERO,
        }
    }
}
