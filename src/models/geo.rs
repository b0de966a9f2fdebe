//! Position and authorized-location data models.
//!
//! Zones and networks are created by administrators elsewhere; the clock
//! engine only reads them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("coordinate out of range: latitude {latitude}, longitude {longitude}")]
pub struct InvalidCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinate> {
        // NaN fails both range checks.
        if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(InvalidCoordinate {
                latitude,
                longitude,
            })
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllowedZone {
    pub id: String,
    pub name: String,
    pub center: Coordinate,
    pub radius_meters: f64,
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AllowedNetwork {
    pub id: String,
    pub name: String,
    pub ssid: String,
    pub bssid: Option<String>,
}

/// The network the device is currently associated with, as reported by the
/// local probe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkIdentity {
    pub ssid: String,
    pub bssid: Option<String>,
}

impl AllowedNetwork {
    /// SSID must match exactly; the BSSID only matters when the allowed entry pins one.
    pub fn matches(&self, network: &NetworkIdentity) -> bool {
        if self.ssid != network.ssid {
            return false;
        }
        match &self.bssid {
            None => true,
            Some(expected) => network.bssid.as_deref() == Some(expected.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PositionSource {
    Gps,
    Network,
    Ip,
}

impl PositionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionSource::Gps => "gps",
            PositionSource::Network => "network",
            PositionSource::Ip => "ip",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PositionReading {
    pub coords: Coordinate,
    pub accuracy_meters: Option<f64>,
    pub source: PositionSource,
    pub captured_at: DateTime<Utc>,
}

impl PositionReading {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.captured_at
    }

    /// Readings stamped in the future (clock skew) count as fresh.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: std::time::Duration) -> bool {
        match Duration::from_std(max_age) {
            Ok(max_age) => self.age(now) <= max_age,
            Err(_) => true,
        }
    }
}
