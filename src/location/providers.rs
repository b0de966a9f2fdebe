//! Position sources supplied by the host platform.

use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::models::{Coordinate, NetworkIdentity};

/// Position as a platform capability reports it, before validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: Option<f64>,
}

impl RawFix {
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::new(self.latitude, self.longitude).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeolocationErrorCode {
    PermissionDenied,
    PositionUnavailable,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("geolocation failed ({code:?}): {message}")]
pub struct GeolocationFailure {
    pub code: GeolocationErrorCode,
    pub message: String,
}

#[automock]
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn get_current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<RawFix, GeolocationFailure>;
}

/// Local network identity. Platforms that cannot report the associated
/// network return `None`; that only means the source is skipped.
#[automock]
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn current_network(&self) -> Option<NetworkIdentity>;

    /// Position the platform associates with `network`, if it knows one.
    async fn locate(&self, network: &NetworkIdentity) -> Option<RawFix>;
}

#[automock]
#[async_trait]
pub trait IpLocator: Send + Sync {
    async fn locate(&self) -> anyhow::Result<RawFix>;
}
