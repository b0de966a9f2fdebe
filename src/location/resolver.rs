use std::{sync::Arc, time::Duration};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{self, Instant};

use crate::models::{NetworkIdentity, PositionReading, PositionSource};

use super::providers::{
    GeolocationErrorCode, GeolocationProvider, IpLocator, NetworkProbe, PositionOptions, RawFix,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("no location source available")]
    Unavailable,
    #[error("location request timed out")]
    Timeout,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolveOptions {
    pub use_gps: bool,
    pub use_network: bool,
    pub use_ip: bool,
    #[serde(with = "millis")]
    pub timeout: Duration,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            use_gps: true,
            use_network: true,
            use_ip: true,
            timeout: Duration::from_secs(30),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Tries GPS, then the local network, then IP geolocation, all within one
/// deadline. Capabilities that are not installed are skipped.
#[derive(Clone, Default)]
pub struct LocationResolver {
    gps: Option<Arc<dyn GeolocationProvider>>,
    network: Option<Arc<dyn NetworkProbe>>,
    ip: Option<Arc<dyn IpLocator>>,
}

impl LocationResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gps(mut self, provider: Arc<dyn GeolocationProvider>) -> Self {
        self.gps = Some(provider);
        self
    }

    pub fn with_network(mut self, probe: Arc<dyn NetworkProbe>) -> Self {
        self.network = Some(probe);
        self
    }

    pub fn with_ip(mut self, locator: Arc<dyn IpLocator>) -> Self {
        self.ip = Some(locator);
        self
    }

    pub async fn resolve(&self, options: &ResolveOptions) -> Result<PositionReading, LocationError> {
        log_debug!("resolving position with {:?}", options);
        let deadline = Instant::now() + options.timeout;
        let mut denied = false;
        let mut timed_out = false;

        if let (true, Some(gps)) = (options.use_gps, self.gps.as_ref()) {
            let request = PositionOptions {
                enable_high_accuracy: true,
                timeout: options.timeout,
                maximum_age: Duration::ZERO,
            };
            match time::timeout_at(deadline, gps.get_current_position(&request)).await {
                Ok(Ok(fix)) => {
                    if let Some(reading) = normalize(fix, PositionSource::Gps) {
                        return Ok(reading);
                    }
                    log_warn!("gps returned an out-of-range fix: {:?}", fix);
                }
                Ok(Err(failure)) => {
                    log_info!("gps source failed: {failure}");
                    match failure.code {
                        GeolocationErrorCode::PermissionDenied => denied = true,
                        GeolocationErrorCode::Timeout => timed_out = true,
                        GeolocationErrorCode::PositionUnavailable => {}
                    }
                }
                Err(_) => {
                    log_warn!("gps did not respond within {:?}", options.timeout);
                    timed_out = true;
                }
            }
        }

        if let (true, Some(probe)) = (options.use_network, self.network.as_ref()) {
            let lookup = async {
                let network = probe.current_network().await?;
                probe.locate(&network).await
            };
            match time::timeout_at(deadline, lookup).await {
                Ok(Some(fix)) => {
                    if let Some(reading) = normalize(fix, PositionSource::Network) {
                        return Ok(reading);
                    }
                    log_warn!("network source returned an out-of-range fix: {:?}", fix);
                }
                Ok(None) => log_info!("network source has no position"),
                Err(_) => timed_out = true,
            }
        }

        if let (true, Some(locator)) = (options.use_ip, self.ip.as_ref()) {
            match time::timeout_at(deadline, locator.locate()).await {
                Ok(Ok(fix)) => {
                    if let Some(reading) = normalize(fix, PositionSource::Ip) {
                        return Ok(reading);
                    }
                    log_warn!("ip source returned an out-of-range fix: {:?}", fix);
                }
                Ok(Err(err)) => log_info!("ip source failed: {err:#}"),
                Err(_) => timed_out = true,
            }
        }

        Err(if denied {
            LocationError::PermissionDenied
        } else if timed_out {
            LocationError::Timeout
        } else {
            LocationError::Unavailable
        })
    }

    /// Network the device is associated with, for the network compliance check.
    pub async fn current_network(&self) -> Option<NetworkIdentity> {
        match &self.network {
            Some(probe) => probe.current_network().await,
            None => None,
        }
    }
}

fn normalize(fix: RawFix, source: PositionSource) -> Option<PositionReading> {
    Some(PositionReading {
        coords: fix.coordinate()?,
        accuracy_meters: fix.accuracy_meters,
        source,
        captured_at: Utc::now(),
    })
}
