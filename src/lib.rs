//! Geofenced attendance clock-in engine.
//!
//! Decides whether an employee may clock in or out from where they stand and
//! drives the locate, photograph, confirm and save flow around that decision.

pub mod capture;
pub mod db;
pub mod errors;
pub mod geo;
pub mod identity;
pub mod location;
pub mod models;
pub mod settings;
pub mod store;
mod utils;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::sync::watch;

use capture::{Camera, CaptureController, CaptureDeps};
use db::Database;
use identity::{
    fingerprint, DeviceFingerprint, DeviceProfile, RotatingToken, RotatingTokenValue, TokenHandle,
    TokenTicker,
};
use location::{GeolocationProvider, IpLocator, LocationResolver, NetworkProbe};
use settings::SettingsStore;
use store::AddressResolver;

pub use errors::AttendanceError;

/// Initializes `env_logger` at Info unless `RUST_LOG` says otherwise.
pub fn init_logging() {
    if env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .is_err()
    {
        warn!("logger already initialized");
    }
}

/// Platform capabilities supplied by the host shell. Any position source may
/// be missing; the camera may not.
#[derive(Clone)]
pub struct Capabilities {
    pub gps: Option<Arc<dyn GeolocationProvider>>,
    pub network: Option<Arc<dyn NetworkProbe>>,
    pub ip: Option<Arc<dyn IpLocator>>,
    pub camera: Arc<dyn Camera>,
    pub addresses: Option<Arc<dyn AddressResolver>>,
    pub device: DeviceProfile,
}

impl Capabilities {
    pub fn new(camera: Arc<dyn Camera>) -> Self {
        Self {
            gps: None,
            network: None,
            ip: None,
            camera,
            addresses: None,
            device: DeviceProfile::detect(),
        }
    }

    fn resolver(&self) -> LocationResolver {
        let mut resolver = LocationResolver::new();
        if let Some(gps) = &self.gps {
            resolver = resolver.with_gps(Arc::clone(gps));
        }
        if let Some(network) = &self.network {
            resolver = resolver.with_network(Arc::clone(network));
        }
        if let Some(ip) = &self.ip {
            resolver = resolver.with_ip(Arc::clone(ip));
        }
        resolver
    }
}

pub struct ClockApp {
    db: Database,
    settings: SettingsStore,
    capabilities: Capabilities,
    fingerprint: DeviceFingerprint,
}

impl ClockApp {
    /// Opens the database and settings under `data_dir`, creating both on
    /// first run.
    pub async fn open(data_dir: &Path, capabilities: Capabilities) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let db = Database::new(data_dir.join("geoclock.sqlite3"))?;
        let settings = SettingsStore::new(data_dir.join("settings.json"))?;

        let seeded = db
            .seed_bootstrap_networks(settings.bootstrap_networks())
            .await
            .context("failed to seed bootstrap networks")?;
        if seeded > 0 {
            info!("Added {seeded} networks from settings");
        }

        let fingerprint = fingerprint(&capabilities.device);
        info!("geoclock ready on device {fingerprint}");

        Ok(Self {
            db,
            settings,
            capabilities,
            fingerprint,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn fingerprint(&self) -> &DeviceFingerprint {
        &self.fingerprint
    }

    /// Wires a capture controller and starts the QR token ticker for `user_id`.
    /// Must be called from within a Tokio runtime.
    pub fn open_clock_page(&self, user_id: &str) -> Result<ClockPage> {
        let token = TokenHandle::new(RotatingToken::new(
            user_id,
            self.settings.token().window_secs,
        ));
        let mut ticker = TokenTicker::new(token.clone());
        ticker.start()?;

        let deps = CaptureDeps {
            records: Arc::new(self.db.clone()),
            directory: Arc::new(self.db.clone()),
            resolver: self.capabilities.resolver(),
            camera: Arc::clone(&self.capabilities.camera),
            addresses: self.capabilities.addresses.clone(),
        };
        let capture = CaptureController::new(
            user_id,
            deps,
            self.fingerprint.clone(),
            token,
            self.settings.capture(),
            self.settings.shift(),
        );

        info!("clock page opened for {user_id}");
        Ok(ClockPage { capture, ticker })
    }
}

/// One open clock screen. Close it to release the camera and stop the ticker.
pub struct ClockPage {
    pub capture: CaptureController,
    ticker: TokenTicker,
}

impl ClockPage {
    pub fn token_updates(&self) -> watch::Receiver<RotatingTokenValue> {
        self.ticker.subscribe()
    }

    pub fn current_token(&self) -> RotatingTokenValue {
        self.ticker.handle().current()
    }

    pub async fn close(mut self) -> Result<()> {
        self.capture.cancel().await;
        self.ticker.stop().await?;
        info!("clock page closed for {}", self.capture.user_id());
        Ok(())
    }
}
