use anyhow::{Context, Result};
use chrono::NaiveTime;
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::capture::CameraFacing;
use crate::identity::DEFAULT_WINDOW_SECS;
use crate::location::ResolveOptions;
use crate::models::AllowedNetwork;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureSettings {
    pub location: ResolveOptions,
    /// Readings older than this are refreshed before the record is written.
    pub reading_max_age_secs: u64,
    pub camera_facing: CameraFacing,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            location: ResolveOptions::default(),
            reading_max_age_secs: 120,
            camera_facing: CameraFacing::User,
        }
    }
}

impl CaptureSettings {
    pub fn reading_max_age(&self) -> Duration {
        Duration::from_secs(self.reading_max_age_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenSettings {
    pub window_secs: u64,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_WINDOW_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ShiftSettings {
    /// Local wall-clock start of the working day.
    pub start: NaiveTime,
    pub grace_minutes: u32,
}

impl Default for ShiftSettings {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(8, 30, 0).unwrap_or(NaiveTime::MIN),
            grace_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClockSettings {
    pub capture: CaptureSettings,
    pub token: TokenSettings,
    pub shift: ShiftSettings,
    /// Seeded into the networks table the first time it is found empty.
    pub bootstrap_networks: Vec<AllowedNetwork>,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ClockSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings at {}: {err}", path.display());
                ClockSettings::default()
            })
        } else {
            ClockSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn snapshot(&self) -> ClockSettings {
        self.read().clone()
    }

    pub fn capture(&self) -> CaptureSettings {
        self.read().capture.clone()
    }

    pub fn token(&self) -> TokenSettings {
        self.read().token.clone()
    }

    pub fn shift(&self) -> ShiftSettings {
        self.read().shift
    }

    pub fn bootstrap_networks(&self) -> Vec<AllowedNetwork> {
        self.read().bootstrap_networks.clone()
    }

    pub fn update_capture(&self, settings: CaptureSettings) -> Result<()> {
        let mut guard = self.write();
        guard.capture = settings;
        self.persist(&guard)
    }

    pub fn update_token(&self, settings: TokenSettings) -> Result<()> {
        let mut guard = self.write();
        guard.token = settings;
        self.persist(&guard)
    }

    pub fn update_shift(&self, settings: ShiftSettings) -> Result<()> {
        let mut guard = self.write();
        guard.shift = settings;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: ClockSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed settings in {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &ClockSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, ClockSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ClockSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path().join("settings.json")).expect("store");

        assert_eq!(store.snapshot(), ClockSettings::default());
        assert_eq!(store.token().window_secs, 30);
        assert_eq!(store.shift().grace_minutes, 15);
    }

    #[test]
    fn updates_persist_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).expect("store");
        store
            .update_shift(ShiftSettings {
                start: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
                grace_minutes: 5,
            })
            .expect("persist");

        let reopened = SettingsStore::new(path).expect("reopen");
        assert_eq!(reopened.shift().grace_minutes, 5);
        assert_eq!(
            reopened.shift().start,
            NaiveTime::from_hms_opt(9, 0, 0).expect("valid time")
        );
    }

    #[test]
    fn partial_file_fills_missing_sections() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"bootstrapNetworks":[{"id":"net-1","name":"Office","ssid":"HQ-WIFI","bssid":null}]}"#,
        )
        .expect("write settings");

        let store = SettingsStore::new(path).expect("store");
        assert_eq!(store.bootstrap_networks().len(), 1);
        assert_eq!(store.capture(), CaptureSettings::default());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").expect("write settings");

        let store = SettingsStore::new(path).expect("store");
        assert_eq!(store.snapshot(), ClockSettings::default());
    }
}
