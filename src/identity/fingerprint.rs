//! Weak device fingerprint attached to each clock event.
//!
//! Format: `{user_agent}-{platform}-{width}x{height}-{color_depth}`. Not
//! hashed and not an identity guarantee; it only has to stay stable for one
//! device configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

const PLACEHOLDER: &str = "unknown";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub user_agent: Option<String>,
    pub platform: Option<String>,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
    pub color_depth: Option<u8>,
}

impl DeviceProfile {
    /// Profile of the host process. Screen geometry is left for the UI shell to fill in.
    pub fn detect() -> Self {
        Self {
            user_agent: Some(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            )),
            platform: Some(format!(
                "{}-{}",
                std::env::consts::OS,
                std::env::consts::ARCH
            )),
            screen_width: None,
            screen_height: None,
            color_depth: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct DeviceFingerprint(String);

impl DeviceFingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn fingerprint(profile: &DeviceProfile) -> DeviceFingerprint {
    fn text(value: &Option<String>) -> &str {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(PLACEHOLDER)
    }

    fn number<T: ToString>(value: Option<T>) -> String {
        value.map_or_else(|| PLACEHOLDER.to_string(), |v| v.to_string())
    }

    DeviceFingerprint(format!(
        "{}-{}-{}x{}-{}",
        text(&profile.user_agent),
        text(&profile.platform),
        number(profile.screen_width),
        number(profile.screen_height),
        number(profile.color_depth),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_profile_uses_documented_format() {
        let profile = DeviceProfile {
            user_agent: Some("Mozilla/5.0".into()),
            platform: Some("Linux x86_64".into()),
            screen_width: Some(1920),
            screen_height: Some(1080),
            color_depth: Some(24),
        };
        assert_eq!(
            fingerprint(&profile).as_str(),
            "Mozilla/5.0-Linux x86_64-1920x1080-24"
        );
    }

    #[test]
    fn missing_properties_use_placeholder() {
        let profile = DeviceProfile {
            user_agent: Some("  ".into()),
            screen_width: Some(390),
            ..DeviceProfile::default()
        };
        assert_eq!(
            fingerprint(&profile).as_str(),
            "unknown-unknown-390xunknown-unknown"
        );
    }

    #[test]
    fn fingerprint_is_stable() {
        let profile = DeviceProfile::detect();
        assert_eq!(fingerprint(&profile), fingerprint(&profile));
        assert!(fingerprint(&profile).as_str().starts_with("geoclock/"));
    }
}
