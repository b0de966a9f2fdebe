use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOW_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RotatingTokenValue {
    pub payload: String,
    pub window_id: i64,
}

/// QR payload that changes every window.
///
/// The nonce is drawn once per window and reused for every read within it, so
/// redraws inside a window show the same code.
#[derive(Debug, Clone)]
pub struct RotatingToken {
    user_id: String,
    window_secs: u64,
    current: Option<(i64, u128)>,
}

impl RotatingToken {
    pub fn new(user_id: impl Into<String>, window_secs: u64) -> Self {
        Self {
            user_id: user_id.into(),
            window_secs: window_secs.max(1),
            current: None,
        }
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    pub fn window_id(&self, now: DateTime<Utc>) -> i64 {
        let window = i64::try_from(self.window_secs).unwrap_or(i64::MAX);
        now.timestamp().div_euclid(window)
    }

    /// Seconds until the next window starts.
    pub fn until_next_window(&self, now: DateTime<Utc>) -> std::time::Duration {
        let window_ms = i64::try_from(self.window_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        let elapsed = now.timestamp_millis().rem_euclid(window_ms);
        std::time::Duration::from_millis(u64::try_from(window_ms - elapsed).unwrap_or(0))
    }

    pub fn current_value(&mut self) -> RotatingTokenValue {
        self.current_value_at(Utc::now())
    }

    pub fn current_value_at(&mut self, now: DateTime<Utc>) -> RotatingTokenValue {
        let window_id = self.window_id(now);
        let nonce = match self.current {
            Some((held_window, nonce)) if held_window == window_id => nonce,
            previous => {
                let previous_nonce = previous.map(|(_, nonce)| nonce);
                let mut rng = rand::thread_rng();
                let mut nonce: u128 = rng.gen();
                while Some(nonce) == previous_nonce {
                    nonce = rng.gen();
                }
                self.current = Some((window_id, nonce));
                nonce
            }
        };

        RotatingTokenValue {
            payload: format!("{}:{}:{:032x}", self.user_id, window_id, nonce),
            window_id,
        }
    }

    /// True when the held nonce belongs to an earlier window.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.current
            .map_or(true, |(window_id, _)| window_id != self.window_id(now))
    }
}
