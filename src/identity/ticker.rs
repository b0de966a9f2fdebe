use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::token::{RotatingToken, RotatingTokenValue};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Shared read handle to a user's rotating token. Reads rotate lazily, so a
/// value from an earlier window is never handed out even between ticks.
#[derive(Debug, Clone)]
pub struct TokenHandle {
    token: Arc<Mutex<RotatingToken>>,
}

impl TokenHandle {
    pub fn new(token: RotatingToken) -> Self {
        Self {
            token: Arc::new(Mutex::new(token)),
        }
    }

    pub fn current(&self) -> RotatingTokenValue {
        let mut guard = match self.token.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.current_value()
    }

    fn until_next_window(&self) -> std::time::Duration {
        let guard = match self.token.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.until_next_window(Utc::now())
    }
}

/// Periodic task that regenerates the token at each window boundary and
/// publishes it for the QR display. Runs independently of the capture flow.
pub struct TokenTicker {
    handle: TokenHandle,
    task: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    updates: watch::Sender<RotatingTokenValue>,
}

impl TokenTicker {
    pub fn new(handle: TokenHandle) -> Self {
        let (updates, _) = watch::channel(handle.current());
        Self {
            handle,
            task: None,
            cancel_token: None,
            updates,
        }
    }

    pub fn handle(&self) -> TokenHandle {
        self.handle.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RotatingTokenValue> {
        self.updates.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            bail!("token ticker already running");
        }

        let cancel_token = CancellationToken::new();
        let token_clone = cancel_token.clone();
        let handle = self.handle.clone();
        let updates = self.updates.clone();

        let task = tokio::spawn(async move {
            let mut published = updates.borrow().window_id;
            loop {
                let wait = handle.until_next_window();
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        let value = handle.current();
                        // The timer can fire a hair before the wall-clock boundary.
                        if value.window_id == published {
                            continue;
                        }
                        published = value.window_id;
                        log_debug!("token rotated to window {}", value.window_id);
                        updates.send_replace(value);
                    }
                    _ = token_clone.cancelled() => {
                        log_info!("token ticker shutting down");
                        break;
                    }
                }
            }
        });

        self.task = Some(task);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(task) = self.task.take() {
            task.await.context("token ticker task failed to join")
        } else {
            Ok(())
        }
    }
}

impl Drop for TokenTicker {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn ticker_publishes_next_window() {
        let mut ticker = TokenTicker::new(TokenHandle::new(RotatingToken::new("emp-7", 1)));
        let mut updates = ticker.subscribe();
        let initial = updates.borrow_and_update().clone();

        ticker.start().expect("ticker starts");
        tokio::time::timeout(Duration::from_secs(3), updates.changed())
            .await
            .expect("rotation within a window")
            .expect("sender alive");
        let rotated = updates.borrow().clone();

        assert!(rotated.window_id > initial.window_id);
        assert_ne!(rotated.payload, initial.payload);

        ticker.stop().await.expect("ticker stops");
        assert!(!ticker.is_running());
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let mut ticker = TokenTicker::new(TokenHandle::new(RotatingToken::new("emp-7", 30)));
        ticker.start().expect("first start");
        assert!(ticker.start().is_err());
        ticker.stop().await.expect("ticker stops");
    }

    #[test]
    fn cloned_handles_share_the_window_nonce() {
        let handle = TokenHandle::new(RotatingToken::new("emp-7", 3600));
        let first = handle.current();
        let second = handle.clone().current();
        if first.window_id == second.window_id {
            assert_eq!(first.payload, second.payload);
        }
    }
}
