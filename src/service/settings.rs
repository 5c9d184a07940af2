use std::sync::Arc;
use std::time::Duration;

use crate::constants::{
    DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_SECS, MIN_TIMEOUT_SECS, REQUEST_TIMEOUT_KEY,
};
use crate::error::Result;
use crate::storage::Store;

/// Clamp a requested timeout into the supported range
pub fn clamp_timeout(seconds: i64) -> u64 {
    seconds.clamp(MIN_TIMEOUT_SECS as i64, MAX_TIMEOUT_SECS as i64) as u64
}

/// Read/write access to persisted user settings
#[derive(Clone)]
pub struct SettingsService {
    store: Arc<dyn Store>,
}

impl SettingsService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        SettingsService { store }
    }

    /// Stored timeout in seconds; missing or unreadable values give the default
    pub fn request_timeout_seconds(&self) -> u64 {
        match self.store.get_setting(REQUEST_TIMEOUT_KEY) {
            Ok(Some(value)) => match value.trim().parse::<i64>() {
                Ok(seconds) => clamp_timeout(seconds),
                Err(_) => {
                    tracing::debug!(value = %value, "Ignoring unparsable request timeout");
                    DEFAULT_TIMEOUT_SECS
                }
            },
            Ok(None) => DEFAULT_TIMEOUT_SECS,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read request timeout");
                DEFAULT_TIMEOUT_SECS
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds())
    }

    /// Persist a new timeout and return the value actually stored
    pub fn set_request_timeout(&self, seconds: i64) -> Result<u64> {
        let clamped = clamp_timeout(seconds);
        self.store
            .set_setting(REQUEST_TIMEOUT_KEY, &clamped.to_string())?;
        Ok(clamped)
    }
}
