//! Runtime configuration: defaults, then environment, then CLI flags

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{DATA_DIR_NAME, TELEMETRY_FLUSH_INTERVAL};

pub const DATA_DIR_ENV: &str = "REQFORGE_DATA_DIR";
pub const WEBHOOK_ENV: &str = "REQFORGE_TELEMETRY_WEBHOOK";

#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    /// Holds the store file and the log
    pub data_dir: PathBuf,
    /// Service-provided telemetry webhook
    pub telemetry_webhook: Option<String>,
    pub flush_interval: Duration,
}

impl AppConfig {
    /// Build from a variable lookup; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        AppConfig {
            data_dir: get(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            telemetry_webhook: get(WEBHOOK_ENV),
            flush_interval: TELEMETRY_FLUSH_INTERVAL,
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, data_dir: Option<PathBuf>, webhook: Option<String>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        if let Some(url) = webhook.filter(|url| !url.is_empty()) {
            self.telemetry_webhook = Some(url);
        }
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.data_dir.ends_with(".reqforge"));
        assert_eq!(config.telemetry_webhook, None);
        assert_eq!(config.flush_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_environment_values() {
        let config = AppConfig::from_lookup(lookup(&[
            (DATA_DIR_ENV, "/tmp/rf"),
            (WEBHOOK_ENV, "https://hooks.example.test/1"),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/rf"));
        assert_eq!(config.telemetry_webhook.as_deref(), Some("https://hooks.example.test/1"));
    }

    #[test]
    fn test_flags_override_environment() {
        let config = AppConfig::from_lookup(lookup(&[(WEBHOOK_ENV, "https://env.example.test")]))
            .with_overrides(
                Some(PathBuf::from("/data")),
                Some(String::from("https://flag.example.test")),
            );
        assert_eq!(config.data_dir, PathBuf::from("/data"));
        assert_eq!(config.telemetry_webhook.as_deref(), Some("https://flag.example.test"));

        let blank = AppConfig::from_lookup(lookup(&[(WEBHOOK_ENV, "  ")]));
        assert_eq!(blank.telemetry_webhook, None);
    }
}
