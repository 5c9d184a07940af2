//! Application constants
//!
//! Centralized location for magic strings and configuration defaults.

use std::time::Duration;

/// Application name
pub const APP_NAME: &str = "Reqforge";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identification header sent with every executed request
pub const USER_AGENT: &str = concat!("Reqforge/", env!("CARGO_PKG_VERSION"), " (HTTP API Client)");

/// Default URL for new HTTP requests
pub const DEFAULT_HTTP_URL: &str = "https://httpbin.org/get";

/// Host shown in raw renderings when the URL carries no authority
pub const UNKNOWN_HOST: &str = "unknown-host";

/// Content type injected for form bodies
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Settings key holding the request timeout in seconds
pub const REQUEST_TIMEOUT_KEY: &str = "request_timeout_seconds";

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const MIN_TIMEOUT_SECS: u64 = 1;
/// Three hours
pub const MAX_TIMEOUT_SECS: u64 = 10_800;

/// History entries surfaced per request
pub const HISTORY_LIMIT: usize = 10;

/// Directory under $HOME holding the store and log file
pub const DATA_DIR_NAME: &str = ".reqforge";
pub const STORE_FILE: &str = "store.yaml";
pub const LOG_FILE: &str = "reqforge.log";

/// Telemetry flush loop period
pub const TELEMETRY_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
/// Minimum spacing between queued deliveries of the same event kind
pub const TELEMETRY_RATE_WINDOW: Duration = Duration::from_secs(6);
/// Window during which identical events are delivered once
pub const TELEMETRY_DEDUP_WINDOW_SECS: i64 = 3600;
pub const TELEMETRY_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);
pub const TELEMETRY_STACK_LIMIT: usize = 1000;
