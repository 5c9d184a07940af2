//! # Reqforge
//!
//! Core of an HTTP API client, similar to Postman/Insomnia.
//!
//! ## Features
//! - One resolver feeding every output: execution, raw HTTP, cURL, fetch and
//!   Python `requests` snippets
//! - Auth support (Bearer, Basic), query params, raw and form bodies
//! - Request history (last 10 per request)
//! - cURL import/export
//! - Telemetry queue with rate limiting and deduplication
//!
//! ## Architecture
//! - [`resolve`] - request definition to effective request
//! - [`format`] - renderers over the effective request
//! - [`network`] - executor producing an [`Outcome`]
//! - [`storage`] - persistence behind the [`Store`] trait
//! - [`telemetry`] - event pipeline and background flush loop
//! - [`app`] - the [`Workbench`] facade tying it together

pub mod app;
pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod models;
pub mod network;
pub mod resolve;
pub mod service;
pub mod storage;
pub mod telemetry;

// Re-export commonly used types
pub use app::Workbench;
pub use config::AppConfig;
pub use error::{Error, Result};
pub use format::{all_formats, get_format, parse_curl, to_curl, Format, RequestFormats};
pub use models::{
    AuthType, BasicAuth, BodyType, Folder, FormField, HistoryEntry, Outcome, Project, QueryParam,
    Request, TelemetryConfig,
};
pub use network::Executor;
pub use resolve::{resolve, EffectiveRequest};
pub use service::{RequestService, SettingsService};
pub use storage::{Storage, Store};
pub use telemetry::{FlushLoop, ReqwestWebhook, Telemetry, WebhookSink};
