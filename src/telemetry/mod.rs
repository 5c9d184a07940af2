//! Telemetry pipeline
//!
//! Events are queued in memory, flushed on an interval, rate limited per
//! kind, deduplicated by content hash and posted to a chat webhook.

mod actor;
pub mod event;
mod payload;
mod service;
mod sink;

pub use actor::FlushLoop;
pub use event::{Event, EventKind, Metrics};
pub use service::Telemetry;
pub use sink::{DeliveryError, ReqwestWebhook, WebhookSink};
