//! Services sitting between callers and the store

mod requests;
mod settings;

pub use requests::RequestService;
pub use settings::{clamp_timeout, SettingsService};
