//! Error types surfaced by the engine.
//!
//! Transport failures are deliberately absent: executing a request always
//! yields an [`Outcome`](crate::models::Outcome), even when the call fails.

use thiserror::Error;

/// Errors returned to callers of the library.
#[derive(Debug, Error)]
pub enum Error {
    /// The entity does not exist, or does not belong to the stated parent.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("unsupported format '{0}'. Supported formats: raw, curl, fetch, python")]
    UnsupportedFormat(String),

    #[error("invalid curl command: {0}")]
    InvalidCurl(String),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage encoding failed: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Error::NotFound { entity, id }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
