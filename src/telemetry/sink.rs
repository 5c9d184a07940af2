use std::future::Future;

use serde_json::Value;
use thiserror::Error;

use crate::constants::{TELEMETRY_WEBHOOK_TIMEOUT, USER_AGENT};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("webhook returned status {0}")]
    Status(u16),
}

/// Destination for telemetry payloads.
///
/// Implemented over reqwest by [`ReqwestWebhook`]; tests substitute a
/// recording double.
pub trait WebhookSink: Send + Sync + 'static {
    fn deliver(
        &self,
        url: &str,
        payload: &Value,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}

/// JSON POST with a short timeout
#[derive(Clone, Debug)]
pub struct ReqwestWebhook {
    client: reqwest::Client,
}

impl ReqwestWebhook {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(TELEMETRY_WEBHOOK_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        ReqwestWebhook { client }
    }
}

impl Default for ReqwestWebhook {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookSink for ReqwestWebhook {
    async fn deliver(&self, url: &str, payload: &Value) -> Result<(), DeliveryError> {
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }
        Ok(())
    }
}
