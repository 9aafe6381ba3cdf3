//! Business handlers: what happens to a webhook once it has been verified.
//!
//! The intake pipeline only knows the [`WebhookHandler`] trait. A handler may be called several
//! times for the same delivery (see [`retry`](super::retry)), so implementations must be
//! idempotent.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;

use crate::config::{Config, ForwardConfig};

/// Processes a verified webhook payload.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Handle one delivery attempt.
    ///
    /// `payload` is the raw body exactly as the provider sent it. Return `Err` to have the attempt
    /// retried under the configured policy.
    async fn handle(&self, provider: &str, payload: Bytes) -> anyhow::Result<()>;
}

/// Create the business handler from configuration
///
/// Forwards to the downstream billing service when `forward` is configured, otherwise
/// acknowledges and logs.
pub fn create_handler(config: &Config) -> anyhow::Result<Box<dyn WebhookHandler>> {
    match &config.forward {
        Some(forward) => Ok(Box::new(ForwardingHandler::new(forward)?)),
        None => Ok(Box::new(LoggingHandler)),
    }
}

/// Acknowledges every verified payload without acting on it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingHandler;

#[async_trait]
impl WebhookHandler for LoggingHandler {
    async fn handle(&self, provider: &str, payload: Bytes) -> anyhow::Result<()> {
        tracing::info!(provider, bytes = payload.len(), "Verified webhook received (no downstream configured)");
        Ok(())
    }
}

/// Posts verified payloads to a downstream service.
pub struct ForwardingHandler {
    url: url::Url,
    http_client: reqwest::Client,
}

impl ForwardingHandler {
    pub fn new(config: &ForwardConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create forwarding HTTP client: {e}"))?;

        Ok(Self {
            url: config.url.clone(),
            http_client,
        })
    }

    pub fn with_timeout(url: url::Url, timeout: Duration) -> anyhow::Result<Self> {
        Self::new(&ForwardConfig { url, timeout })
    }
}

#[async_trait]
impl WebhookHandler for ForwardingHandler {
    async fn handle(&self, provider: &str, payload: Bytes) -> anyhow::Result<()> {
        let response = self
            .http_client
            .post(self.url.clone())
            .header("content-type", "application/json")
            .header("x-webhook-provider", provider)
            .body(payload)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Forwarding request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Downstream returned HTTP {}", status.as_u16());
        }

        tracing::debug!(provider, status = status.as_u16(), "Webhook forwarded");
        Ok(())
    }
}
