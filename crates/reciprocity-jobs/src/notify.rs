//! Webhook delivery of notification batches.
//!
//! One POST per batch to `{RECIPROCITY_BACKEND_URL}/webhooks/matches-ready`.
//! Any 2xx response confirms delivery; everything else is an
//! [`Error::Notification`] and leaves the batch unmarked.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{info, warn};

use reciprocity_core::defaults::{
    WEBHOOK_API_KEY_HEADER, WEBHOOK_MATCHES_READY_PATH, WEBHOOK_SIGNATURE_HEADER,
    WEBHOOK_TIMEOUT_SECS,
};
use reciprocity_core::{Error, NotificationBatch, NotificationSink, Result};

type HmacSha256 = Hmac<Sha256>;

/// Configuration for the webhook sink.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub backend_url: String,
    pub api_key: Option<String>,
    pub secret: Option<String>,
    pub timeout: Duration,
}

impl WebhookConfig {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            api_key: None,
            secret: None,
            timeout: Duration::from_secs(WEBHOOK_TIMEOUT_SECS),
        }
    }

    /// Read from the environment. `None` when no backend URL is configured.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `RECIPROCITY_BACKEND_URL` | (none) | Base URL of the receiving backend |
    /// | `WEBHOOK_API_KEY` | (none) | Sent as `X-API-KEY` |
    /// | `WEBHOOK_SECRET` | (none) | HMAC-SHA256 signing key |
    /// | `WEBHOOK_TIMEOUT_SECS` | `30` | Request timeout |
    pub fn from_env() -> Option<Self> {
        let backend_url = std::env::var("RECIPROCITY_BACKEND_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())?;
        let timeout_secs = std::env::var("WEBHOOK_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(WEBHOOK_TIMEOUT_SECS);

        Some(Self {
            backend_url,
            api_key: std::env::var("WEBHOOK_API_KEY").ok().filter(|v| !v.is_empty()),
            secret: std::env::var("WEBHOOK_SECRET").ok().filter(|v| !v.is_empty()),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.backend_url.trim_end_matches('/'),
            WEBHOOK_MATCHES_READY_PATH
        )
    }
}

/// Wire shape of one pair. The receiver expects strings, not nulls.
#[derive(Serialize)]
struct WireMatch<'a> {
    user_a_id: &'a str,
    user_b_id: &'a str,
    user_a_designation: &'a str,
    user_b_designation: &'a str,
}

#[derive(Serialize)]
struct WireBatch<'a> {
    batch_id: String,
    matches: Vec<WireMatch<'a>>,
}

impl<'a> From<&'a NotificationBatch> for WireBatch<'a> {
    fn from(batch: &'a NotificationBatch) -> Self {
        Self {
            batch_id: batch.batch_id.to_string(),
            matches: batch
                .matches
                .iter()
                .map(|m| WireMatch {
                    user_a_id: &m.user_a_id,
                    user_b_id: &m.user_b_id,
                    user_a_designation: m.user_a_designation.as_deref().unwrap_or(""),
                    user_b_designation: m.user_b_designation.as_deref().unwrap_or(""),
                })
                .collect(),
        }
    }
}

/// Hex HMAC-SHA256 of `body` under `secret`, as sent in the signature header.
pub fn sign_body(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Config(format!("invalid webhook secret: {}", e)))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// [`NotificationSink`] posting batches to the backend webhook.
pub struct WebhookNotificationSink {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookNotificationSink {
    pub fn new(config: WebhookConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn send_batch(&self, batch: &NotificationBatch) -> Result<()> {
        let start = Instant::now();
        let body = serde_json::to_vec(&WireBatch::from(batch))?;

        let mut request = self
            .client
            .post(self.config.endpoint())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.config.api_key {
            request = request.header(WEBHOOK_API_KEY_HEADER, key);
        }
        if let Some(secret) = &self.config.secret {
            request = request.header(WEBHOOK_SIGNATURE_HEADER, sign_body(secret, &body)?);
        }

        let response = request.body(body).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout {
                    operation: "notification_batch".to_string(),
                    after_ms: self.config.timeout.as_millis() as u64,
                }
            } else {
                Error::Notification(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(
                subsystem = "jobs",
                component = "notification_sink",
                batch_id = %batch.batch_id,
                status = status.as_u16(),
                pair_count = batch.matches.len(),
                "Notification batch rejected"
            );
            return Err(Error::Notification(format!(
                "backend returned {}: {}",
                status, text
            )));
        }

        info!(
            subsystem = "jobs",
            component = "notification_sink",
            batch_id = %batch.batch_id,
            pair_count = batch.matches.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Notification batch delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reciprocity_core::NotificationMatch;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = WebhookConfig::new("http://backend:8000/api/v1/");
        assert_eq!(
            config.endpoint(),
            "http://backend:8000/api/v1/webhooks/matches-ready"
        );
    }

    #[test]
    fn wire_batch_uses_empty_designations() {
        let batch = NotificationBatch::new(vec![NotificationMatch {
            user_a_id: "a".into(),
            user_b_id: "b".into(),
            user_a_designation: Some("Founder".into()),
            user_b_designation: None,
        }]);
        let value = serde_json::to_value(WireBatch::from(&batch)).unwrap();
        assert_eq!(value["matches"][0]["user_a_designation"], "Founder");
        assert_eq!(value["matches"][0]["user_b_designation"], "");
        assert_eq!(value["batch_id"], batch.batch_id.to_string());
    }

    #[test]
    fn signature_is_stable() {
        let a = sign_body("secret", b"{}").unwrap();
        let b = sign_body("secret", b"{}").unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("sha256="));
        assert_eq!(a.len(), "sha256=".len() + 64);
        assert_ne!(a, sign_body("other", b"{}").unwrap());
    }
}
