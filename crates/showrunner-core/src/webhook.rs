//! Webhook notification system.
//!
//! Engine events can be pushed through an mpsc channel. The
//! [`WebhookDispatcher`] reads from that channel and POSTs JSON payloads to
//! every configured endpoint that accepts the event type.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::event::EngineEvent;

pub const SIGNATURE_HEADER: &str = "X-Showrunner-Signature-256";

/// Configuration for a single webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// The URL to POST payloads to.
    pub url: String,

    /// Which event types to deliver (`advanced`, `user_paused`, ...). Empty means all.
    #[serde(default)]
    pub events: Vec<String>,

    #[serde(default = "default_webhook_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_webhook_retries")]
    pub max_retries: u32,

    /// Optional HMAC-SHA256 signing secret for the signature header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

fn default_webhook_timeout_ms() -> u64 {
    5000
}

fn default_webhook_retries() -> u32 {
    2
}

impl WebhookConfig {
    pub fn accepts(&self, notification_type: &str) -> bool {
        if self.events.is_empty() {
            return true;
        }
        self.events.iter().any(|e| e == notification_type)
    }
}

/// An engine event tagged with the engine instance that produced it.
#[derive(Debug, Clone)]
pub struct Notification {
    pub instance_id: String,
    pub event: EngineEvent,
}

impl Notification {
    pub fn notification_type(&self) -> &'static str {
        self.event.kind.as_str()
    }
}

/// The JSON envelope POSTed to webhook endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub version: u8,
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub instance_id: String,
    pub page_id: Option<Uuid>,
    pub data: serde_json::Value,
}

impl WebhookPayload {
    pub fn from_notification(notification: &Notification) -> Self {
        let event = &notification.event;
        Self {
            version: 1,
            id: Uuid::new_v4().to_string(),
            timestamp: event.timestamp,
            notification_type: notification.notification_type().to_string(),
            instance_id: notification.instance_id.clone(),
            page_id: event.page_id,
            data: serde_json::json!({
                "event_id": event.id,
                "position": event.position,
                "details": event.details,
            }),
        }
    }
}

/// Why a payload did not reach an endpoint.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("cannot sign payload: {0}")]
    Signing(#[from] hmac::digest::InvalidLength),
    #[error("endpoint rejected payload with HTTP {0}")]
    Rejected(StatusCode),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// Reads notifications from the channel and POSTs each one to every
/// endpoint that accepts its type. Runs until all senders are dropped.
pub struct WebhookDispatcher {
    rx: mpsc::UnboundedReceiver<Notification>,
    webhooks: Vec<WebhookConfig>,
    client: Client,
}

impl WebhookDispatcher {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Notification>,
        webhooks: Vec<WebhookConfig>,
        client: Client,
    ) -> Self {
        Self {
            rx,
            webhooks,
            client,
        }
    }

    pub async fn run(mut self) {
        debug!(endpoints = self.webhooks.len(), "Webhook dispatcher running");
        while let Some(notification) = self.rx.recv().await {
            self.dispatch(&notification).await;
        }
        debug!("Notification channel closed, webhook dispatcher exiting");
    }

    async fn dispatch(&self, notification: &Notification) {
        let kind = notification.notification_type();
        let targets: Vec<&WebhookConfig> =
            self.webhooks.iter().filter(|wh| wh.accepts(kind)).collect();
        if targets.is_empty() {
            return;
        }

        let body = match serde_json::to_vec(&WebhookPayload::from_notification(notification)) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, kind, "Cannot encode webhook payload");
                return;
            }
        };

        for wh in targets {
            match deliver(&self.client, wh, &body).await {
                Ok(()) => debug!(url = %wh.url, kind, "Webhook delivered"),
                Err(e) => warn!(url = %wh.url, kind, error = %e, "Webhook delivery failed"),
            }
        }
    }
}

/// Shared client for webhook delivery. Per-request timeouts come from each
/// [`WebhookConfig`].
pub fn build_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(4)
        .build()
}

pub fn notification_channel() -> (
    mpsc::UnboundedSender<Notification>,
    mpsc::UnboundedReceiver<Notification>,
) {
    mpsc::unbounded_channel()
}

/// Wait before retry number `retry` (1-based): 500 ms, 1 s, 2 s, ...
fn backoff(retry: u32) -> Duration {
    Duration::from_millis(500u64.saturating_mul(1 << (retry - 1).min(10)))
}

async fn deliver(client: &Client, wh: &WebhookConfig, body: &[u8]) -> Result<(), DeliveryError> {
    let signature = wh
        .secret
        .as_deref()
        .map(|secret| sign_payload(body, secret))
        .transpose()?;
    let timeout = Duration::from_millis(wh.timeout_ms);
    let attempts = wh.max_retries + 1;
    let mut last = String::new();

    for attempt in 0..attempts {
        if attempt > 0 {
            tokio::time::sleep(backoff(attempt)).await;
        }

        let mut req = client
            .post(&wh.url)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, concat!("showrunner/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .body(body.to_vec());
        if let Some(signature) = &signature {
            req = req.header(SIGNATURE_HEADER, format!("sha256={signature}"));
        }

        last = match req.send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            // 429 is worth another try, other client errors are final
            Ok(resp)
                if resp.status().is_client_error()
                    && resp.status() != StatusCode::TOO_MANY_REQUESTS =>
            {
                return Err(DeliveryError::Rejected(resp.status()));
            }
            Ok(resp) => format!("HTTP {}", resp.status()),
            Err(e) => e.to_string(),
        };
        debug!(url = %wh.url, attempt = attempt + 1, error = %last, "Webhook attempt failed");
    }

    Err(DeliveryError::Exhausted { attempts, last })
}

fn sign_payload(body: &[u8], secret: &str) -> Result<String, hmac::digest::InvalidLength> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}
