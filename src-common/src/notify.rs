//! Best-effort alerting.
//!
//! Notifications are fire-and-forget: a sink never reports failure to the
//! caller and never blocks longer than its own timeout.

use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

/// Timeout for a single webhook delivery.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination for operator alerts.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, subject: &str, body: &str);
}

/// Writes alerts to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, subject: &str, body: &str) {
        error!("[NOTIFY] {}: {}", subject, body);
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    body: &'a str,
}

/// POSTs alerts as JSON `{"subject", "body"}` to a webhook URL.
pub struct WebhookSink {
    url: String,
    client: Option<reqwest::blocking::Client>,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| warn!("[NOTIFY] Could not build webhook client: {}", e))
            .ok();
        Self {
            url: url.into(),
            client,
        }
    }
}

impl NotificationSink for WebhookSink {
    fn notify(&self, subject: &str, body: &str) {
        // Always leave a trace in the log, delivered or not.
        LogSink.notify(subject, body);

        let Some(client) = &self.client else {
            return;
        };
        let payload = WebhookPayload { subject, body };
        match client
            .post(&self.url)
            .json(&payload)
            .send()
            .and_then(|r| r.error_for_status())
        {
            Ok(_) => info!("[NOTIFY] Delivered '{}' to webhook", subject),
            Err(e) => warn!("[NOTIFY] Webhook delivery failed: {}", e),
        }
    }
}

/// Pick a sink: webhook when a URL is configured, log otherwise.
pub fn sink_for(webhook_url: Option<&str>) -> Box<dyn NotificationSink> {
    match webhook_url.map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => Box::new(WebhookSink::new(url)),
        None => Box::new(LogSink),
    }
}
