//! Notification fan-out seam.
//!
//! The core only emits well-formed event descriptors; delivery is the
//! collaborator's problem. Dispatch is fire-and-forget: a failed delivery
//! is logged and never fails the originating transition or settlement.

use async_trait::async_trait;
use std::time::Duration;

use crate::models::NotificationEvent;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn dispatch(&self, event: NotificationEvent);
}

/// Dispatcher that only logs events. The default when no webhook is
/// configured, and useful for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct LoggingDispatcher;

#[async_trait]
impl NotificationSink for LoggingDispatcher {
    async fn dispatch(&self, event: NotificationEvent) {
        tracing::info!(
            booking_id = %event.booking_id(),
            event = ?event,
            "notification event emitted"
        );
    }
}

/// Dispatcher that posts events to a webhook as JSON.
#[derive(Clone)]
pub struct HttpDispatcher {
    client: reqwest::Client,
    webhook_url: String,
}

impl HttpDispatcher {
    pub fn new(webhook_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            webhook_url,
        }
    }
}

#[async_trait]
impl NotificationSink for HttpDispatcher {
    async fn dispatch(&self, event: NotificationEvent) {
        let result = self
            .client
            .post(&self.webhook_url)
            .json(&event)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(booking_id = %event.booking_id(), "notification delivered");
            }
            Ok(response) => {
                tracing::warn!(
                    booking_id = %event.booking_id(),
                    status = %response.status(),
                    "notification endpoint rejected event"
                );
            }
            Err(err) => {
                tracing::warn!(
                    booking_id = %event.booking_id(),
                    error = %err,
                    "notification delivery failed"
                );
            }
        }
    }
}
