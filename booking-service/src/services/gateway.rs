//! Card payment gateway client.
//!
//! The core treats the gateway as opaque: it creates an intent, later asks
//! for confirmation, and only needs success/failure plus the settled
//! amount. `CardGatewayClient` talks to a Stripe-style payment-intents API
//! over HTTP; every call is bounded by the configured timeout so a payment
//! is never left hanging in PENDING forever.

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::CoreError;
use crate::services::metrics;

/// Identifiers handed back to the UI so the customer can complete the
/// card flow.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStatus {
    Succeeded,
    Processing,
    Declined,
}

/// Final word from the gateway on one intent.
#[derive(Debug, Clone)]
pub struct GatewayConfirmation {
    pub intent_id: String,
    pub status: IntentStatus,
    pub settled_amount: Decimal,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(
        &self,
        amount: Decimal,
        currency: &str,
        booking_id: Uuid,
    ) -> Result<PaymentIntent, CoreError>;

    async fn confirm(&self, intent_id: &str) -> Result<GatewayConfirmation, CoreError>;
}

#[derive(Debug, Serialize)]
struct CreateIntentRequest {
    /// Amount in the smallest currency unit (cents).
    amount: u64,
    currency: String,
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
    status: String,
    #[serde(default)]
    amount_received: u64,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// HTTP client for the card gateway.
#[derive(Clone)]
pub struct CardGatewayClient {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl CardGatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, config }
    }

    /// Check if the gateway is configured (credentials are set).
    pub fn is_configured(&self) -> bool {
        !self.config.secret_key.expose_secret().is_empty()
    }

    fn to_minor_units(amount: Decimal) -> Result<u64, CoreError> {
        (amount * Decimal::from(100))
            .round()
            .to_u64()
            .ok_or_else(|| {
                CoreError::GatewayError(format!("amount {amount} not representable in minor units"))
            })
    }

    fn from_minor_units(minor: u64) -> Decimal {
        Decimal::new(minor as i64, 2)
    }

    async fn parse_error(status: reqwest::StatusCode, body: String) -> CoreError {
        let detail = serde_json::from_str::<GatewayErrorBody>(&body)
            .map(|b| {
                format!(
                    "{}: {}",
                    b.error.code.unwrap_or_else(|| "unknown".to_string()),
                    b.error.message
                )
            })
            .unwrap_or(body);
        tracing::error!(status = %status, detail = %detail, "gateway request failed");
        CoreError::GatewayError(detail)
    }
}

#[async_trait]
impl PaymentGateway for CardGatewayClient {
    async fn create_intent(
        &self,
        amount: Decimal,
        currency: &str,
        booking_id: Uuid,
    ) -> Result<PaymentIntent, CoreError> {
        if !self.is_configured() {
            return Err(CoreError::GatewayError(
                "gateway credentials not configured".to_string(),
            ));
        }

        let request = CreateIntentRequest {
            amount: Self::to_minor_units(amount)?,
            currency: currency.to_lowercase(),
            metadata: serde_json::json!({ "booking_id": booking_id }),
        };

        let url = format!("{}/payment_intents", self.config.api_base_url);
        let started = std::time::Instant::now();

        let response = self
            .client
            .post(&url)
            .basic_auth(self.config.secret_key.expose_secret(), None::<&str>)
            .json(&request)
            .send()
            .await
            .map_err(|e| CoreError::GatewayError(e.to_string()))?;

        metrics::record_gateway_duration("create_intent", started.elapsed().as_secs_f64());

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::GatewayError(e.to_string()))?;

        if !status.is_success() {
            metrics::record_gateway_request("create_intent", "error");
            return Err(Self::parse_error(status, body).await);
        }

        let intent: IntentResponse =
            serde_json::from_str(&body).map_err(|e| CoreError::GatewayError(e.to_string()))?;
        metrics::record_gateway_request("create_intent", "ok");
        tracing::info!(
            intent_id = %intent.id,
            booking_id = %booking_id,
            amount = %amount,
            "payment intent created"
        );

        Ok(PaymentIntent {
            client_secret: intent.client_secret.unwrap_or_default(),
            intent_id: intent.id,
        })
    }

    async fn confirm(&self, intent_id: &str) -> Result<GatewayConfirmation, CoreError> {
        if !self.is_configured() {
            return Err(CoreError::GatewayError(
                "gateway credentials not configured".to_string(),
            ));
        }

        let url = format!(
            "{}/payment_intents/{}/confirm",
            self.config.api_base_url, intent_id
        );
        let started = std::time::Instant::now();

        let response = self
            .client
            .post(&url)
            .basic_auth(self.config.secret_key.expose_secret(), None::<&str>)
            .send()
            .await
            .map_err(|e| CoreError::GatewayError(e.to_string()))?;

        metrics::record_gateway_duration("confirm", started.elapsed().as_secs_f64());

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CoreError::GatewayError(e.to_string()))?;

        if !status.is_success() {
            metrics::record_gateway_request("confirm", "error");
            return Err(Self::parse_error(status, body).await);
        }

        let intent: IntentResponse =
            serde_json::from_str(&body).map_err(|e| CoreError::GatewayError(e.to_string()))?;
        metrics::record_gateway_request("confirm", "ok");

        let intent_status = match intent.status.as_str() {
            "succeeded" => IntentStatus::Succeeded,
            "processing" => IntentStatus::Processing,
            _ => IntentStatus::Declined,
        };
        tracing::info!(
            intent_id = %intent.id,
            status = %intent.status,
            "payment intent confirmation result"
        );

        Ok(GatewayConfirmation {
            intent_id: intent.id,
            status: intent_status,
            settled_amount: Self::from_minor_units(intent.amount_received),
        })
    }
}
