//! HTTP contract tests for the card gateway client against a mock server.

mod common;

use booking_service::config::GatewayConfig;
use booking_service::error::CoreError;
use booking_service::services::{CardGatewayClient, IntentStatus, PaymentGateway};
use common::dec;
use secrecy::Secret;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> CardGatewayClient {
    CardGatewayClient::new(GatewayConfig {
        api_base_url: server.uri(),
        secret_key: Secret::new("sk_test_123".to_string()),
        timeout_seconds: 5,
    })
}

#[tokio::test]
async fn create_intent_sends_minor_units_and_booking_metadata() {
    let server = MockServer::start().await;
    let booking_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .and(body_partial_json(json!({
            "amount": 581400,
            "currency": "usd",
            "metadata": { "booking_id": booking_id },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_abc123",
            "client_secret": "pi_abc123_secret",
            "status": "requires_confirmation",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let intent = client
        .create_intent(dec("5814.00"), "USD", booking_id)
        .await
        .unwrap();

    assert_eq!(intent.intent_id, "pi_abc123");
    assert_eq!(intent.client_secret, "pi_abc123_secret");
}

#[tokio::test]
async fn create_intent_surfaces_gateway_error_detail() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/payment_intents"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": {
                "code": "card_declined",
                "message": "Your card was declined.",
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .create_intent(dec("100"), "USD", Uuid::new_v4())
        .await
        .unwrap_err();

    match err {
        CoreError::GatewayError(detail) => {
            assert!(detail.contains("card_declined"));
            assert!(detail.contains("declined"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn confirm_maps_succeeded_with_settled_amount() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/payment_intents/pi_abc123/confirm"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_abc123",
            "status": "succeeded",
            "amount_received": 581400,
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let confirmation = client.confirm("pi_abc123").await.unwrap();

    assert_eq!(confirmation.status, IntentStatus::Succeeded);
    assert_eq!(confirmation.settled_amount, dec("5814.00"));
}

#[tokio::test]
async fn confirm_maps_unknown_statuses_to_declined() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/payment_intents/pi_dead/confirm"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pi_dead",
            "status": "canceled",
            "amount_received": 0,
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let confirmation = client.confirm("pi_dead").await.unwrap();

    assert_eq!(confirmation.status, IntentStatus::Declined);
    assert_eq!(confirmation.settled_amount, dec("0"));
}

#[tokio::test]
async fn unconfigured_client_never_calls_the_network() {
    let client = CardGatewayClient::new(GatewayConfig {
        api_base_url: "http://127.0.0.1:1".to_string(),
        secret_key: Secret::new(String::new()),
        timeout_seconds: 1,
    });

    let err = client
        .create_intent(dec("100"), "USD", Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::GatewayError(_)));
    assert!(err.to_string().contains("not configured"));
}
