use anyhow::Result;
use dotenvy::dotenv;
use rust_decimal::Decimal;
use secrecy::Secret;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub database: DatabaseConfig,
    pub gateway: GatewayConfig,
    pub billing: BillingConfig,
    pub notify: NotifyConfig,
    pub service_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Secret<String>,
    pub db_name: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct GatewayConfig {
    pub api_base_url: String,
    pub secret_key: Secret<String>,
    pub timeout_seconds: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BillingConfig {
    pub platform_fee_rate: Decimal,
    pub currency: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct NotifyConfig {
    /// Webhook the dispatcher posts events to; logging-only when unset.
    pub webhook_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let db_url = env::var("BOOKING_DATABASE_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let db_name =
            env::var("BOOKING_DATABASE_NAME").unwrap_or_else(|_| "booking_db".to_string());

        let gateway_url = env::var("BOOKING_GATEWAY_URL")
            .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string());
        let gateway_key = env::var("BOOKING_GATEWAY_SECRET_KEY").unwrap_or_default();
        let gateway_timeout = env::var("BOOKING_GATEWAY_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .unwrap_or(15);

        let fee_rate = env::var("BOOKING_PLATFORM_FEE_RATE")
            .ok()
            .and_then(|s| Decimal::from_str(&s).ok())
            .unwrap_or_else(|| Decimal::new(2, 2)); // 2% platform fee by default
        let currency = env::var("BOOKING_CURRENCY").unwrap_or_else(|_| "USD".to_string());

        let webhook_url = env::var("BOOKING_NOTIFY_WEBHOOK_URL").ok();

        Ok(Self {
            database: DatabaseConfig {
                url: Secret::new(db_url),
                db_name,
            },
            gateway: GatewayConfig {
                api_base_url: gateway_url,
                secret_key: Secret::new(gateway_key),
                timeout_seconds: gateway_timeout,
            },
            billing: BillingConfig {
                platform_fee_rate: fee_rate,
                currency,
            },
            notify: NotifyConfig { webhook_url },
            service_name: "booking-service".to_string(),
        })
    }
}
