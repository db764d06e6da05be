//! Booking lifecycle, billing, and payment reconciliation core.
//!
//! The presentation, transport, and auth layers live elsewhere; this crate
//! owns the parts with real invariants: what state a booking is in, how its
//! bill is computed, and how that bill is settled and reconciled against
//! payment records.

pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod services;

use std::sync::Arc;

use config::Config;
use error::CoreError;
use services::{
    BillingEngine, BookingService, CardGatewayClient, HttpDispatcher, LoggingDispatcher,
    MarketplaceStore, MongoStore, NotificationSink, PaymentReconciler, SystemClock,
};

/// The wired-up core: booking orchestration plus payment reconciliation
/// over one shared store.
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub reconciler: Arc<PaymentReconciler>,
    pub config: Config,
}

impl AppState {
    /// Wire the core against MongoDB and the configured card gateway.
    pub async fn from_config(config: Config) -> Result<Self, CoreError> {
        services::metrics::init_metrics();

        let store: Arc<dyn MarketplaceStore> =
            Arc::new(MongoStore::connect(&config.database).await?);
        let gateway = Arc::new(CardGatewayClient::new(config.gateway.clone()));
        let notifier: Arc<dyn NotificationSink> = match &config.notify.webhook_url {
            Some(url) => Arc::new(HttpDispatcher::new(url.clone())),
            None => Arc::new(LoggingDispatcher),
        };
        let clock = Arc::new(SystemClock);

        let bookings = Arc::new(BookingService::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
            clock.clone(),
            BillingEngine::new(config.billing.platform_fee_rate),
            config.billing.currency.clone(),
        ));
        let reconciler = Arc::new(PaymentReconciler::new(store, gateway, notifier, clock));

        tracing::info!(
            service = %config.service_name,
            db = %config.database.db_name,
            gateway = %config.gateway.api_base_url,
            "booking core initialized"
        );

        Ok(Self {
            bookings,
            reconciler,
            config,
        })
    }
}
