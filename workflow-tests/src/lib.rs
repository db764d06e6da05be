//! End-to-end booking workflow test library.
//!
//! Wires the full core (booking service + payment reconciler) over the
//! in-memory store and an always-approving gateway double, so workflow
//! tests can drive a booking from request to settlement without external
//! services.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once};
use uuid::Uuid;

use booking_service::error::CoreError;
use booking_service::models::{
    Actor, Booking, BookingPriority, BookingStatus, CreateBooking, NotificationEvent,
};
use booking_service::services::{
    BillingEngine, BookingService, Clock, GatewayConfirmation, IntentStatus, MemoryStore,
    NotificationSink, PaymentGateway, PaymentIntent, PaymentReconciler, SystemClock,
};
use chrono::{NaiveDate, NaiveTime};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,workflow_tests=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn amount(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Gateway double that approves every intent for its created amount.
#[derive(Default)]
pub struct ApprovingGateway {
    counter: AtomicU64,
    intents: Mutex<HashMap<String, Decimal>>,
}

#[async_trait]
impl PaymentGateway for ApprovingGateway {
    async fn create_intent(
        &self,
        amount: Decimal,
        _currency: &str,
        _booking_id: Uuid,
    ) -> Result<PaymentIntent, CoreError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let intent_id = format!("pi_workflow_{n}");
        self.intents
            .lock()
            .unwrap()
            .insert(intent_id.clone(), amount);
        Ok(PaymentIntent {
            client_secret: format!("{intent_id}_secret"),
            intent_id,
        })
    }

    async fn confirm(&self, intent_id: &str) -> Result<GatewayConfirmation, CoreError> {
        let amount = self
            .intents
            .lock()
            .unwrap()
            .get(intent_id)
            .copied()
            .ok_or_else(|| CoreError::GatewayError(format!("unknown intent {intent_id}")))?;
        Ok(GatewayConfirmation {
            intent_id: intent_id.to_string(),
            status: IntentStatus::Succeeded,
            settled_amount: amount,
        })
    }
}

/// Notification sink that records every dispatched event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn dispatch(&self, event: NotificationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Context for workflow tests: the wired core plus a customer/provider pair.
///
/// Each test creates its own context for isolation.
pub struct WorkflowContext {
    pub store: Arc<MemoryStore>,
    pub sink: Arc<RecordingSink>,
    pub bookings: Arc<BookingService>,
    pub reconciler: Arc<PaymentReconciler>,
    pub customer: Actor,
    pub provider: Actor,
}

impl WorkflowContext {
    pub fn new() -> Self {
        init_tracing();

        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(ApprovingGateway::default());
        let sink = Arc::new(RecordingSink::default());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let bookings = Arc::new(BookingService::new(
            store.clone(),
            sink.clone(),
            clock.clone(),
            BillingEngine::default(),
            "USD".to_string(),
        ));
        let reconciler = Arc::new(PaymentReconciler::new(
            store.clone(),
            gateway,
            sink.clone(),
            clock,
        ));

        Self {
            store,
            sink,
            bookings,
            reconciler,
            customer: Actor::customer(Uuid::new_v4()),
            provider: Actor::provider(Uuid::new_v4()),
        }
    }

    /// Customer requests a three-hour deep cleaning.
    pub async fn request_booking(&self) -> anyhow::Result<Booking> {
        let booking = self
            .bookings
            .create_booking(CreateBooking {
                customer_id: self.customer.id,
                provider_id: self.provider.id,
                service_id: Uuid::new_v4(),
                service_name: "Deep cleaning".to_string(),
                scheduled_date: NaiveDate::from_ymd_opt(2026, 5, 10)
                    .ok_or_else(|| anyhow::anyhow!("bad date"))?,
                scheduled_time: NaiveTime::from_hms_opt(14, 0, 0)
                    .ok_or_else(|| anyhow::anyhow!("bad time"))?,
                duration_minutes: 180,
                priority: BookingPriority::Normal,
            })
            .await?;
        Ok(booking)
    }

    pub async fn transition(
        &self,
        booking_id: Uuid,
        target: BookingStatus,
        actor: &Actor,
    ) -> Result<Booking, CoreError> {
        let (booking, _) = self
            .bookings
            .transition(booking_id, target, actor, None)
            .await?;
        Ok(booking)
    }
}

impl Default for WorkflowContext {
    fn default() -> Self {
        Self::new()
    }
}
