//! Test helper module for booking-service integration tests.
//!
//! Wires the core against the in-memory store, a scriptable fake gateway,
//! and a recording notification sink.

#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use booking_service::error::CoreError;
use booking_service::models::{
    Actor, AdditionalCharge, BillExtras, BillLineItem, Booking, BookingPriority, BookingStatus,
    CreateBooking, NotificationEvent, PricingModel,
};
use booking_service::services::{
    BillingEngine, BookingService, Clock, GatewayConfirmation, IntentStatus, MemoryStore,
    NotificationSink, PaymentGateway, PaymentIntent, PaymentReconciler, SystemClock,
};
use chrono::{NaiveDate, NaiveTime};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Scriptable in-process gateway double.
#[derive(Default)]
pub struct FakeGateway {
    counter: AtomicU64,
    intents: Mutex<HashMap<String, Decimal>>,
    pub fail_create: Mutex<bool>,
    pub fail_confirm: Mutex<bool>,
    pub decline_confirm: Mutex<bool>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_create(&self, fail: bool) {
        *self.fail_create.lock().unwrap() = fail;
    }

    pub fn set_fail_confirm(&self, fail: bool) {
        *self.fail_confirm.lock().unwrap() = fail;
    }

    pub fn set_decline_confirm(&self, decline: bool) {
        *self.decline_confirm.lock().unwrap() = decline;
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(
        &self,
        amount: Decimal,
        _currency: &str,
        _booking_id: Uuid,
    ) -> Result<PaymentIntent, CoreError> {
        if *self.fail_create.lock().unwrap() {
            return Err(CoreError::GatewayError("simulated outage".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let intent_id = format!("pi_test_{n}");
        self.intents.lock().unwrap().insert(intent_id.clone(), amount);
        Ok(PaymentIntent {
            client_secret: format!("{intent_id}_secret"),
            intent_id,
        })
    }

    async fn confirm(&self, intent_id: &str) -> Result<GatewayConfirmation, CoreError> {
        if *self.fail_confirm.lock().unwrap() {
            return Err(CoreError::GatewayError("simulated timeout".to_string()));
        }
        let amount = self
            .intents
            .lock()
            .unwrap()
            .get(intent_id)
            .copied()
            .ok_or_else(|| CoreError::GatewayError(format!("unknown intent {intent_id}")))?;
        if *self.decline_confirm.lock().unwrap() {
            return Ok(GatewayConfirmation {
                intent_id: intent_id.to_string(),
                status: IntentStatus::Declined,
                settled_amount: Decimal::ZERO,
            });
        }
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

/// Test application wrapper for integration tests.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<FakeGateway>,
    pub sink: Arc<RecordingSink>,
    pub bookings: Arc<BookingService>,
    pub reconciler: Arc<PaymentReconciler>,
    pub customer: Actor,
    pub provider: Actor,
}

impl TestApp {
    pub fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(FakeGateway::new());
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
            gateway.clone(),
            sink.clone(),
            clock,
        ));

        Self {
            store,
            gateway,
            sink,
            bookings,
            reconciler,
            customer: Actor::customer(Uuid::new_v4()),
            provider: Actor::provider(Uuid::new_v4()),
        }
    }

    pub async fn pending_booking(&self) -> Booking {
        self.bookings
            .create_booking(CreateBooking {
                customer_id: self.customer.id,
                provider_id: self.provider.id,
                service_id: Uuid::new_v4(),
                service_name: "Deep cleaning".to_string(),
                scheduled_date: NaiveDate::from_ymd_opt(2026, 5, 10).unwrap(),
                scheduled_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
                duration_minutes: 180,
                priority: BookingPriority::Normal,
            })
            .await
            .unwrap()
    }

    /// Drive a fresh booking to IN_PROGRESS.
    pub async fn in_progress_booking(&self) -> Booking {
        let booking = self.pending_booking().await;
        let id = booking.booking_id;
        self.bookings
            .transition(id, BookingStatus::Accepted, &self.provider, None)
            .await
            .unwrap();
        self.bookings
            .transition(id, BookingStatus::Confirmed, &self.customer, None)
            .await
            .unwrap();
        let (booking, _) = self
            .bookings
            .transition(id, BookingStatus::InProgress, &self.provider, None)
            .await
            .unwrap();
        booking
    }

    /// IN_PROGRESS booking billed at the standard 5000 + 700 + 2% = 5814.
    pub async fn billed_booking(&self) -> Booking {
        let booking = self.in_progress_booking().await;
        self.bookings
            .confirm_bill(
                booking.booking_id,
                &self.provider,
                vec![standard_line_item()],
                vec![AdditionalCharge {
                    description: "Extra materials".to_string(),
                    amount: dec("700"),
                    approved: true,
                }],
                BillExtras::default(),
            )
            .await
            .unwrap()
    }
}

pub fn standard_line_item() -> BillLineItem {
    BillLineItem {
        service_id: Uuid::new_v4(),
        pricing_model: PricingModel::Fixed,
        unit_rate: dec("5000"),
        quantity: String::new(),
        calculated_amount: Decimal::ZERO,
    }
}
