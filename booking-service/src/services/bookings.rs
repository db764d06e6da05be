//! Booking orchestration.
//!
//! Coordinates the pure state machine and billing engine against the
//! store: load, apply, compare-and-set write, then fan out the event
//! descriptor. Two concurrent callers racing the same booking resolve to
//! one winner and one `ConcurrentModification`.

use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{
    ActorRole, AdditionalCharge, Actor, BillExtras, BillLineItem, BillingStatus, Booking,
    BookingEvent, BookingPricing, BookingStatus, CreateBooking, NotificationEvent, TimelineEvent,
};
use crate::services::billing::BillingEngine;
use crate::services::clock::Clock;
use crate::services::lifecycle;
use crate::services::metrics;
use crate::services::notify::NotificationSink;
use crate::services::store::MarketplaceStore;

pub struct BookingService {
    store: Arc<dyn MarketplaceStore>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    billing: BillingEngine,
    currency: String,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        billing: BillingEngine,
        currency: String,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            billing,
            currency,
        }
    }

    /// Create a booking in PENDING with a seeded timeline.
    #[instrument(skip(self, input), fields(customer_id = %input.customer_id, provider_id = %input.provider_id))]
    pub async fn create_booking(&self, input: CreateBooking) -> Result<Booking, CoreError> {
        let now = self.clock.now();
        let booking = Booking {
            booking_id: Uuid::new_v4(),
            customer_id: input.customer_id,
            provider_id: input.provider_id,
            service_id: input.service_id,
            service_name: input.service_name,
            scheduled_date: input.scheduled_date,
            scheduled_time: input.scheduled_time,
            duration_minutes: input.duration_minutes,
            status: BookingStatus::Pending,
            priority: input.priority,
            pricing: BookingPricing::unbilled(&self.currency),
            timeline: vec![TimelineEvent {
                status: BookingStatus::Pending,
                timestamp: now,
                actor_id: input.customer_id,
                note: None,
            }],
            cancellation_reason: None,
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
            revision: 1,
        };

        self.store.insert_booking(&booking).await?;
        info!(booking_id = %booking.booking_id, "booking created");
        Ok(booking)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, CoreError> {
        self.store.get_booking(booking_id).await
    }

    /// Apply one lifecycle transition and persist it with a
    /// compare-and-set write.
    #[instrument(skip(self, actor, reason), fields(booking_id = %booking_id, actor_id = %actor.id))]
    pub async fn transition(
        &self,
        booking_id: Uuid,
        target: BookingStatus,
        actor: &Actor,
        reason: Option<String>,
    ) -> Result<(Booking, BookingEvent), CoreError> {
        let mut booking = self.store.get_booking(booking_id).await?;
        let expected_revision = booking.revision;

        let event = lifecycle::transition(&mut booking, target, actor, reason, self.clock.now())?;
        booking.revision += 1;
        self.store
            .replace_booking(expected_revision, &booking)
            .await?;

        metrics::record_transition(event.from_status.as_str(), event.to_status.as_str());
        info!(
            from = %event.from_status,
            to = %event.to_status,
            "booking transitioned"
        );
        self.notifier
            .dispatch(NotificationEvent::from(&event))
            .await;

        Ok((booking, event))
    }

    /// Price and persist the provider's bill onto an IN_PROGRESS booking.
    ///
    /// Writes the composed pricing and leaves the status untouched; payment
    /// completes the booking later. Any payments already recorded keep
    /// counting toward the new total.
    #[instrument(skip(self, actor, line_items, additional_charges, extras), fields(booking_id = %booking_id))]
    pub async fn confirm_bill(
        &self,
        booking_id: Uuid,
        actor: &Actor,
        mut line_items: Vec<BillLineItem>,
        additional_charges: Vec<AdditionalCharge>,
        extras: BillExtras,
    ) -> Result<Booking, CoreError> {
        let mut booking = self.store.get_booking(booking_id).await?;
        let expected_revision = booking.revision;

        if actor.role != ActorRole::Provider || !booking.involves(actor) {
            return Err(CoreError::UnauthorizedActor {
                actor_id: actor.id,
                from: booking.status,
                to: booking.status,
            });
        }
        // Settlement auto-completes the booking, so the settled check must
        // come before the status check or it would be unreachable.
        if booking.pricing.is_settled() {
            return Err(CoreError::AlreadyPaid(booking_id));
        }
        if booking.status != BookingStatus::InProgress {
            return Err(CoreError::IllegalTransition {
                from: booking.status,
                to: BookingStatus::InProgress,
            });
        }

        for item in &mut line_items {
            self.billing.price_line_item(item)?;
        }
        let mut pricing =
            self.billing
                .compose_bill(&line_items, additional_charges, extras, &self.currency)?;

        // Partial payments recorded before a re-bill keep counting.
        pricing.paid_amount = booking.pricing.paid_amount;
        if pricing.paid_amount >= pricing.total_amount {
            pricing.payment_status = BillingStatus::Completed;
        } else if pricing.paid_amount > rust_decimal::Decimal::ZERO {
            pricing.payment_status = BillingStatus::Partial;
        }

        booking.pricing = pricing;
        booking.updated_at = self.clock.now();
        booking.revision += 1;
        self.store
            .replace_booking(expected_revision, &booking)
            .await?;

        info!(
            total = %booking.pricing.total_amount,
            "bill confirmed"
        );
        Ok(booking)
    }
}
