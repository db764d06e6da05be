//! Payment reconciliation.
//!
//! Orchestrates payment records against a booking: card intents, gateway
//! confirmation, cash settlement, and refunds. Every settlement commits the
//! Booking and its Payment in a single store transaction, keeping
//! `pricing.paid_amount` equal to the sum of completed payments minus
//! processed refunds at all times.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{
    Actor, BillingStatus, Booking, BookingEvent, BookingStatus, NotificationEvent, Payment,
    PaymentMethod, PaymentState, Refund, RefundStatus,
};
use crate::services::clock::Clock;
use crate::services::gateway::{IntentStatus, PaymentGateway};
use crate::services::lifecycle;
use crate::services::metrics;
use crate::services::notify::NotificationSink;
use crate::services::store::{MarketplaceStore, SettlementTxn, PAYMENTS};

/// Identifiers for a freshly created card intent.
#[derive(Debug, Clone)]
pub struct CardIntent {
    pub payment_id: Uuid,
    pub intent_id: String,
    pub client_secret: String,
}

/// Result of cross-checking a booking against its payment records.
#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    pub booking_id: Uuid,
    pub recorded_paid: Decimal,
    pub settled_total: Decimal,
    pub refunded_total: Decimal,
    pub balanced: bool,
}

pub struct PaymentReconciler {
    store: Arc<dyn MarketplaceStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl PaymentReconciler {
    pub fn new(
        store: Arc<dyn MarketplaceStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            clock,
        }
    }

    fn new_payment(&self, booking: &Booking, amount: Decimal, method: PaymentMethod) -> Payment {
        let now = self.clock.now();
        Payment {
            payment_id: Uuid::new_v4(),
            booking_id: booking.booking_id,
            customer_id: booking.customer_id,
            provider_id: booking.provider_id,
            amount,
            currency: booking.pricing.currency.clone(),
            method,
            status: PaymentState::Pending,
            gateway_transaction_id: None,
            gateway_response: None,
            fees: Decimal::ZERO,
            refunds: Vec::new(),
            created_at: now,
            updated_at: now,
            revision: 1,
        }
    }

    /// Fold a completed payment amount into the booking and, once the bill
    /// is covered, complete the booking through the lifecycle. Returns the
    /// event descriptor when a transition happened.
    fn apply_settlement(
        &self,
        booking: &mut Booking,
        amount: Decimal,
        actor: &Actor,
    ) -> Result<Option<BookingEvent>, CoreError> {
        let now = self.clock.now();
        booking.pricing.paid_amount += amount;

        let mut event = None;
        if booking.pricing.paid_amount >= booking.pricing.total_amount {
            booking.pricing.payment_status = BillingStatus::Completed;
            if booking.status == BookingStatus::InProgress {
                event = Some(lifecycle::transition(
                    booking,
                    BookingStatus::Completed,
                    actor,
                    None,
                    now,
                )?);
            }
        } else {
            booking.pricing.payment_status = BillingStatus::Partial;
        }

        booking.updated_at = now;
        Ok(event)
    }

    async fn dispatch_settled(&self, booking: &Booking, payment: &Payment, actor_id: Uuid) {
        self.notifier
            .dispatch(NotificationEvent::PaymentSettled {
                booking_id: booking.booking_id,
                actor_id,
                payment_id: payment.payment_id,
                amount: payment.amount,
                payment_status: booking.pricing.payment_status,
            })
            .await;
    }

    async fn dispatch_transition(&self, event: Option<BookingEvent>) {
        if let Some(event) = event {
            metrics::record_transition(event.from_status.as_str(), event.to_status.as_str());
            self.notifier
                .dispatch(NotificationEvent::from(&event))
                .await;
        }
    }

    /// Create a card payment intent for the outstanding balance.
    ///
    /// Gateway failures record a FAILED payment and leave the booking
    /// untouched and payable; the caller retries with a fresh intent.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn create_card_intent(&self, booking_id: Uuid) -> Result<CardIntent, CoreError> {
        let booking = self.store.get_booking(booking_id).await?;

        if booking.pricing.is_settled() {
            return Err(CoreError::AlreadyPaid(booking_id));
        }
        if booking.pricing.total_amount <= Decimal::ZERO {
            return Err(CoreError::EmptyBill);
        }

        let outstanding = booking.pricing.outstanding();
        let mut payment = self.new_payment(&booking, outstanding, PaymentMethod::Card);

        match self
            .gateway
            .create_intent(outstanding, &booking.pricing.currency, booking_id)
            .await
        {
            Ok(intent) => {
                payment.gateway_transaction_id = Some(intent.intent_id.clone());
                self.store.insert_payment(&payment).await?;
                metrics::record_payment(payment.method.as_str(), payment.status.as_str());
                info!(
                    payment_id = %payment.payment_id,
                    intent_id = %intent.intent_id,
                    amount = %outstanding,
                    "card intent created"
                );
                Ok(CardIntent {
                    payment_id: payment.payment_id,
                    intent_id: intent.intent_id,
                    client_secret: intent.client_secret,
                })
            }
            Err(err) => {
                payment.status = PaymentState::Failed;
                payment.gateway_response = Some(err.to_string());
                self.store.insert_payment(&payment).await?;
                metrics::record_payment(payment.method.as_str(), payment.status.as_str());
                warn!(payment_id = %payment.payment_id, error = %err, "card intent failed");
                Err(err)
            }
        }
    }

    /// Confirm a card payment after the customer completed the gateway
    /// flow. Idempotent: re-confirming a settled booking or an
    /// already-completed intent fails with `AlreadyPaid` and changes
    /// nothing.
    #[instrument(skip(self), fields(booking_id = %booking_id, intent_id = %intent_id))]
    pub async fn confirm_card_payment(
        &self,
        intent_id: &str,
        booking_id: Uuid,
    ) -> Result<(Booking, Payment), CoreError> {
        let mut booking = self.store.get_booking(booking_id).await?;
        if booking.pricing.is_settled() {
            return Err(CoreError::AlreadyPaid(booking_id));
        }

        let mut payment = self
            .store
            .payment_by_intent(intent_id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                collection: PAYMENTS,
                id: intent_id.to_string(),
            })?;

        match payment.status {
            PaymentState::Completed => return Err(CoreError::AlreadyPaid(booking_id)),
            PaymentState::Pending | PaymentState::Processing => {}
            // A terminal attempt is never revived; retry means a new intent.
            _ => {
                return Err(CoreError::GatewayError(format!(
                    "intent {intent_id} is {} and can no longer be confirmed; create a new intent",
                    payment.status.as_str()
                )))
            }
        }

        let expected_payment_revision = payment.revision;

        // An intent captures the balance outstanding when it was created.
        // If other payments landed since, settling it would push the paid
        // amount past the total; cancel it before the gateway leg runs.
        if payment.amount > booking.pricing.outstanding() {
            let err = CoreError::GatewayError(format!(
                "intent {intent_id} was created for {} but only {} remains outstanding; \
                 create a new intent",
                payment.amount,
                booking.pricing.outstanding()
            ));
            self.cancel_payment(payment, expected_payment_revision, &err)
                .await?;
            return Err(err);
        }

        payment.status = PaymentState::Processing;

        let confirmation = match self.gateway.confirm(intent_id).await {
            Ok(confirmation) if confirmation.status == IntentStatus::Succeeded => confirmation,
            Ok(confirmation) => {
                let err = CoreError::GatewayError(format!(
                    "gateway did not settle intent {intent_id} ({:?})",
                    confirmation.status
                ));
                self.fail_payment(payment, expected_payment_revision, &err)
                    .await?;
                return Err(err);
            }
            Err(err) => {
                self.fail_payment(payment, expected_payment_revision, &err)
                    .await?;
                return Err(err);
            }
        };

        if confirmation.settled_amount > Decimal::ZERO {
            payment.amount = confirmation.settled_amount;
        }
        payment.status = PaymentState::Completed;
        payment.gateway_response = Some("succeeded".to_string());
        payment.updated_at = self.clock.now();
        payment.revision += 1;

        let expected_booking_revision = booking.revision;
        let payer = Actor::customer(booking.customer_id);
        let event = self.apply_settlement(&mut booking, payment.amount, &payer)?;
        booking.revision += 1;

        let txn = SettlementTxn::default()
            .booking(expected_booking_revision, booking.clone())
            .replace_payment(expected_payment_revision, payment.clone());
        self.store.commit(txn).await?;

        metrics::record_payment(payment.method.as_str(), payment.status.as_str());
        metrics::record_settled_amount(
            &payment.currency,
            payment.method.as_str(),
            payment.amount.to_f64().unwrap_or(0.0),
        );
        info!(
            payment_id = %payment.payment_id,
            amount = %payment.amount,
            paid = %booking.pricing.paid_amount,
            "card payment settled"
        );

        self.dispatch_settled(&booking, &payment, payer.id).await;
        self.dispatch_transition(event).await;

        Ok((booking, payment))
    }

    /// Record a cash payment. No gateway leg; the amount must cover part or
    /// all of the outstanding balance.
    #[instrument(skip(self, actor), fields(booking_id = %booking_id, actor_id = %actor.id))]
    pub async fn process_cash_payment(
        &self,
        booking_id: Uuid,
        amount: Decimal,
        actor: &Actor,
    ) -> Result<(Booking, Payment), CoreError> {
        let mut booking = self.store.get_booking(booking_id).await?;

        if booking.pricing.is_settled() {
            return Err(CoreError::AlreadyPaid(booking_id));
        }
        if booking.pricing.total_amount <= Decimal::ZERO {
            return Err(CoreError::EmptyBill);
        }
        if !booking.involves(actor) {
            return Err(CoreError::UnauthorizedActor {
                actor_id: actor.id,
                from: booking.status,
                to: booking.status,
            });
        }
        if amount <= Decimal::ZERO {
            return Err(CoreError::InvalidQuantity(
                "cash amount must be greater than zero".to_string(),
            ));
        }
        if amount > booking.pricing.outstanding() {
            return Err(CoreError::InvalidQuantity(format!(
                "cash amount {amount} exceeds the outstanding balance {}",
                booking.pricing.outstanding()
            )));
        }

        let mut payment = self.new_payment(&booking, amount, PaymentMethod::Cash);
        payment.status = PaymentState::Completed;

        let expected_booking_revision = booking.revision;
        let event = self.apply_settlement(&mut booking, amount, actor)?;
        booking.revision += 1;

        let txn = SettlementTxn::default()
            .booking(expected_booking_revision, booking.clone())
            .insert_payment(payment.clone());
        self.store.commit(txn).await?;

        metrics::record_payment(payment.method.as_str(), payment.status.as_str());
        metrics::record_settled_amount(
            &payment.currency,
            payment.method.as_str(),
            amount.to_f64().unwrap_or(0.0),
        );
        info!(
            payment_id = %payment.payment_id,
            amount = %amount,
            paid = %booking.pricing.paid_amount,
            "cash payment recorded"
        );

        self.dispatch_settled(&booking, &payment, actor.id).await;
        self.dispatch_transition(event).await;

        Ok((booking, payment))
    }

    /// Apply a refund against one payment.
    ///
    /// When the booking's whole paid amount has been handed back, the
    /// booking transitions to REFUNDED (where its current status permits).
    #[instrument(skip(self, reason), fields(payment_id = %payment_id))]
    pub async fn refund(
        &self,
        payment_id: Uuid,
        amount: Decimal,
        reason: String,
    ) -> Result<(Booking, Payment), CoreError> {
        if amount <= Decimal::ZERO {
            return Err(CoreError::InvalidQuantity(
                "refund amount must be greater than zero".to_string(),
            ));
        }

        let mut payment = self.store.get_payment(payment_id).await?;
        let available = if matches!(
            payment.status,
            PaymentState::Completed | PaymentState::Refunded
        ) {
            payment.refundable()
        } else {
            Decimal::ZERO
        };
        if amount > available {
            return Err(CoreError::OverRefund {
                requested: amount,
                available,
            });
        }

        let now = self.clock.now();
        let expected_payment_revision = payment.revision;
        payment.refunds.push(Refund {
            refund_id: Uuid::new_v4(),
            amount,
            reason: reason.clone(),
            status: RefundStatus::Processed,
            processed_at: now,
        });
        if payment.refundable() == Decimal::ZERO {
            payment.status = PaymentState::Refunded;
        }
        payment.updated_at = now;
        payment.revision += 1;

        let mut booking = self.store.get_booking(payment.booking_id).await?;
        let expected_booking_revision = booking.revision;
        booking.pricing.paid_amount -= amount;

        let mut event = None;
        if booking.pricing.paid_amount == Decimal::ZERO {
            booking.pricing.payment_status = BillingStatus::Refunded;
            if lifecycle::can_transition(booking.status, BookingStatus::Refunded) {
                let provider = Actor::provider(booking.provider_id);
                event = Some(lifecycle::transition(
                    &mut booking,
                    BookingStatus::Refunded,
                    &provider,
                    Some(reason),
                    now,
                )?);
            }
        } else {
            booking.pricing.payment_status = BillingStatus::Partial;
        }
        booking.updated_at = now;
        booking.revision += 1;

        let txn = SettlementTxn::default()
            .booking(expected_booking_revision, booking.clone())
            .replace_payment(expected_payment_revision, payment.clone());
        self.store.commit(txn).await?;

        metrics::record_refund("PROCESSED");
        info!(
            booking_id = %booking.booking_id,
            amount = %amount,
            remaining_paid = %booking.pricing.paid_amount,
            "refund processed"
        );

        self.dispatch_settled(&booking, &payment, booking.provider_id)
            .await;
        self.dispatch_transition(event).await;

        Ok((booking, payment))
    }

    /// Cross-check a booking's recorded paid amount against its payment and
    /// refund records.
    #[instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn audit(&self, booking_id: Uuid) -> Result<ReconciliationReport, CoreError> {
        let booking = self.store.get_booking(booking_id).await?;
        let payments = self.store.payments_for_booking(booking_id).await?;

        // Refunded payments reached COMPLETED first; their amounts count as
        // settled and their refunds count back out.
        let settled_total: Decimal = payments
            .iter()
            .filter(|p| matches!(p.status, PaymentState::Completed | PaymentState::Refunded))
            .map(|p| p.amount)
            .sum();
        let refunded_total: Decimal = payments.iter().map(|p| p.refunded_amount()).sum();
        let recorded_paid = booking.pricing.paid_amount;
        let balanced = settled_total - refunded_total == recorded_paid;

        if !balanced {
            warn!(
                recorded = %recorded_paid,
                settled = %settled_total,
                refunded = %refunded_total,
                "booking out of balance with its payments"
            );
            metrics::record_error("out_of_balance", "audit");
        }

        Ok(ReconciliationReport {
            booking_id,
            recorded_paid,
            settled_total,
            refunded_total,
            balanced,
        })
    }

    /// Persist a CANCELLED state for a payment withdrawn before its
    /// gateway leg ran. The booking is never touched on this path.
    async fn cancel_payment(
        &self,
        mut payment: Payment,
        expected_revision: i64,
        err: &CoreError,
    ) -> Result<(), CoreError> {
        payment.status = PaymentState::Cancelled;
        payment.gateway_response = Some(err.to_string());
        payment.updated_at = self.clock.now();
        payment.revision += 1;

        let txn = SettlementTxn::default().replace_payment(expected_revision, payment.clone());
        self.store.commit(txn).await?;
        metrics::record_payment(payment.method.as_str(), payment.status.as_str());
        warn!(payment_id = %payment.payment_id, "stale payment intent cancelled");
        Ok(())
    }

    /// Persist a FAILED state for a payment whose gateway leg did not
    /// settle. The booking is never touched on this path.
    async fn fail_payment(
        &self,
        mut payment: Payment,
        expected_revision: i64,
        err: &CoreError,
    ) -> Result<(), CoreError> {
        payment.status = PaymentState::Failed;
        payment.gateway_response = Some(err.to_string());
        payment.updated_at = self.clock.now();
        payment.revision += 1;

        let txn = SettlementTxn::default().replace_payment(expected_revision, payment.clone());
        self.store.commit(txn).await?;
        metrics::record_payment(payment.method.as_str(), payment.status.as_str());
        warn!(payment_id = %payment.payment_id, "payment marked failed");
        Ok(())
    }
}
