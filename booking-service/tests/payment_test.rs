//! Card and cash settlement tests against the fake gateway.

mod common;

use booking_service::error::CoreError;
use booking_service::models::{
    BillingStatus, BookingStatus, NotificationEvent, PaymentMethod, PaymentState,
};
use booking_service::services::MarketplaceStore;
use common::{dec, TestApp};

#[tokio::test]
async fn card_payment_settles_and_completes_the_booking() {
    let app = TestApp::spawn();
    let booking = app.billed_booking().await;

    let intent = app
        .reconciler
        .create_card_intent(booking.booking_id)
        .await
        .unwrap();
    let (settled, payment) = app
        .reconciler
        .confirm_card_payment(&intent.intent_id, booking.booking_id)
        .await
        .unwrap();

    assert_eq!(payment.status, PaymentState::Completed);
    assert_eq!(payment.method, PaymentMethod::Card);
    assert_eq!(payment.amount, dec("5814.00"));
    assert_eq!(settled.pricing.paid_amount, dec("5814.00"));
    assert_eq!(settled.pricing.payment_status, BillingStatus::Completed);
    assert_eq!(settled.status, BookingStatus::Completed);
    assert!(settled.completed_at.is_some());

    let report = app.reconciler.audit(booking.booking_id).await.unwrap();
    assert!(report.balanced);
    assert_eq!(report.settled_total, dec("5814.00"));
    assert_eq!(report.refunded_total, dec("0"));
}

#[tokio::test]
async fn settlement_dispatches_payment_and_transition_events() {
    let app = TestApp::spawn();
    let booking = app.billed_booking().await;
    let before = app.sink.events().len();

    let intent = app
        .reconciler
        .create_card_intent(booking.booking_id)
        .await
        .unwrap();
    app.reconciler
        .confirm_card_payment(&intent.intent_id, booking.booking_id)
        .await
        .unwrap();

    let events = app.sink.events();
    assert_eq!(events.len(), before + 2);
    assert!(matches!(
        events[before],
        NotificationEvent::PaymentSettled {
            payment_status: BillingStatus::Completed,
            ..
        }
    ));
    assert!(matches!(
        events[before + 1],
        NotificationEvent::StatusChanged {
            from_status: BookingStatus::InProgress,
            to_status: BookingStatus::Completed,
            ..
        }
    ));
}

#[tokio::test]
async fn reconfirming_a_settled_intent_is_rejected() {
    let app = TestApp::spawn();
    let booking = app.billed_booking().await;

    let intent = app
        .reconciler
        .create_card_intent(booking.booking_id)
        .await
        .unwrap();
    app.reconciler
        .confirm_card_payment(&intent.intent_id, booking.booking_id)
        .await
        .unwrap();

    let err = app
        .reconciler
        .confirm_card_payment(&intent.intent_id, booking.booking_id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AlreadyPaid(_)));

    // Paid amount did not double.
    let stored = app.bookings.get_booking(booking.booking_id).await.unwrap();
    assert_eq!(stored.pricing.paid_amount, dec("5814.00"));
}

#[tokio::test]
async fn intent_for_a_settled_booking_is_rejected() {
    let app = TestApp::spawn();
    let booking = app.billed_booking().await;

    app.reconciler
        .process_cash_payment(booking.booking_id, dec("5814"), &app.provider)
        .await
        .unwrap();

    let err = app
        .reconciler
        .create_card_intent(booking.booking_id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::AlreadyPaid(_)));
}

#[tokio::test]
async fn intent_for_an_unbilled_booking_is_rejected() {
    let app = TestApp::spawn();
    let booking = app.in_progress_booking().await;

    let err = app
        .reconciler
        .create_card_intent(booking.booking_id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::EmptyBill));
}

#[tokio::test]
async fn gateway_outage_records_a_failed_payment_and_allows_retry() {
    let app = TestApp::spawn();
    let booking = app.billed_booking().await;

    app.gateway.set_fail_create(true);
    let err = app
        .reconciler
        .create_card_intent(booking.booking_id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::GatewayError(_)));
    assert!(err.is_retryable());

    let payments = app
        .store
        .payments_for_booking(booking.booking_id)
        .await
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentState::Failed);

    // Booking stayed payable.
    let stored = app.bookings.get_booking(booking.booking_id).await.unwrap();
    assert_eq!(stored.pricing.paid_amount, dec("0"));
    assert_eq!(stored.pricing.payment_status, BillingStatus::Pending);

    app.gateway.set_fail_create(false);
    let intent = app
        .reconciler
        .create_card_intent(booking.booking_id)
        .await
        .unwrap();
    let (settled, _) = app
        .reconciler
        .confirm_card_payment(&intent.intent_id, booking.booking_id)
        .await
        .unwrap();
    assert_eq!(settled.pricing.payment_status, BillingStatus::Completed);
}

#[tokio::test]
async fn declined_confirmation_fails_the_attempt_not_the_booking() {
    let app = TestApp::spawn();
    let booking = app.billed_booking().await;

    let intent = app
        .reconciler
        .create_card_intent(booking.booking_id)
        .await
        .unwrap();
    app.gateway.set_decline_confirm(true);

    let err = app
        .reconciler
        .confirm_card_payment(&intent.intent_id, booking.booking_id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::GatewayError(_)));

    let payment = app.store.get_payment(intent.payment_id).await.unwrap();
    assert_eq!(payment.status, PaymentState::Failed);

    let stored = app.bookings.get_booking(booking.booking_id).await.unwrap();
    assert_eq!(stored.status, BookingStatus::InProgress);
    assert_eq!(stored.pricing.paid_amount, dec("0"));

    // The dead intent cannot be revived; a fresh one settles.
    let err = app
        .reconciler
        .confirm_card_payment(&intent.intent_id, booking.booking_id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::GatewayError(_)));

    app.gateway.set_decline_confirm(false);
    let retry = app
        .reconciler
        .create_card_intent(booking.booking_id)
        .await
        .unwrap();
    assert_ne!(retry.intent_id, intent.intent_id);
    let (settled, _) = app
        .reconciler
        .confirm_card_payment(&retry.intent_id, booking.booking_id)
        .await
        .unwrap();
    assert_eq!(settled.status, BookingStatus::Completed);

    let report = app.reconciler.audit(booking.booking_id).await.unwrap();
    assert!(report.balanced);
}

#[tokio::test]
async fn stale_intent_cannot_overpay_the_bill() {
    let app = TestApp::spawn();
    let booking = app.billed_booking().await;

    // Intent captures the full 5814, then cash shrinks the balance.
    let intent = app
        .reconciler
        .create_card_intent(booking.booking_id)
        .await
        .unwrap();
    app.reconciler
        .process_cash_payment(booking.booking_id, dec("2000"), &app.customer)
        .await
        .unwrap();

    let err = app
        .reconciler
        .confirm_card_payment(&intent.intent_id, booking.booking_id)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::GatewayError(_)));

    // Paid amount never crossed the total and the stale intent is dead.
    let stored = app.bookings.get_booking(booking.booking_id).await.unwrap();
    assert_eq!(stored.pricing.paid_amount, dec("2000"));
    assert!(stored.pricing.paid_amount <= stored.pricing.total_amount);
    let stale = app.store.get_payment(intent.payment_id).await.unwrap();
    assert_eq!(stale.status, PaymentState::Cancelled);

    // A fresh intent for the current balance settles cleanly.
    let retry = app
        .reconciler
        .create_card_intent(booking.booking_id)
        .await
        .unwrap();
    let (settled, payment) = app
        .reconciler
        .confirm_card_payment(&retry.intent_id, booking.booking_id)
        .await
        .unwrap();
    assert_eq!(payment.amount, dec("3814.00"));
    assert_eq!(settled.pricing.paid_amount, dec("5814.00"));
    assert_eq!(settled.status, BookingStatus::Completed);

    let report = app.reconciler.audit(booking.booking_id).await.unwrap();
    assert!(report.balanced);
}

#[tokio::test]
async fn cash_payment_in_full_completes_the_booking() {
    let app = TestApp::spawn();
    let booking = app.billed_booking().await;

    let (settled, payment) = app
        .reconciler
        .process_cash_payment(booking.booking_id, dec("5814"), &app.provider)
        .await
        .unwrap();

    assert_eq!(payment.method, PaymentMethod::Cash);
    assert_eq!(payment.status, PaymentState::Completed);
    assert_eq!(settled.status, BookingStatus::Completed);
    assert_eq!(settled.pricing.payment_status, BillingStatus::Completed);

    let report = app.reconciler.audit(booking.booking_id).await.unwrap();
    assert!(report.balanced);
}

#[tokio::test]
async fn partial_cash_payments_accumulate_to_settlement() {
    let app = TestApp::spawn();
    let booking = app.billed_booking().await;

    let (partial, _) = app
        .reconciler
        .process_cash_payment(booking.booking_id, dec("2000"), &app.customer)
        .await
        .unwrap();
    assert_eq!(partial.pricing.payment_status, BillingStatus::Partial);
    assert_eq!(partial.status, BookingStatus::InProgress);
    assert_eq!(partial.pricing.outstanding(), dec("3814.00"));

    let (settled, _) = app
        .reconciler
        .process_cash_payment(booking.booking_id, dec("3814"), &app.customer)
        .await
        .unwrap();
    assert_eq!(settled.pricing.payment_status, BillingStatus::Completed);
    assert_eq!(settled.status, BookingStatus::Completed);

    let report = app.reconciler.audit(booking.booking_id).await.unwrap();
    assert!(report.balanced);
    assert_eq!(report.settled_total, dec("5814"));
}

#[tokio::test]
async fn cash_amount_is_validated() {
    let app = TestApp::spawn();
    let booking = app.billed_booking().await;

    let err = app
        .reconciler
        .process_cash_payment(booking.booking_id, dec("0"), &app.provider)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidQuantity(_)));

    let err = app
        .reconciler
        .process_cash_payment(booking.booking_id, dec("9000"), &app.provider)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidQuantity(_)));
}

#[tokio::test]
async fn cash_from_a_stranger_is_rejected() {
    let app = TestApp::spawn();
    let booking = app.billed_booking().await;
    let stranger = booking_service::models::Actor::customer(uuid::Uuid::new_v4());

    let err = app
        .reconciler
        .process_cash_payment(booking.booking_id, dec("100"), &stranger)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UnauthorizedActor { .. }));
}
