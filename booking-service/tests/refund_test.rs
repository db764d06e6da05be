//! Refund tests: partial and full refunds, over-refund guards, and the
//! paid-amount invariant checked through `audit` after every mutation.

mod common;

use booking_service::error::CoreError;
use booking_service::models::{BillingStatus, BookingStatus, PaymentState};
use booking_service::services::MarketplaceStore;
use common::{dec, TestApp};
use uuid::Uuid;

/// Settle the standard 5814 bill with one card payment and hand back the
/// payment id.
async fn settled_booking(app: &TestApp) -> (Uuid, Uuid) {
    let booking = app.billed_booking().await;
    let intent = app
        .reconciler
        .create_card_intent(booking.booking_id)
        .await
        .unwrap();
    let (_, payment) = app
        .reconciler
        .confirm_card_payment(&intent.intent_id, booking.booking_id)
        .await
        .unwrap();
    (booking.booking_id, payment.payment_id)
}

#[tokio::test]
async fn partial_refund_moves_the_booking_back_to_partial() {
    let app = TestApp::spawn();
    let (booking_id, payment_id) = settled_booking(&app).await;

    let (booking, payment) = app
        .reconciler
        .refund(payment_id, dec("1000"), "damaged fixture".to_string())
        .await
        .unwrap();

    assert_eq!(payment.status, PaymentState::Completed);
    assert_eq!(payment.refunded_amount(), dec("1000"));
    assert_eq!(payment.refundable(), dec("4814.00"));
    assert_eq!(booking.pricing.paid_amount, dec("4814.00"));
    assert_eq!(booking.pricing.payment_status, BillingStatus::Partial);
    // A partial refund does not reopen or refund the whole booking.
    assert_eq!(booking.status, BookingStatus::Completed);

    let report = app.reconciler.audit(booking_id).await.unwrap();
    assert!(report.balanced);
    assert_eq!(report.refunded_total, dec("1000"));
}

#[tokio::test]
async fn full_refund_marks_payment_and_booking_refunded() {
    let app = TestApp::spawn();
    let (booking_id, payment_id) = settled_booking(&app).await;

    let (booking, payment) = app
        .reconciler
        .refund(payment_id, dec("5814"), "service not delivered".to_string())
        .await
        .unwrap();

    assert_eq!(payment.status, PaymentState::Refunded);
    assert_eq!(payment.refundable(), dec("0"));
    assert_eq!(booking.pricing.paid_amount, dec("0"));
    assert_eq!(booking.pricing.payment_status, BillingStatus::Refunded);
    assert_eq!(booking.status, BookingStatus::Refunded);

    let report = app.reconciler.audit(booking_id).await.unwrap();
    assert!(report.balanced);
    assert_eq!(report.settled_total, dec("5814"));
    assert_eq!(report.refunded_total, dec("5814"));
}

#[tokio::test]
async fn refunds_accumulate_until_the_payment_is_exhausted() {
    let app = TestApp::spawn();
    let (booking_id, payment_id) = settled_booking(&app).await;

    app.reconciler
        .refund(payment_id, dec("2000"), "first adjustment".to_string())
        .await
        .unwrap();
    let (booking, payment) = app
        .reconciler
        .refund(payment_id, dec("3814"), "remainder".to_string())
        .await
        .unwrap();

    assert_eq!(payment.refunds.len(), 2);
    assert_eq!(payment.status, PaymentState::Refunded);
    assert_eq!(booking.pricing.payment_status, BillingStatus::Refunded);
    assert_eq!(booking.status, BookingStatus::Refunded);

    let report = app.reconciler.audit(booking_id).await.unwrap();
    assert!(report.balanced);
}

#[tokio::test]
async fn over_refund_is_rejected_and_changes_nothing() {
    let app = TestApp::spawn();
    let (booking_id, payment_id) = settled_booking(&app).await;

    app.reconciler
        .refund(payment_id, dec("5000"), "goodwill".to_string())
        .await
        .unwrap();

    let err = app
        .reconciler
        .refund(payment_id, dec("1000"), "too much".to_string())
        .await
        .unwrap_err();
    match err {
        CoreError::OverRefund {
            requested,
            available,
        } => {
            assert_eq!(requested, dec("1000"));
            assert_eq!(available, dec("814.00"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let payment = app.store.get_payment(payment_id).await.unwrap();
    assert_eq!(payment.refunds.len(), 1);
    let report = app.reconciler.audit(booking_id).await.unwrap();
    assert!(report.balanced);
}

#[tokio::test]
async fn pending_payment_has_nothing_to_refund() {
    let app = TestApp::spawn();
    let booking = app.billed_booking().await;
    let intent = app
        .reconciler
        .create_card_intent(booking.booking_id)
        .await
        .unwrap();

    let err = app
        .reconciler
        .refund(intent.payment_id, dec("100"), "premature".to_string())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::OverRefund {
            available,
            ..
        } if available == dec("0")
    ));
}

#[tokio::test]
async fn non_positive_refund_amount_is_rejected() {
    let app = TestApp::spawn();
    let (_, payment_id) = settled_booking(&app).await;

    let err = app
        .reconciler
        .refund(payment_id, dec("0"), "noop".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidQuantity(_)));

    let err = app
        .reconciler
        .refund(payment_id, dec("-10"), "negative".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidQuantity(_)));
}
