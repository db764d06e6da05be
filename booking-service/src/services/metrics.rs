//! Metrics module for booking-service.
//! Provides Prometheus metrics for lifecycle, billing, and settlement flows.

use prometheus::{
    histogram_opts, opts, register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec,
    IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Booking transitions counter
pub static BOOKING_TRANSITIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Payments counter by method and outcome
pub static PAYMENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Refunds counter
pub static REFUNDS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Gateway request counter
pub static GATEWAY_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Gateway request duration histogram
pub static GATEWAY_REQUEST_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Settled amount counter by currency (monetary tracking)
pub static SETTLED_AMOUNT_TOTAL: OnceLock<prometheus::CounterVec> = OnceLock::new();

/// Initialize all metrics. Call once at startup.
pub fn init_metrics() {
    BOOKING_TRANSITIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "booking_transitions_total",
                "Total booking status transitions by edge"
            ),
            &["from", "to"]
        )
        .expect("Failed to register BOOKING_TRANSITIONS_TOTAL")
    });

    PAYMENTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "booking_payments_total",
                "Total payment attempts by method and outcome"
            ),
            &["method", "status"]
        )
        .expect("Failed to register PAYMENTS_TOTAL")
    });

    REFUNDS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("booking_refunds_total", "Total refunds by outcome"),
            &["status"]
        )
        .expect("Failed to register REFUNDS_TOTAL")
    });

    GATEWAY_REQUESTS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "booking_gateway_requests_total",
                "Total payment gateway requests by operation and outcome"
            ),
            &["operation", "status"]
        )
        .expect("Failed to register GATEWAY_REQUESTS_TOTAL")
    });

    GATEWAY_REQUEST_DURATION.get_or_init(|| {
        register_histogram_vec!(
            histogram_opts!(
                "booking_gateway_request_duration_seconds",
                "Payment gateway request duration",
                vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
            ),
            &["operation"]
        )
        .expect("Failed to register GATEWAY_REQUEST_DURATION")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "booking_errors_total",
                "Total errors by type for alerting"
            ),
            &["error_type", "operation"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });

    SETTLED_AMOUNT_TOTAL.get_or_init(|| {
        prometheus::register_counter_vec!(
            prometheus::opts!(
                "booking_settled_amount_total",
                "Total settled amount by currency and method"
            ),
            &["currency", "method"]
        )
        .expect("Failed to register SETTLED_AMOUNT_TOTAL")
    });
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to string")
}

/// Record a booking transition.
pub fn record_transition(from: &str, to: &str) {
    if let Some(counter) = BOOKING_TRANSITIONS_TOTAL.get() {
        counter.with_label_values(&[from, to]).inc();
    }
}

/// Record a payment attempt outcome.
pub fn record_payment(method: &str, status: &str) {
    if let Some(counter) = PAYMENTS_TOTAL.get() {
        counter.with_label_values(&[method, status]).inc();
    }
}

/// Record a refund outcome.
pub fn record_refund(status: &str) {
    if let Some(counter) = REFUNDS_TOTAL.get() {
        counter.with_label_values(&[status]).inc();
    }
}

/// Record a gateway request outcome.
pub fn record_gateway_request(operation: &str, status: &str) {
    if let Some(counter) = GATEWAY_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[operation, status]).inc();
    }
}

/// Record gateway request duration.
pub fn record_gateway_duration(operation: &str, duration_secs: f64) {
    if let Some(histogram) = GATEWAY_REQUEST_DURATION.get() {
        histogram
            .with_label_values(&[operation])
            .observe(duration_secs);
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, operation: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, operation]).inc();
    }
}

/// Record a settled amount for financial tracking.
pub fn record_settled_amount(currency: &str, method: &str, amount: f64) {
    if let Some(counter) = SETTLED_AMOUNT_TOTAL.get() {
        counter
            .with_label_values(&[currency, method])
            .inc_by(amount.abs());
    }
}
