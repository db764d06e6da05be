//! Payment and refund models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State of a single payment attempt.
///
/// FAILED and CANCELLED are terminal; a retry is a new payment, never a
/// mutated one, so the attempt history stays auditable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
    Refunded,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "PENDING",
            PaymentState::Processing => "PROCESSING",
            PaymentState::Completed => "COMPLETED",
            PaymentState::Failed => "FAILED",
            PaymentState::Cancelled => "CANCELLED",
            PaymentState::Refunded => "REFUNDED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentState::Failed | PaymentState::Cancelled | PaymentState::Refunded
        )
    }
}

/// How the funds moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Wallet => "WALLET",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefundStatus {
    Processed,
    Failed,
}

/// A refund applied against one payment. `amount` never exceeds the
/// payment's amount minus prior refunds on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub refund_id: Uuid,
    pub amount: Decimal,
    pub reason: String,
    pub status: RefundStatus,
    pub processed_at: DateTime<Utc>,
}

/// An immutable record of funds moved (or attempted) against a booking.
///
/// Many payments may reference one booking over its lifetime: a failed
/// attempt followed by a successful one, or a payment plus a later refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    #[serde(rename = "_id")]
    pub payment_id: Uuid,
    pub booking_id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub method: PaymentMethod,
    pub status: PaymentState,
    /// Gateway-side identifier (payment intent id) for card payments.
    pub gateway_transaction_id: Option<String>,
    /// Raw gateway response captured for audit.
    pub gateway_response: Option<String>,
    pub fees: Decimal,
    pub refunds: Vec<Refund>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency token; bumped on every committed write.
    pub revision: i64,
}

impl Payment {
    /// Sum of refunds already processed against this payment.
    pub fn refunded_amount(&self) -> Decimal {
        self.refunds
            .iter()
            .filter(|r| r.status == RefundStatus::Processed)
            .map(|r| r.amount)
            .sum()
    }

    /// Balance still refundable on this payment.
    pub fn refundable(&self) -> Decimal {
        self.amount - self.refunded_amount()
    }
}
