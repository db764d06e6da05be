//! Error taxonomy for the booking core.
//!
//! Every failure here is a typed, local condition, not a crash. Callers use
//! `is_retryable` to decide whether re-invoking the same operation can
//! succeed, and `user_message` to surface a distinct, actionable message.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::BookingStatus;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("illegal booking transition: {from} -> {to}")]
    IllegalTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("actor {actor_id} may not move a booking from {from} to {to}")]
    UnauthorizedActor {
        actor_id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("bill has no billable value")]
    EmptyBill,

    #[error("booking {0} is already fully paid")]
    AlreadyPaid(Uuid),

    #[error("refund of {requested} exceeds refundable balance of {available}")]
    OverRefund {
        requested: Decimal,
        available: Decimal,
    },

    #[error("payment gateway error: {0}")]
    GatewayError(String),

    #[error("concurrent modification of {collection} {id}")]
    ConcurrentModification { collection: &'static str, id: String },

    #[error("{collection} {id} not found")]
    NotFound { collection: &'static str, id: String },

    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl CoreError {
    /// Whether re-invoking the same operation unchanged can succeed.
    ///
    /// Gateway and write-conflict failures are transient; everything else
    /// requires the caller to change the request first.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoreError::GatewayError(_)
                | CoreError::ConcurrentModification { .. }
                | CoreError::Storage(_)
        )
    }

    /// Distinct, actionable message per error kind.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::IllegalTransition { from, to } => format!(
                "This booking is currently {from} and cannot move to {to}. \
                 Refresh to see its latest state."
            ),
            CoreError::UnauthorizedActor { from, to, .. } => format!(
                "You are not the party allowed to move this booking from {from} to {to}."
            ),
            CoreError::InvalidQuantity(detail) => {
                format!("Please enter a valid positive quantity: {detail}.")
            }
            CoreError::EmptyBill => {
                "The bill has no billable amount. Add at least one line item or \
                 approved charge before confirming."
                    .to_string()
            }
            CoreError::AlreadyPaid(_) => {
                "This booking has already been paid in full. The pay button is \
                 disabled to prevent a duplicate charge; no further payment is due."
                    .to_string()
            }
            CoreError::OverRefund {
                requested,
                available,
            } => format!(
                "A refund of {requested} exceeds the {available} still refundable \
                 on this payment."
            ),
            CoreError::GatewayError(_) => {
                "The payment provider could not process the request. No charge was \
                 made; please try again."
                    .to_string()
            }
            CoreError::ConcurrentModification { .. } => {
                "The booking changed while you were acting on it. Refresh and try again."
                    .to_string()
            }
            CoreError::NotFound { collection, .. } => {
                format!("The requested {collection} does not exist.")
            }
            CoreError::Storage(_) => {
                "A temporary storage problem interrupted the request. Please retry."
                    .to_string()
            }
        }
    }
}

impl From<mongodb::error::Error> for CoreError {
    fn from(err: mongodb::error::Error) -> Self {
        CoreError::Storage(anyhow::Error::new(err))
    }
}
