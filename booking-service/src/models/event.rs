//! Event descriptors handed to the notification collaborator.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::models::booking::BookingStatus;
use crate::models::pricing::BillingStatus;

/// Descriptor returned by a successful lifecycle transition. The state
/// machine never talks to the dispatcher itself; the caller forwards this.
#[derive(Debug, Clone, Serialize)]
pub struct BookingEvent {
    pub booking_id: Uuid,
    pub from_status: BookingStatus,
    pub to_status: BookingStatus,
    pub actor_id: Uuid,
}

/// Fan-out payload for the notification collaborator. Delivery is
/// fire-and-forget; a failed dispatch never fails the originating operation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    StatusChanged {
        booking_id: Uuid,
        actor_id: Uuid,
        from_status: BookingStatus,
        to_status: BookingStatus,
    },
    PaymentSettled {
        booking_id: Uuid,
        actor_id: Uuid,
        payment_id: Uuid,
        amount: Decimal,
        payment_status: BillingStatus,
    },
}

impl NotificationEvent {
    pub fn booking_id(&self) -> Uuid {
        match self {
            NotificationEvent::StatusChanged { booking_id, .. } => *booking_id,
            NotificationEvent::PaymentSettled { booking_id, .. } => *booking_id,
        }
    }
}

impl From<&BookingEvent> for NotificationEvent {
    fn from(event: &BookingEvent) -> Self {
        NotificationEvent::StatusChanged {
            booking_id: event.booking_id,
            actor_id: event.actor_id,
            from_status: event.from_status,
            to_status: event.to_status,
        }
    }
}
