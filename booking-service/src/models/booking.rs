//! Booking model and lifecycle status.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::pricing::BookingPricing;

/// Booking lifecycle status.
///
/// Legal transitions are owned by `services::lifecycle`; nothing else may
/// move a booking between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    Confirmed,
    InProgress,
    Completed,
    Disputed,
    Cancelled,
    Refunded,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Accepted => "ACCEPTED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Disputed => "DISPUTED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Refunded => "REFUNDED",
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Rejected | BookingStatus::Cancelled | BookingStatus::Refunded
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booking priority, set by the customer at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingPriority {
    Low,
    Normal,
    High,
    Urgent,
}

/// The two parties on a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Provider,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Customer => "customer",
            ActorRole::Provider => "provider",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated party performing an operation. Supplied explicitly by
/// the identity layer; the core never reads ambient user state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn customer(id: Uuid) -> Self {
        Self {
            id,
            role: ActorRole::Customer,
        }
    }

    pub fn provider(id: Uuid) -> Self {
        Self {
            id,
            role: ActorRole::Provider,
        }
    }
}

/// One entry in a booking's append-only history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub status: BookingStatus,
    pub timestamp: DateTime<Utc>,
    pub actor_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A requested-and-scheduled service engagement between a customer and a
/// provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    #[serde(rename = "_id")]
    pub booking_id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub service_name: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: i32,
    pub status: BookingStatus,
    pub priority: BookingPriority,
    pub pricing: BookingPricing,
    pub timeline: Vec<TimelineEvent>,
    pub cancellation_reason: Option<String>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency token; bumped on every committed write.
    pub revision: i64,
}

impl Booking {
    /// True once the booking belongs to the given party.
    pub fn involves(&self, actor: &Actor) -> bool {
        match actor.role {
            ActorRole::Customer => self.customer_id == actor.id,
            ActorRole::Provider => self.provider_id == actor.id,
        }
    }
}

/// Input for creating a booking.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub customer_id: Uuid,
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub service_name: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: i32,
    pub priority: BookingPriority,
}
