//! Booking state machine.
//!
//! Owns the legal-transition table and per-edge authorization. Pure: no
//! store access, no ambient clock, no dispatcher calls. A successful
//! transition mutates the booking in place and returns a `BookingEvent`
//! descriptor the caller forwards to the notification collaborator.

use chrono::{DateTime, Utc};

use crate::error::CoreError;
use crate::models::{Actor, ActorRole, Booking, BookingEvent, BookingStatus, TimelineEvent};

use ActorRole::{Customer, Provider};
use BookingStatus::*;

const BOTH: &[ActorRole] = &[Customer, Provider];
const CUSTOMER_ONLY: &[ActorRole] = &[Customer];
const PROVIDER_ONLY: &[ActorRole] = &[Provider];

/// Roles permitted on a given edge, or `None` when the edge itself is
/// illegal. A request naming the current status falls through to `None` so
/// duplicate taps surface as `IllegalTransition` instead of silently
/// succeeding.
fn allowed_roles(from: BookingStatus, to: BookingStatus) -> Option<&'static [ActorRole]> {
    match (from, to) {
        (Pending, Accepted) => Some(PROVIDER_ONLY),
        (Pending, Rejected) => Some(PROVIDER_ONLY),
        (Accepted, Confirmed) => Some(CUSTOMER_ONLY),
        (Accepted, Cancelled) => Some(BOTH),
        (Confirmed, InProgress) => Some(PROVIDER_ONLY),
        (Confirmed, Cancelled) => Some(BOTH),
        (InProgress, Completed) => Some(BOTH),
        (InProgress, Disputed) => Some(CUSTOMER_ONLY),
        (InProgress, Cancelled) => Some(BOTH),
        (Completed, Disputed) => Some(CUSTOMER_ONLY),
        (Completed, Refunded) => Some(PROVIDER_ONLY),
        (Disputed, Refunded) => Some(PROVIDER_ONLY),
        (Disputed, Completed) => Some(CUSTOMER_ONLY),
        _ => None,
    }
}

/// Whether the edge exists at all, regardless of actor.
pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    allowed_roles(from, to).is_some()
}

/// Apply one status transition.
///
/// On success: sets the status, sets the matching timestamp exactly once
/// (a booking that passes through DISPUTED back to COMPLETED keeps its
/// original `completed_at`), appends exactly one timeline event, and bumps
/// `updated_at`.
pub fn transition(
    booking: &mut Booking,
    target: BookingStatus,
    actor: &Actor,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<BookingEvent, CoreError> {
    let from = booking.status;

    let roles = allowed_roles(from, target).ok_or(CoreError::IllegalTransition {
        from,
        to: target,
    })?;

    if !booking.involves(actor) || !roles.contains(&actor.role) {
        return Err(CoreError::UnauthorizedActor {
            actor_id: actor.id,
            from,
            to: target,
        });
    }

    booking.status = target;
    match target {
        Accepted => {
            booking.accepted_at.get_or_insert(now);
        }
        InProgress => {
            booking.started_at.get_or_insert(now);
        }
        Completed => {
            booking.completed_at.get_or_insert(now);
        }
        Cancelled => {
            booking.cancelled_at.get_or_insert(now);
            if reason.is_some() {
                booking.cancellation_reason = reason.clone();
            }
        }
        _ => {}
    }

    booking.timeline.push(TimelineEvent {
        status: target,
        timestamp: now,
        actor_id: actor.id,
        note: reason,
    });
    booking.updated_at = now;

    Ok(BookingEvent {
        booking_id: booking.booking_id,
        from_status: from,
        to_status: target,
        actor_id: actor.id,
    })
}
