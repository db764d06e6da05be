//! In-memory store backend.
//!
//! A single mutex over both collections gives the same atomicity and
//! compare-and-set semantics as the Mongo backend. Used by tests and by
//! embedders that bring their own persistence.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{Booking, Payment};
use crate::services::store::{MarketplaceStore, SettlementTxn, BOOKINGS, PAYMENTS};

#[derive(Default)]
struct Collections {
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_booking_revision(
        collections: &Collections,
        expected: i64,
        booking: &Booking,
    ) -> Result<(), CoreError> {
        match collections.bookings.get(&booking.booking_id) {
            Some(current) if current.revision == expected => Ok(()),
            Some(_) => Err(CoreError::ConcurrentModification {
                collection: BOOKINGS,
                id: booking.booking_id.to_string(),
            }),
            None => Err(CoreError::NotFound {
                collection: BOOKINGS,
                id: booking.booking_id.to_string(),
            }),
        }
    }

    fn check_payment_revision(
        collections: &Collections,
        expected: i64,
        payment: &Payment,
    ) -> Result<(), CoreError> {
        match collections.payments.get(&payment.payment_id) {
            Some(current) if current.revision == expected => Ok(()),
            Some(_) => Err(CoreError::ConcurrentModification {
                collection: PAYMENTS,
                id: payment.payment_id.to_string(),
            }),
            None => Err(CoreError::NotFound {
                collection: PAYMENTS,
                id: payment.payment_id.to_string(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Collections> {
        // A poisoned lock means a writer panicked mid-map-update; the maps
        // themselves are still structurally sound.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl MarketplaceStore for MemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), CoreError> {
        let mut collections = self.lock();
        collections
            .bookings
            .insert(booking.booking_id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, CoreError> {
        let collections = self.lock();
        collections
            .bookings
            .get(&booking_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                collection: BOOKINGS,
                id: booking_id.to_string(),
            })
    }

    async fn replace_booking(
        &self,
        expected_revision: i64,
        booking: &Booking,
    ) -> Result<(), CoreError> {
        let mut collections = self.lock();
        Self::check_booking_revision(&collections, expected_revision, booking)?;
        collections
            .bookings
            .insert(booking.booking_id, booking.clone());
        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), CoreError> {
        let mut collections = self.lock();
        collections
            .payments
            .insert(payment.payment_id, payment.clone());
        Ok(())
    }

    async fn get_payment(&self, payment_id: Uuid) -> Result<Payment, CoreError> {
        let collections = self.lock();
        collections
            .payments
            .get(&payment_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                collection: PAYMENTS,
                id: payment_id.to_string(),
            })
    }

    async fn payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>, CoreError> {
        let collections = self.lock();
        Ok(collections
            .payments
            .values()
            .find(|p| p.gateway_transaction_id.as_deref() == Some(intent_id))
            .cloned())
    }

    async fn payments_for_booking(&self, booking_id: Uuid) -> Result<Vec<Payment>, CoreError> {
        let collections = self.lock();
        let mut payments: Vec<Payment> = collections
            .payments
            .values()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    async fn commit(&self, txn: SettlementTxn) -> Result<(), CoreError> {
        let mut collections = self.lock();

        // Validate every write first so the whole set applies or none does.
        if let Some((expected, booking)) = &txn.replace_booking {
            Self::check_booking_revision(&collections, *expected, booking)?;
        }
        for (expected, payment) in &txn.replace_payments {
            Self::check_payment_revision(&collections, *expected, payment)?;
        }

        if let Some((_, booking)) = txn.replace_booking {
            collections.bookings.insert(booking.booking_id, booking);
        }
        for payment in txn.insert_payments {
            collections.payments.insert(payment.payment_id, payment);
        }
        for (_, payment) in txn.replace_payments {
            collections.payments.insert(payment.payment_id, payment);
        }
        Ok(())
    }
}
