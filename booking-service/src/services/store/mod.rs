//! Document store contract for bookings and payments.
//!
//! Every mutation is a compare-and-set on the record's `revision`; a blind
//! field overwrite has no place here. `commit` applies one booking replace
//! plus any payment writes atomically, so a Payment is never persisted
//! without its Booking update (or vice versa).

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{Booking, Payment};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

pub const BOOKINGS: &str = "bookings";
pub const PAYMENTS: &str = "payments";

/// One atomic write set. `expected_revision` is the revision currently in
/// the store; the new document carries `expected_revision + 1`.
#[derive(Debug, Default)]
pub struct SettlementTxn {
    pub replace_booking: Option<(i64, Booking)>,
    pub insert_payments: Vec<Payment>,
    pub replace_payments: Vec<(i64, Payment)>,
}

impl SettlementTxn {
    pub fn booking(mut self, expected_revision: i64, booking: Booking) -> Self {
        self.replace_booking = Some((expected_revision, booking));
        self
    }

    pub fn insert_payment(mut self, payment: Payment) -> Self {
        self.insert_payments.push(payment);
        self
    }

    pub fn replace_payment(mut self, expected_revision: i64, payment: Payment) -> Self {
        self.replace_payments.push((expected_revision, payment));
        self
    }
}

#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), CoreError>;

    async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, CoreError>;

    /// Replace a booking iff its stored revision matches; fails with
    /// `ConcurrentModification` otherwise.
    async fn replace_booking(
        &self,
        expected_revision: i64,
        booking: &Booking,
    ) -> Result<(), CoreError>;

    async fn insert_payment(&self, payment: &Payment) -> Result<(), CoreError>;

    async fn get_payment(&self, payment_id: Uuid) -> Result<Payment, CoreError>;

    /// Look up the payment carrying a gateway intent id, if any.
    async fn payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>, CoreError>;

    async fn payments_for_booking(&self, booking_id: Uuid) -> Result<Vec<Payment>, CoreError>;

    /// Apply the whole write set or none of it.
    async fn commit(&self, txn: SettlementTxn) -> Result<(), CoreError>;
}
