//! MongoDB store backend.
//!
//! Bookings and payments live in their own collections; `commit` runs a
//! multi-document session transaction so settlement writes land together.
//! Revision filters on every replace turn lost-update races into
//! `ConcurrentModification`.

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::options::{FindOptions, IndexOptions};
use mongodb::{bson::doc, Client, ClientSession, Collection, IndexModel};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::CoreError;
use crate::models::{Booking, Payment};
use crate::services::store::{MarketplaceStore, SettlementTxn, BOOKINGS, PAYMENTS};

#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    bookings: Collection<Booking>,
    payments: Collection<Payment>,
}

impl MongoStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, CoreError> {
        let client = Client::with_uri_str(config.url.expose_secret()).await?;
        let db = client.database(&config.db_name);
        let store = Self {
            bookings: db.collection(BOOKINGS),
            payments: db.collection(PAYMENTS),
            client,
        };
        store.init_indexes().await?;
        Ok(store)
    }

    /// Initialize indexes for booking-scoped and intent-scoped lookups.
    async fn init_indexes(&self) -> Result<(), CoreError> {
        let booking_payments_index = IndexModel::builder()
            .keys(doc! { "booking_id": 1, "created_at": 1 })
            .options(
                IndexOptions::builder()
                    .name("booking_payments_idx".to_string())
                    .build(),
            )
            .build();

        let intent_index = IndexModel::builder()
            .keys(doc! { "gateway_transaction_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("gateway_intent_idx".to_string())
                    .sparse(true)
                    .build(),
            )
            .build();

        self.payments
            .create_indexes([booking_payments_index, intent_index], None)
            .await?;

        let status_index = IndexModel::builder()
            .keys(doc! { "customer_id": 1, "status": 1 })
            .options(
                IndexOptions::builder()
                    .name("customer_status_idx".to_string())
                    .build(),
            )
            .build();

        self.bookings.create_indexes([status_index], None).await?;

        tracing::info!("booking store indexes initialized");
        Ok(())
    }

    async fn replace_booking_in_session(
        &self,
        expected_revision: i64,
        booking: &Booking,
        session: &mut ClientSession,
    ) -> Result<(), CoreError> {
        let filter = doc! {
            "_id": booking.booking_id.to_string(),
            "revision": expected_revision,
        };
        let result = self
            .bookings
            .replace_one_with_session(filter, booking, None, session)
            .await?;
        if result.matched_count == 0 {
            return Err(CoreError::ConcurrentModification {
                collection: BOOKINGS,
                id: booking.booking_id.to_string(),
            });
        }
        Ok(())
    }

    async fn replace_payment_in_session(
        &self,
        expected_revision: i64,
        payment: &Payment,
        session: &mut ClientSession,
    ) -> Result<(), CoreError> {
        let filter = doc! {
            "_id": payment.payment_id.to_string(),
            "revision": expected_revision,
        };
        let result = self
            .payments
            .replace_one_with_session(filter, payment, None, session)
            .await?;
        if result.matched_count == 0 {
            return Err(CoreError::ConcurrentModification {
                collection: PAYMENTS,
                id: payment.payment_id.to_string(),
            });
        }
        Ok(())
    }

    async fn commit_in_session(
        &self,
        txn: &SettlementTxn,
        session: &mut ClientSession,
    ) -> Result<(), CoreError> {
        session.start_transaction(None).await?;

        if let Some((expected, booking)) = &txn.replace_booking {
            self.replace_booking_in_session(*expected, booking, session)
                .await?;
        }
        for payment in &txn.insert_payments {
            self.payments
                .insert_one_with_session(payment, None, session)
                .await?;
        }
        for (expected, payment) in &txn.replace_payments {
            self.replace_payment_in_session(*expected, payment, session)
                .await?;
        }

        session.commit_transaction().await?;
        Ok(())
    }
}

#[async_trait]
impl MarketplaceStore for MongoStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), CoreError> {
        self.bookings.insert_one(booking, None).await?;
        Ok(())
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, CoreError> {
        let filter = doc! { "_id": booking_id.to_string() };
        self.bookings
            .find_one(filter, None)
            .await?
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
        let filter = doc! {
            "_id": booking.booking_id.to_string(),
            "revision": expected_revision,
        };
        let result = self.bookings.replace_one(filter, booking, None).await?;
        if result.matched_count == 0 {
            return Err(CoreError::ConcurrentModification {
                collection: BOOKINGS,
                id: booking.booking_id.to_string(),
            });
        }
        Ok(())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), CoreError> {
        self.payments.insert_one(payment, None).await?;
        Ok(())
    }

    async fn get_payment(&self, payment_id: Uuid) -> Result<Payment, CoreError> {
        let filter = doc! { "_id": payment_id.to_string() };
        self.payments
            .find_one(filter, None)
            .await?
            .ok_or(CoreError::NotFound {
                collection: PAYMENTS,
                id: payment_id.to_string(),
            })
    }

    async fn payment_by_intent(&self, intent_id: &str) -> Result<Option<Payment>, CoreError> {
        let filter = doc! { "gateway_transaction_id": intent_id };
        Ok(self.payments.find_one(filter, None).await?)
    }

    async fn payments_for_booking(&self, booking_id: Uuid) -> Result<Vec<Payment>, CoreError> {
        let filter = doc! { "booking_id": booking_id.to_string() };
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1 })
            .build();
        let cursor = self.payments.find(filter, Some(options)).await?;
        let payments: Vec<Payment> = cursor.try_collect().await?;
        Ok(payments)
    }

    async fn commit(&self, txn: SettlementTxn) -> Result<(), CoreError> {
        let mut session = self.client.start_session(None).await?;

        match self.commit_in_session(&txn, &mut session).await {
            Ok(()) => Ok(()),
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    tracing::warn!(error = %abort_err, "failed to abort settlement transaction");
                }
                Err(err)
            }
        }
    }
}
