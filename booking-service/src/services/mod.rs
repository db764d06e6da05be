pub mod billing;
pub mod bookings;
pub mod clock;
pub mod gateway;
pub mod lifecycle;
pub mod metrics;
pub mod notify;
pub mod reconciler;
pub mod store;

pub use billing::BillingEngine;
pub use bookings::BookingService;
pub use clock::{Clock, FixedClock, SystemClock};
pub use gateway::{CardGatewayClient, GatewayConfirmation, IntentStatus, PaymentGateway, PaymentIntent};
pub use notify::{HttpDispatcher, LoggingDispatcher, NotificationSink};
pub use reconciler::{CardIntent, PaymentReconciler, ReconciliationReport};
pub use store::{MarketplaceStore, MemoryStore, MongoStore, SettlementTxn};
