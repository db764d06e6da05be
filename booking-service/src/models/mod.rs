//! Domain models for booking-service.

pub mod booking;
pub mod event;
pub mod payment;
pub mod pricing;

pub use booking::{
    Actor, ActorRole, Booking, BookingPriority, BookingStatus, CreateBooking, TimelineEvent,
};
pub use event::{BookingEvent, NotificationEvent};
pub use payment::{Payment, PaymentMethod, PaymentState, Refund, RefundStatus};
pub use pricing::{
    AdditionalCharge, BillExtras, BillLineItem, BillingStatus, BookingPricing, PricingModel,
};
