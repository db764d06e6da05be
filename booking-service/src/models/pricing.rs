//! Bill and pricing models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a service line item is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingModel {
    Hourly,
    DailyFixed,
    PerSqFt,
    Fixed,
}

impl PricingModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PricingModel::Hourly => "HOURLY",
            PricingModel::DailyFixed => "DAILY_FIXED",
            PricingModel::PerSqFt => "PER_SQ_FT",
            PricingModel::Fixed => "FIXED",
        }
    }
}

/// Settlement status of a booking's bill as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingStatus {
    Pending,
    Partial,
    Completed,
    Refunded,
    Failed,
}

impl BillingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Pending => "PENDING",
            BillingStatus::Partial => "PARTIAL",
            BillingStatus::Completed => "COMPLETED",
            BillingStatus::Refunded => "REFUNDED",
            BillingStatus::Failed => "FAILED",
        }
    }
}

/// An extra charge a provider stages onto a bill. Only approved charges
/// count toward the persisted total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditionalCharge {
    pub description: String,
    pub amount: Decimal,
    pub approved: bool,
}

/// A staged bill entry for one service, alive only while the provider is
/// composing the bill. `quantity` is the raw form input; it is bound to the
/// pricing model's unit (hours, days, square feet) and ignored for FIXED.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillLineItem {
    pub service_id: Uuid,
    pub pricing_model: PricingModel,
    pub unit_rate: Decimal,
    pub quantity: String,
    pub calculated_amount: Decimal,
}

/// Travel fee, tax, and discount applied on top of a bill's subtotal.
#[derive(Debug, Clone, Default)]
pub struct BillExtras {
    pub travel_fee: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
}

/// The priced breakdown attached to a booking.
///
/// `total_amount == base_price + Σ approved charges + travel_fee + tax
/// + platform_fee − discount`, rounded to 2 decimal places. `paid_amount`
/// mirrors the sum of completed payments minus processed refunds; the
/// reconciler keeps the two in step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingPricing {
    pub base_price: Decimal,
    pub additional_charges: Vec<AdditionalCharge>,
    pub discount: Decimal,
    pub travel_fee: Decimal,
    pub tax: Decimal,
    pub platform_fee: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub currency: String,
    pub payment_status: BillingStatus,
}

impl BookingPricing {
    /// Zeroed pricing for a booking that has not been billed yet.
    pub fn unbilled(currency: &str) -> Self {
        Self {
            base_price: Decimal::ZERO,
            additional_charges: Vec::new(),
            discount: Decimal::ZERO,
            travel_fee: Decimal::ZERO,
            tax: Decimal::ZERO,
            platform_fee: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            paid_amount: Decimal::ZERO,
            currency: currency.to_string(),
            payment_status: BillingStatus::Pending,
        }
    }

    /// Balance still owed on the bill.
    pub fn outstanding(&self) -> Decimal {
        self.total_amount - self.paid_amount
    }

    pub fn is_settled(&self) -> bool {
        self.payment_status == BillingStatus::Completed
    }
}
