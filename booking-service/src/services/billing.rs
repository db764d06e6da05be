//! Billing engine.
//!
//! Pure money arithmetic: line-item pricing and bill composition. All
//! amounts are `Decimal`, rounded to 2 decimal places with midpoint away
//! from zero. Parse failures are explicit `InvalidQuantity` errors, never
//! silent zeros.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::error::CoreError;
use crate::models::{AdditionalCharge, BillExtras, BillLineItem, BillingStatus, BookingPricing, PricingModel};

/// Round to 2 decimal places, midpoint away from zero.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Clone)]
pub struct BillingEngine {
    platform_fee_rate: Decimal,
}

impl Default for BillingEngine {
    fn default() -> Self {
        // 2% platform fee unless configured otherwise.
        Self::new(Decimal::new(2, 2))
    }
}

impl BillingEngine {
    pub fn new(platform_fee_rate: Decimal) -> Self {
        Self { platform_fee_rate }
    }

    pub fn platform_fee_rate(&self) -> Decimal {
        self.platform_fee_rate
    }

    /// Price one line item from the raw quantity form input.
    ///
    /// FIXED services are priced per job: the rate is the amount and the
    /// quantity is ignored even when present. For the per-unit models a
    /// blank quantity is 0 (incremental form entry), while a non-numeric or
    /// non-positive quantity is an `InvalidQuantity` error.
    pub fn calculate_line_item(
        &self,
        model: PricingModel,
        unit_rate: Decimal,
        quantity: &str,
    ) -> Result<Decimal, CoreError> {
        if model == PricingModel::Fixed {
            return Ok(round2(unit_rate));
        }

        let raw = quantity.trim();
        if raw.is_empty() {
            return Ok(Decimal::ZERO);
        }

        let qty = Decimal::from_str(raw)
            .map_err(|_| CoreError::InvalidQuantity(format!("'{raw}' is not a number")))?;
        if qty <= Decimal::ZERO {
            return Err(CoreError::InvalidQuantity(format!(
                "'{raw}' must be greater than zero"
            )));
        }

        Ok(round2(qty * unit_rate))
    }

    /// Recompute a line item's derived amount in place.
    pub fn price_line_item(&self, item: &mut BillLineItem) -> Result<(), CoreError> {
        item.calculated_amount =
            self.calculate_line_item(item.pricing_model, item.unit_rate, &item.quantity)?;
        Ok(())
    }

    /// Aggregate line items and additional charges into a booking's bill.
    ///
    /// Unapproved charges are staged on the pricing record but excluded
    /// from every total. Tax and travel fee are always added; the discount
    /// is the only subtraction.
    pub fn compose_bill(
        &self,
        line_items: &[BillLineItem],
        additional_charges: Vec<AdditionalCharge>,
        extras: BillExtras,
        currency: &str,
    ) -> Result<BookingPricing, CoreError> {
        let base_price: Decimal = line_items.iter().map(|i| i.calculated_amount).sum();
        let approved_charges: Decimal = additional_charges
            .iter()
            .filter(|c| c.approved)
            .map(|c| c.amount)
            .sum();

        let has_billable_value = line_items
            .iter()
            .any(|i| i.calculated_amount > Decimal::ZERO)
            || additional_charges
                .iter()
                .any(|c| c.approved && c.amount > Decimal::ZERO);
        if !has_billable_value {
            return Err(CoreError::EmptyBill);
        }

        let subtotal = base_price + approved_charges;
        let platform_fee = round2(subtotal * self.platform_fee_rate);
        let total_amount = round2(
            subtotal + platform_fee + extras.travel_fee + extras.tax - extras.discount,
        );
        if total_amount <= Decimal::ZERO {
            return Err(CoreError::EmptyBill);
        }

        Ok(BookingPricing {
            base_price,
            additional_charges,
            discount: extras.discount,
            travel_fee: extras.travel_fee,
            tax: extras.tax,
            platform_fee,
            total_amount,
            paid_amount: Decimal::ZERO,
            currency: currency.to_string(),
            payment_status: BillingStatus::Pending,
        })
    }
}
