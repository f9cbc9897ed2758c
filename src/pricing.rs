//! Pricing rules shared by the cart and the checkout.
//!
//! Everything here is pure arithmetic over [`Decimal`]: no database, no I/O.
//! Money is kept at the currency's minor-unit precision (2 decimal places).
//! The precision is applied to the unit price, so every line total is already
//! exact and summing lines never drifts.
//!
//! ```text
//! price, discount ──► effective_unit_price ──► line_total (× quantity)
//!                                                   │
//!                                   Σ lines ──► Totals { total_quantity, total_amount }
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

/// Number of decimal places kept for every monetary amount.
pub const MONEY_SCALE: u32 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PricingError {
    #[error("quantity must be greater than 0, got {0}")]
    InvalidQuantity(i32),

    #[error("discount must be within [0, 100), got {0}")]
    InvalidDiscount(Decimal),

    #[error("price must not be negative, got {0}")]
    InvalidPrice(Decimal),
}

/// Rounds an amount to the minor unit, toward zero.
///
/// Toward zero means a discount can never push a price up to the next cent.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::ToZero)
}

/// Unit price after the percentage discount.
///
/// `discount` is a percentage in `[0, 100)`. Values outside that range are a
/// data-integrity problem caught on write by [`validate_discount`], not here.
pub fn effective_unit_price(price: Decimal, discount: Decimal) -> Decimal {
    if discount > Decimal::ZERO {
        let factor = Decimal::ONE - discount / Decimal::ONE_HUNDRED;
        round_money(price * factor)
    } else {
        round_money(price)
    }
}

/// `unit_price * quantity`, rejecting non-positive quantities.
pub fn line_total(unit_price: Decimal, quantity: i32) -> Result<Decimal, PricingError> {
    if quantity <= 0 {
        return Err(PricingError::InvalidQuantity(quantity));
    }
    Ok(round_money(unit_price) * Decimal::from(quantity))
}

/// Guards product writes so the cached sell price stays meaningful.
pub fn validate_discount(discount: Decimal) -> Result<(), PricingError> {
    if discount < Decimal::ZERO || discount >= Decimal::ONE_HUNDRED {
        return Err(PricingError::InvalidDiscount(discount));
    }
    Ok(())
}

pub fn validate_price(price: Decimal) -> Result<(), PricingError> {
    if price < Decimal::ZERO {
        return Err(PricingError::InvalidPrice(price));
    }
    Ok(())
}

/// One priced line of a cart or an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub unit_price: Decimal,
    pub quantity: i32,
}

impl Line {
    pub fn new(unit_price: Decimal, quantity: i32) -> Self {
        Self {
            unit_price,
            quantity,
        }
    }

    pub fn total(&self) -> Result<Decimal, PricingError> {
        line_total(self.unit_price, self.quantity)
    }
}

/// Aggregate of a collection of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Totals {
    pub total_quantity: i64,
    pub total_amount: Decimal,
}

/// Sums line totals and quantities. Fails on the first invalid line.
pub fn totals<I>(lines: I) -> Result<Totals, PricingError>
where
    I: IntoIterator<Item = Line>,
{
    lines
        .into_iter()
        .try_fold(Totals::default(), |acc, line| {
            let amount = line.total()?;
            Ok(Totals {
                total_quantity: acc.total_quantity + i64::from(line.quantity),
                total_amount: acc.total_amount + amount,
            })
        })
}
