//! Invoice totals calculator
//!
//! Pure functions deriving subtotal, discount, tax and total from line items.
//! Nothing here is cached or stored: callers recompute on every edit, which is
//! linear in the number of items.

use crate::{
    entities::{invoice::DiscountType, line_item},
    errors::{Error, Result},
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

const ONE_HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Largest amount a `Decimal(16, 4)` money column holds
pub const MAX_MONEY: Decimal = Decimal::from_parts(0x6FC0_FFFF, 0x0023_86F2, 0, false, 4); // 999_999_999_999.9999

/// Rounds a money amount to cents, midpoint away from zero.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Quantity and rate of one line item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineAmount {
    /// Number of units
    pub quantity: i32,
    /// Price per unit
    pub rate: Decimal,
}

impl LineAmount {
    /// Builds a line amount
    #[must_use]
    pub const fn new(quantity: i32, rate: Decimal) -> Self {
        Self { quantity, rate }
    }

    /// `quantity x rate`, `None` on overflow
    #[must_use]
    pub fn amount(&self) -> Option<Decimal> {
        Decimal::from(self.quantity).checked_mul(self.rate)
    }
}

impl From<&line_item::Model> for LineAmount {
    fn from(item: &line_item::Model) -> Self {
        Self::new(item.quantity, item.rate)
    }
}

/// Discount applied to the subtotal before tax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    /// Percentage of the subtotal, 0..=100
    Percentage(Decimal),
    /// Absolute amount
    Fixed(Decimal),
}

impl Discount {
    /// No discount at all
    #[must_use]
    pub const fn none() -> Self {
        Self::Fixed(Decimal::ZERO)
    }

    /// Rebuilds a discount from its stored columns
    #[must_use]
    pub const fn from_parts(kind: DiscountType, value: Decimal) -> Self {
        match kind {
            DiscountType::Percentage => Self::Percentage(value),
            DiscountType::Fixed => Self::Fixed(value),
        }
    }

    /// Splits a discount into its stored columns
    #[must_use]
    pub const fn into_parts(self) -> (DiscountType, Decimal) {
        match self {
            Self::Percentage(value) => (DiscountType::Percentage, value),
            Self::Fixed(value) => (DiscountType::Fixed, value),
        }
    }

    /// Discount amount for `subtotal`, clamped to `[0, subtotal]`
    pub fn amount_for(&self, subtotal: Decimal) -> Result<Decimal> {
        let raw = match self {
            Self::Percentage(percent) => percent_of(subtotal, *percent, "discount")?,
            Self::Fixed(value) => *value,
        };
        Ok(round_money(
            raw.clamp(Decimal::ZERO, subtotal.max(Decimal::ZERO)),
        ))
    }
}

/// Everything derived from an invoice's line items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvoiceTotals {
    /// Sum of all line amounts
    pub subtotal: Decimal,
    /// Discount actually applied
    pub discount_amount: Decimal,
    /// `subtotal - discount_amount`
    pub taxable_amount: Decimal,
    /// `taxable_amount x tax_rate / 100`
    pub tax: Decimal,
    /// `taxable_amount + tax`
    pub total: Decimal,
}

fn percent_of(amount: Decimal, percent: Decimal, field: &'static str) -> Result<Decimal> {
    amount
        .checked_mul(percent)
        .and_then(|scaled| scaled.checked_div(ONE_HUNDRED))
        .ok_or(Error::AmountOverflow { field })
}

/// Sum of `quantity x rate` over all items
pub fn subtotal<'a, I>(items: I) -> Result<Decimal>
where
    I: IntoIterator<Item = &'a LineAmount>,
{
    let sum = items.into_iter().try_fold(Decimal::ZERO, |acc, item| {
        item.amount()
            .and_then(|amount| acc.checked_add(amount))
            .ok_or(Error::AmountOverflow { field: "subtotal" })
    })?;
    Ok(round_money(sum))
}

/// Derives subtotal, discount, taxable amount, tax and total.
///
/// Each monetary component is rounded to cents on its own, so
/// `total == subtotal - discount_amount + tax` holds exactly.
///
/// # Errors
/// Returns [`Error::AmountOverflow`] instead of panicking when a figure
/// leaves the `Decimal` range.
pub fn calculate_totals(
    items: &[LineAmount],
    discount: Discount,
    tax_rate: Decimal,
) -> Result<InvoiceTotals> {
    let subtotal = subtotal(items)?;
    let discount_amount = discount.amount_for(subtotal)?;
    let taxable_amount = subtotal - discount_amount;
    let tax = round_money(percent_of(taxable_amount, tax_rate, "tax")?);
    let total = taxable_amount
        .checked_add(tax)
        .ok_or(Error::AmountOverflow { field: "total" })?;

    Ok(InvoiceTotals {
        subtotal,
        discount_amount,
        taxable_amount,
        tax,
        total,
    })
}

/// Rejects quantities below one, negative rates and line amounts a money
/// column cannot hold.
pub fn validate_line_item(quantity: i32, rate: Decimal) -> Result<()> {
    if quantity < 1 {
        return Err(Error::InvalidQuantity { quantity });
    }
    if rate < Decimal::ZERO || rate > MAX_MONEY {
        return Err(Error::InvalidAmount {
            field: "rate",
            value: rate,
        });
    }
    let amount = LineAmount::new(quantity, rate)
        .amount()
        .unwrap_or(Decimal::MAX);
    if amount > MAX_MONEY {
        return Err(Error::InvalidAmount {
            field: "line amount",
            value: amount,
        });
    }
    Ok(())
}

/// Rejects negative discounts and percentages above 100.
pub fn validate_discount(discount: Discount) -> Result<()> {
    match discount {
        Discount::Percentage(value) if value < Decimal::ZERO || value > ONE_HUNDRED => {
            Err(Error::InvalidAmount {
                field: "discount percentage",
                value,
            })
        }
        Discount::Fixed(value) if value < Decimal::ZERO || value > MAX_MONEY => {
            Err(Error::InvalidAmount {
                field: "discount",
                value,
            })
        }
        _ => Ok(()),
    }
}

/// Rejects a fixed discount larger than the current subtotal.
pub fn validate_discount_against(discount: Discount, subtotal: Decimal) -> Result<()> {
    validate_discount(discount)?;
    if let Discount::Fixed(value) = discount {
        if value > subtotal {
            return Err(Error::DiscountExceedsSubtotal {
                discount: value,
                subtotal,
            });
        }
    }
    Ok(())
}

/// Rejects tax rates outside `0..=100` percent.
pub fn validate_tax_rate(tax_rate: Decimal) -> Result<()> {
    if tax_rate < Decimal::ZERO || tax_rate > ONE_HUNDRED {
        return Err(Error::InvalidAmount {
            field: "tax rate",
            value: tax_rate,
        });
    }
    Ok(())
}
