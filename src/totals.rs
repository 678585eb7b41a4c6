//! Order totals
//!
//! Pure derivation of subtotal, tax, discount and grand total from a cart.

use serde::Deserialize;
use thiserror::Error;

use crate::{
    cart::{Cart, CartLine},
    pricing::{self, Amount, PricingError},
};

/// Errors that can occur while calculating totals.
#[derive(Debug, Error, PartialEq)]
pub enum TotalsError {
    /// The discount exceeds the subtotal.
    #[error("discount {discount} exceeds subtotal {subtotal}")]
    DiscountExceedsSubtotal {
        /// Discount on the cart
        discount: Amount,
        /// Cart subtotal
        subtotal: Amount,
    },

    /// Money arithmetic failure.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// Whether tax is charged on top of the discounted subtotal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxTreatment {
    /// Tax is tracked and displayed but not charged in the grand total.
    #[default]
    Excluded,

    /// Tax is added to the grand total.
    Added,
}

/// Totals derived from a cart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderTotals {
    /// Sum of unit price times quantity
    pub subtotal: Amount,

    /// Sum of unit tax times quantity
    pub tax_total: Amount,

    /// Discount applied to the subtotal
    pub discount: Amount,

    /// Amount to be paid
    pub grand_total: Amount,
}

impl OrderTotals {
    /// Calculate totals for a cart.
    ///
    /// # Errors
    ///
    /// Returns a [`TotalsError`] on overflow, or if the discount exceeds the subtotal.
    pub fn calculate(cart: &Cart, treatment: TaxTreatment) -> Result<Self, TotalsError> {
        let currency = cart.currency();

        let taxes = cart
            .lines()
            .iter()
            .map(CartLine::line_tax)
            .collect::<Result<Vec<_>, _>>()?;

        let subtotal = cart.subtotal()?;
        let tax_total = pricing::sum(&taxes, currency)?;
        let discount = cart.discount();

        if discount.to_minor_units() > subtotal.to_minor_units() {
            return Err(TotalsError::DiscountExceedsSubtotal { discount, subtotal });
        }

        let discounted = subtotal.sub(discount).map_err(PricingError::from)?;

        let grand_total = match treatment {
            TaxTreatment::Excluded => discounted,
            TaxTreatment::Added => discounted.add(tax_total).map_err(PricingError::from)?,
        };

        Ok(Self {
            subtotal,
            tax_total,
            discount,
            grand_total,
        })
    }
}
