//! Stock validation
//!
//! Advisory check of cart quantities against live stock. Nothing is reserved: the order sink
//! performs the authoritative decrement and may still reject.

use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    cart::Cart,
    catalog::StockLevels,
    ids::{ItemId, LocationId},
};

/// Shortfalls found by [`validate`].
pub type Shortfalls = SmallVec<[Shortfall; 2]>;

/// Errors raised by the stock validator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StockError {
    /// Stock levels were read for another location than the cart's.
    #[error("stock levels are for {found}, cart sells from {expected}")]
    LocationMismatch {
        /// Cart location
        expected: LocationId,
        /// Stock snapshot location
        found: LocationId,
    },
}

/// Gap between requested and available units for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    /// Item short on stock
    pub item_id: ItemId,

    /// Units in the cart
    pub requested: u32,

    /// Units on hand
    pub available: u32,
}

/// Compare every cart line against live stock. An empty result means the cart can proceed.
///
/// # Errors
///
/// Returns [`StockError::LocationMismatch`] if `stock` was read for another location.
pub fn validate(cart: &Cart, stock: &StockLevels) -> Result<Shortfalls, StockError> {
    if stock.location() != cart.location() {
        return Err(StockError::LocationMismatch {
            expected: cart.location().clone(),
            found: stock.location().clone(),
        });
    }

    Ok(cart
        .lines()
        .iter()
        .filter_map(|line| {
            let available = stock.available(line.item().as_str());

            (line.quantity() > available).then(|| Shortfall {
                item_id: line.item().clone(),
                requested: line.quantity(),
                available,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::CLP};
    use testresult::TestResult;

    use crate::catalog::{CatalogItem, TaxSpec};

    use super::*;

    fn cart_with(lines: &[(&str, u32)]) -> TestResult<Cart> {
        let mut cart = Cart::new(LocationId::from("main"), CLP);

        for (id, quantity) in lines {
            let item = CatalogItem::new(
                ItemId::from(*id),
                *id,
                Money::from_minor(1_000, CLP),
                TaxSpec::Exempt,
                0,
                LocationId::from("main"),
            )?;

            cart.add_item(&item, *quantity)?;
        }

        Ok(cart)
    }

    #[test]
    fn shortfall_reports_requested_and_available() -> TestResult {
        let cart = cart_with(&[("A", 10)])?;
        let stock = StockLevels::new(LocationId::from("main"), [(ItemId::from("A"), 3)]);

        let shortfalls = validate(&cart, &stock)?;

        assert_eq!(
            shortfalls.as_slice(),
            [Shortfall {
                item_id: ItemId::from("A"),
                requested: 10,
                available: 3,
            }]
        );

        Ok(())
    }

    #[test]
    fn exact_stock_passes() -> TestResult {
        let cart = cart_with(&[("A", 3), ("B", 1)])?;
        let stock = StockLevels::new(
            LocationId::from("main"),
            [(ItemId::from("A"), 3), (ItemId::from("B"), 9)],
        );

        assert!(validate(&cart, &stock)?.is_empty());

        Ok(())
    }

    #[test]
    fn unknown_item_has_no_stock() -> TestResult {
        let cart = cart_with(&[("A", 1)])?;
        let stock = StockLevels::empty(LocationId::from("main"));

        let shortfalls = validate(&cart, &stock)?;

        assert_eq!(shortfalls.first().map(|s| s.available), Some(0));

        Ok(())
    }

    #[test]
    fn stock_for_other_location_is_rejected() -> TestResult {
        let cart = cart_with(&[("A", 1)])?;
        let stock = StockLevels::empty(LocationId::from("branch"));

        assert!(matches!(
            validate(&cart, &stock),
            Err(StockError::LocationMismatch { .. })
        ));

        Ok(())
    }
}
