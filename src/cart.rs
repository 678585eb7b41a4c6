//! Cart

use rusty_money::iso::Currency;
use thiserror::Error;

use crate::{
    catalog::CatalogItem,
    customers::Customer,
    ids::{CustomerId, ItemId, LocationId},
    pricing::{self, Amount, PricingError},
};

/// Errors related to cart edits.
#[derive(Debug, Error, PartialEq)]
pub enum CartError {
    /// Requested quantity was below one.
    #[error("quantity must be at least 1, got {0}")]
    InvalidQuantity(u32),

    /// Discount was negative or larger than the subtotal.
    #[error("discount {discount} must be between zero and the subtotal {subtotal}")]
    InvalidDiscount {
        /// Requested discount
        discount: Amount,
        /// Cart subtotal at the time of the check
        subtotal: Amount,
    },

    /// The item has no line in the cart.
    #[error("item {0} is not in the cart")]
    ItemNotInCart(ItemId),

    /// An amount's currency differs from the cart currency (amount currency, cart currency).
    #[error("amount has currency {0}, but cart has currency {1}")]
    CurrencyMismatch(&'static str, &'static str),

    /// The item is sold at another location.
    #[error("item {item} is sold at {found}, not at {expected}")]
    LocationMismatch {
        /// Offending item
        item: ItemId,
        /// Cart location
        expected: LocationId,
        /// Item location
        found: LocationId,
    },

    /// Money arithmetic failure.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// One cart line. Price and tax are copied from the catalog when the item is added.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    item: ItemId,
    name: String,
    quantity: u32,
    unit_price: Amount,
    unit_tax: Amount,
}

impl CartLine {
    /// Item id
    pub fn item(&self) -> &ItemId {
        &self.item
    }

    /// Display name captured at add time
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Quantity, always at least one
    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Unit price captured at add time
    pub fn unit_price(&self) -> &Amount {
        &self.unit_price
    }

    /// Unit tax captured at add time
    pub fn unit_tax(&self) -> &Amount {
        &self.unit_tax
    }

    /// Unit price times quantity.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the total does not fit.
    pub fn line_total(&self) -> Result<Amount, PricingError> {
        pricing::line_total(&self.unit_price, self.quantity)
    }

    /// Unit tax times quantity.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::Overflow`] if the total does not fit.
    pub fn line_tax(&self) -> Result<Amount, PricingError> {
        pricing::line_total(&self.unit_tax, self.quantity)
    }
}

/// Cart for one selling location.
#[derive(Debug, Clone)]
pub struct Cart {
    location: LocationId,
    currency: &'static Currency,
    lines: Vec<CartLine>,
    discount: Option<Amount>,
    customer: Option<CustomerId>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn new(location: LocationId, currency: &'static Currency) -> Self {
        Self {
            location,
            currency,
            lines: Vec::new(),
            discount: None,
            customer: None,
        }
    }

    /// Add `quantity` units of an item.
    ///
    /// Adding an item that already has a line increments its quantity and refreshes the
    /// stored unit price and tax. Stock is not checked here.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError`] if the quantity is zero, the item is priced in another currency
    /// or sold at another location, or the tax cannot be computed.
    pub fn add_item(&mut self, item: &CatalogItem, quantity: u32) -> Result<(), CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity(quantity));
        }

        let item_currency = item.price().currency();

        if item_currency != self.currency {
            return Err(CartError::CurrencyMismatch(
                item_currency.iso_alpha_code,
                self.currency.iso_alpha_code,
            ));
        }

        if item.location() != &self.location {
            return Err(CartError::LocationMismatch {
                item: item.id().clone(),
                expected: self.location.clone(),
                found: item.location().clone(),
            });
        }

        let unit_tax = item.unit_tax()?;

        if let Some(line) = self.lines.iter_mut().find(|line| &line.item == item.id()) {
            line.quantity = line
                .quantity
                .checked_add(quantity)
                .ok_or(PricingError::Overflow("line quantity"))?;
            line.name = item.name().to_string();
            line.unit_price = *item.price();
            line.unit_tax = unit_tax;

            return Ok(());
        }

        self.lines.push(CartLine {
            item: item.id().clone(),
            name: item.name().to_string(),
            quantity,
            unit_price: *item.price(),
            unit_tax,
        });

        Ok(())
    }

    /// Set a line's quantity. A quantity of zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::ItemNotInCart`] if the item has no line.
    pub fn set_quantity(&mut self, item: &ItemId, quantity: u32) -> Result<(), CartError> {
        let idx = self
            .position(item)
            .ok_or_else(|| CartError::ItemNotInCart(item.clone()))?;

        if quantity < 1 {
            self.lines.remove(idx);
        } else if let Some(line) = self.lines.get_mut(idx) {
            line.quantity = quantity;
        }

        Ok(())
    }

    /// Remove a line. Missing items are ignored.
    pub fn remove_item(&mut self, item: &ItemId) {
        self.lines.retain(|line| &line.item != item);
    }

    /// Apply a single discount amount to the subtotal.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidDiscount`] if the amount is negative or exceeds the
    /// current subtotal.
    pub fn set_discount(&mut self, amount: Amount) -> Result<(), CartError> {
        self.check_discount(&amount)?;
        self.discount = Some(amount);

        Ok(())
    }

    /// Drop the discount.
    pub fn clear_discount(&mut self) {
        self.discount = None;
    }

    /// Re-check the stored discount against the current subtotal. Lines may have been
    /// removed since the discount was set.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidDiscount`] if the discount no longer fits.
    pub fn validate_discount(&self) -> Result<(), CartError> {
        match &self.discount {
            Some(discount) => self.check_discount(discount),
            None => Ok(()),
        }
    }

    fn check_discount(&self, amount: &Amount) -> Result<(), CartError> {
        if amount.currency() != self.currency {
            return Err(CartError::CurrencyMismatch(
                amount.currency().iso_alpha_code,
                self.currency.iso_alpha_code,
            ));
        }

        let subtotal = self.subtotal()?;

        if pricing::is_negative(amount) || amount.to_minor_units() > subtotal.to_minor_units() {
            return Err(CartError::InvalidDiscount {
                discount: *amount,
                subtotal,
            });
        }

        Ok(())
    }

    /// Attribute the sale to a customer. Only the id is kept.
    pub fn attach_customer(&mut self, customer: &Customer) {
        self.customer = Some(customer.id.clone());
    }

    /// Remove the customer reference.
    pub fn clear_customer(&mut self) {
        self.customer = None;
    }

    /// Sum of line totals, zero for an empty cart.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] on overflow.
    pub fn subtotal(&self) -> Result<Amount, PricingError> {
        let totals = self
            .lines
            .iter()
            .map(CartLine::line_total)
            .collect::<Result<Vec<_>, _>>()?;

        pricing::sum(&totals, self.currency)
    }

    /// Discount, zero when none is set.
    pub fn discount(&self) -> Amount {
        self.discount.unwrap_or_else(|| pricing::zero(self.currency))
    }

    /// Attached customer id.
    pub fn customer(&self) -> Option<&CustomerId> {
        self.customer.as_ref()
    }

    /// Line for an item.
    pub fn line(&self, item: &ItemId) -> Option<&CartLine> {
        self.lines.iter().find(|line| &line.item == item)
    }

    /// Lines in insertion order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Number of distinct lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Selling location.
    pub fn location(&self) -> &LocationId {
        &self.location
    }

    /// Cart currency.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    fn position(&self, item: &ItemId) -> Option<usize> {
        self.lines.iter().position(|line| &line.item == item)
    }
}
