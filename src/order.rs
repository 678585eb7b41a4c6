//! Order records
//!
//! What a confirmed checkout hands to the order sink, and the JSON shape it travels in.

use jiff::{Timestamp, civil::Date};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    cart::CartLine,
    ids::{CustomerId, ItemId, LocationId, OperatorId, PaymentMethodId},
    payments::PaymentEntry,
    pricing::Amount,
    totals::OrderTotals,
};

/// Immutable record of a confirmed checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    /// Checkout session that produced the order
    pub session: Uuid,

    /// Selling location
    pub location: LocationId,

    /// Employee who ran the checkout
    pub operator: OperatorId,

    /// Customer the sale is attributed to
    pub customer: Option<CustomerId>,

    /// Cart lines at the time totals were frozen
    pub lines: Vec<CartLine>,

    /// Frozen totals
    pub totals: OrderTotals,

    /// Payment allocations
    pub payments: Vec<PaymentEntry>,

    /// Warranty expiration, when a warranty applies
    pub warranty_expires: Option<Date>,

    /// When the order was confirmed
    pub created_at: Timestamp,
}

impl OrderRecord {
    /// Amount charged.
    pub fn total(&self) -> Amount {
        self.totals.grand_total
    }

    /// Serializable form of the record, amounts in minor units.
    pub fn to_payload(&self) -> OrderPayload {
        OrderPayload {
            session: self.session,
            location: self.location.clone(),
            operator: self.operator.clone(),
            customer: self.customer.clone(),
            currency: self.totals.grand_total.currency().iso_alpha_code.to_string(),
            lines: self
                .lines
                .iter()
                .map(|line| OrderLinePayload {
                    item: line.item().clone(),
                    name: line.name().to_string(),
                    quantity: line.quantity(),
                    unit_price: line.unit_price().to_minor_units(),
                    unit_tax: line.unit_tax().to_minor_units(),
                })
                .collect(),
            subtotal: self.totals.subtotal.to_minor_units(),
            tax_total: self.totals.tax_total.to_minor_units(),
            discount: self.totals.discount.to_minor_units(),
            total: self.totals.grand_total.to_minor_units(),
            payments: self
                .payments
                .iter()
                .map(|entry| PaymentPayload {
                    method: entry.method.clone(),
                    amount: entry.amount.to_minor_units(),
                })
                .collect(),
            warranty_expires: self.warranty_expires,
            created_at: self.created_at,
        }
    }
}

/// Wire form of an [`OrderRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPayload {
    /// Checkout session id
    pub session: Uuid,
    /// Selling location
    pub location: LocationId,
    /// Employee id
    pub operator: OperatorId,
    /// Customer id
    pub customer: Option<CustomerId>,
    /// ISO currency code for every amount below
    pub currency: String,
    /// Lines
    pub lines: Vec<OrderLinePayload>,
    /// Subtotal in minor units
    pub subtotal: i64,
    /// Tax total in minor units
    pub tax_total: i64,
    /// Discount in minor units
    pub discount: i64,
    /// Grand total in minor units
    pub total: i64,
    /// Payments
    pub payments: Vec<PaymentPayload>,
    /// Warranty expiration date
    pub warranty_expires: Option<Date>,
    /// Confirmation time
    pub created_at: Timestamp,
}

/// Wire form of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLinePayload {
    /// Item id
    pub item: ItemId,
    /// Display name
    pub name: String,
    /// Units sold
    pub quantity: u32,
    /// Unit price in minor units
    pub unit_price: i64,
    /// Unit tax in minor units
    pub unit_tax: i64,
}

/// Wire form of a payment entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPayload {
    /// Payment method id
    pub method: PaymentMethodId,
    /// Amount in minor units
    pub amount: i64,
}
