//! Payment Method Fixtures

use serde::Deserialize;

use crate::payments::PaymentMethod;

/// Wrapper for payment methods in YAML
#[derive(Debug, Deserialize)]
pub struct PaymentMethodsFixture {
    /// Accepted methods, in display order
    pub payment_methods: Vec<PaymentMethod>,
}
