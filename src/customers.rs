//! Customers

use serde::{Deserialize, Serialize};

use crate::ids::CustomerId;

/// Natural person or registered business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerKind {
    /// Individual buyer
    Natural,

    /// Company buying under a legal name
    Business,
}

/// A customer a sale can be attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Customer id
    pub id: CustomerId,

    /// Natural or business
    pub kind: CustomerKind,

    /// Display name, or legal name for businesses
    pub name: String,

    /// National id or tax number
    pub document: String,
}

impl Customer {
    /// Whether invoices should carry the legal name and tax number.
    pub fn is_business(&self) -> bool {
        self.kind == CustomerKind::Business
    }
}
