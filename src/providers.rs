//! External collaborators
//!
//! The engine reaches inventory, payment methods and the order store only through these traits.
//! Implementations own transport details; the engine only sees typed results.

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::{
    catalog::{CatalogSnapshot, StockLevels},
    ids::{LocationId, OrderId},
    order::OrderRecord,
    payments::PaymentMethod,
};

/// Transient failure talking to a collaborator. Callers may retry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExternalError {
    /// The collaborator could not be reached or answered with a server error.
    #[error("{service} unavailable: {reason}")]
    Unavailable {
        /// Collaborator name
        service: &'static str,
        /// Transport or server message
        reason: String,
    },

    /// The collaborator did not answer in time.
    #[error("{service} timed out")]
    Timeout {
        /// Collaborator name
        service: &'static str,
    },

    /// The collaborator answered with data that could not be understood.
    #[error("{service} sent an invalid response: {reason}")]
    InvalidResponse {
        /// Collaborator name
        service: &'static str,
        /// Decoding message
        reason: String,
    },
}

/// Answer from the order sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The order was stored.
    Accepted {
        /// Id assigned by the sink
        order_id: OrderId,
    },

    /// The sink refused the order (e.g. its authoritative stock check failed).
    Rejected {
        /// Reason given by the sink
        reason: String,
    },
}

/// Catalog and live stock for selling locations.
#[automock]
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Items sellable at a location.
    async fn list_items_for_location(
        &self,
        location: &LocationId,
    ) -> Result<CatalogSnapshot, ExternalError>;

    /// Current stock at a location.
    async fn stock_for_location(&self, location: &LocationId)
    -> Result<StockLevels, ExternalError>;
}

/// Known payment methods.
#[automock]
#[async_trait]
pub trait PaymentMethodsCatalog: Send + Sync {
    /// All payment methods the business accepts.
    async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, ExternalError>;
}

/// System of record for confirmed orders.
#[automock]
#[async_trait]
pub trait OrderSink: Send + Sync {
    /// Persist an order.
    async fn submit_order(&self, order: OrderRecord) -> Result<SubmitOutcome, ExternalError>;
}
