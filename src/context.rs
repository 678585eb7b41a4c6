//! Checkout Context
//!
//! Everything a session needs from the outside world, passed in explicitly.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    clock::{Clock, SystemClock},
    config::CheckoutConfig,
    ids::OperatorId,
    providers::{InventoryProvider, OrderSink, PaymentMethodsCatalog},
};

/// Dashboard role of the person running the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access to the dashboard
    Administrator,

    /// Sales and service staff
    Employee,
}

/// The person running the checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    /// Employee id
    pub id: OperatorId,

    /// Role, for the UI to decide what to show
    pub role: Role,
}

/// Collaborators, clock and configuration shared by checkout sessions.
#[derive(Clone)]
pub struct CheckoutContext {
    /// Catalog and stock
    pub inventory: Arc<dyn InventoryProvider>,

    /// Payment methods
    pub payment_methods: Arc<dyn PaymentMethodsCatalog>,

    /// Order store
    pub orders: Arc<dyn OrderSink>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Engine settings
    pub config: CheckoutConfig,
}

impl CheckoutContext {
    /// Build a context with the wall clock in the configured time zone.
    pub fn new(
        inventory: Arc<dyn InventoryProvider>,
        payment_methods: Arc<dyn PaymentMethodsCatalog>,
        orders: Arc<dyn OrderSink>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            inventory,
            payment_methods,
            orders,
            clock: Arc::new(SystemClock::new(config.time_zone.clone())),
            config,
        }
    }

    /// Replace the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl fmt::Debug for CheckoutContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutContext")
            .field("clock", &self.clock)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
