//! Fixtures
//!
//! YAML-backed stand-ins for the inventory backend, the payment methods catalog and the order
//! store. The fixture keeps its own stock and decrements it when it accepts an order, so it
//! rejects orders the way a real backend does when stock moved after the checkout validated it.

use std::{fs, path::PathBuf};

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    catalog::{CatalogError, CatalogSnapshot, StockLevels},
    fixtures::{catalog::CatalogFixture, payment_methods::PaymentMethodsFixture},
    ids::{ItemId, LocationId, OrderId},
    order::OrderRecord,
    payments::PaymentMethod,
    providers::{ExternalError, InventoryProvider, OrderSink, PaymentMethodsCatalog, SubmitOutcome},
};

pub mod catalog;
pub mod payment_methods;

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid catalog item
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Location not found
    #[error("Location not found: {0}")]
    LocationNotFound(String),
}

/// Fixture
#[derive(Debug)]
pub struct Fixture {
    /// Base path for fixture files
    base_path: PathBuf,

    /// Catalog snapshots by location
    catalogs: FxHashMap<LocationId, CatalogSnapshot>,

    /// Live stock, decremented by accepted orders
    stock: Mutex<FxHashMap<LocationId, StockLevels>>,

    /// Accepted payment methods
    payment_methods: Vec<PaymentMethod>,

    /// Orders accepted so far
    orders: Mutex<Vec<(OrderId, OrderRecord)>>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    /// Create a new empty fixture with default base path
    pub fn new() -> Self {
        Self::with_base_path("./fixtures")
    }

    /// Create a new empty fixture with custom base path
    pub fn with_base_path(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            catalogs: FxHashMap::default(),
            stock: Mutex::new(FxHashMap::default()),
            payment_methods: Vec::new(),
            orders: Mutex::new(Vec::new()),
        }
    }

    /// Load catalogs from a YAML fixture file. Stock starts at each item's listed quantity.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an item is invalid.
    pub fn load_catalog(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let file_path = self.base_path.join("catalog").join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;
        let fixture: CatalogFixture = serde_norway::from_str(&contents)?;

        let stock = self.stock.get_mut();

        for snapshot in fixture.into_snapshots()? {
            stock.insert(snapshot.location().clone(), snapshot.stock_levels());
            self.catalogs.insert(snapshot.location().clone(), snapshot);
        }

        Ok(self)
    }

    /// Load payment methods from a YAML fixture file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_payment_methods(&mut self, name: &str) -> Result<&mut Self, FixtureError> {
        let file_path = self
            .base_path
            .join("payment_methods")
            .join(format!("{name}.yml"));
        let contents = fs::read_to_string(&file_path)?;
        let fixture: PaymentMethodsFixture = serde_norway::from_str(&contents)?;

        self.payment_methods.extend(fixture.payment_methods);

        Ok(self)
    }

    /// Load a complete fixture set by name
    ///
    /// # Errors
    ///
    /// Returns an error if any of the fixture files cannot be loaded.
    pub fn from_set(name: &str) -> Result<Self, FixtureError> {
        let mut fixture = Self::new();

        fixture.load_catalog(name)?.load_payment_methods(name)?;

        Ok(fixture)
    }

    /// Catalog for a location
    ///
    /// # Errors
    ///
    /// Returns an error if the location is not in the fixture.
    pub fn catalog(&self, location: &str) -> Result<&CatalogSnapshot, FixtureError> {
        self.catalogs
            .get(location)
            .ok_or_else(|| FixtureError::LocationNotFound(location.to_string()))
    }

    /// Accepted payment methods
    pub fn payment_methods(&self) -> &[PaymentMethod] {
        &self.payment_methods
    }

    /// Current stock of an item
    pub async fn available(&self, location: &str, item: &str) -> u32 {
        self.stock
            .lock()
            .await
            .get(location)
            .map_or(0, |levels| levels.available(item))
    }

    /// Overwrite the stock of an item, as another till selling it would.
    pub async fn set_stock(&self, location: &LocationId, item: ItemId, quantity: u32) {
        self.stock
            .lock()
            .await
            .entry(location.clone())
            .or_insert_with(|| StockLevels::empty(location.clone()))
            .set(item, quantity);
    }

    /// Orders accepted so far, oldest first
    pub async fn orders(&self) -> Vec<(OrderId, OrderRecord)> {
        self.orders.lock().await.clone()
    }
}

#[async_trait]
impl InventoryProvider for Fixture {
    async fn list_items_for_location(
        &self,
        location: &LocationId,
    ) -> Result<CatalogSnapshot, ExternalError> {
        self.catalogs
            .get(location)
            .cloned()
            .ok_or_else(|| ExternalError::Unavailable {
                service: "inventory",
                reason: format!("unknown location {location}"),
            })
    }

    async fn stock_for_location(
        &self,
        location: &LocationId,
    ) -> Result<StockLevels, ExternalError> {
        Ok(self
            .stock
            .lock()
            .await
            .get(location)
            .cloned()
            .unwrap_or_else(|| StockLevels::empty(location.clone())))
    }
}

#[async_trait]
impl PaymentMethodsCatalog for Fixture {
    async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, ExternalError> {
        Ok(self.payment_methods.clone())
    }
}

#[async_trait]
impl OrderSink for Fixture {
    async fn submit_order(&self, order: OrderRecord) -> Result<SubmitOutcome, ExternalError> {
        let mut stock = self.stock.lock().await;

        let Some(levels) = stock.get_mut(&order.location) else {
            return Ok(SubmitOutcome::Rejected {
                reason: format!("unknown location {}", order.location),
            });
        };

        if let Some(short) = order
            .lines
            .iter()
            .find(|line| line.quantity() > levels.available(line.item().as_str()))
        {
            return Ok(SubmitOutcome::Rejected {
                reason: format!("insufficient stock for {}", short.item()),
            });
        }

        for line in &order.lines {
            let left = levels
                .available(line.item().as_str())
                .saturating_sub(line.quantity());
            levels.set(line.item().clone(), left);
        }

        let mut orders = self.orders.lock().await;
        let order_id = OrderId::new(format!("order-{}", orders.len() + 1));

        orders.push((order_id.clone(), order));

        Ok(SubmitOutcome::Accepted { order_id })
    }
}
