//! Catalog
//!
//! Read-only snapshot of what a selling location can sell, plus the live stock levels the
//! stock validator checks a cart against.

use decimal_percentage::Percentage;
use rustc_hash::FxHashMap;
use rusty_money::Money;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    ids::{ItemId, LocationId},
    pricing::{self, Amount, PricingError},
};

/// Marker type for [`LocationId`].
#[derive(Debug)]
pub enum Location {}

/// Errors raised while building catalog data.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Item has a negative unit price.
    #[error("item {0} has a negative price")]
    NegativePrice(ItemId),

    /// Item has a negative fixed tax amount.
    #[error("item {0} has a negative tax amount")]
    NegativeTax(ItemId),

    /// Item tax amount is in a different currency than its price.
    #[error("item {0} has tax and price in different currencies")]
    CurrencyMismatch(ItemId),

    /// Item payload carried both a tax rate and a tax amount.
    #[error("item {0} has both a tax rate and a tax amount")]
    AmbiguousTax(ItemId),

    /// Item belongs to another location than the snapshot.
    #[error("item {item} belongs to location {found}, expected {expected}")]
    LocationMismatch {
        /// Offending item
        item: ItemId,
        /// Snapshot location
        expected: LocationId,
        /// Item location
        found: LocationId,
    },

    /// Item id appears twice in one snapshot.
    #[error("item {0} appears more than once")]
    DuplicateItem(ItemId),

    /// Money parsing or arithmetic failure.
    #[error(transparent)]
    Pricing(#[from] PricingError),
}

/// How tax is expressed for a catalog item.
#[derive(Debug, Clone, Copy)]
pub enum TaxSpec {
    /// No tax applies.
    Exempt,

    /// Tax is a rate applied to the unit price (e.g. 19% IVA).
    Rate(Percentage),

    /// Tax is a fixed amount per unit.
    PerUnit(Amount),
}

/// A sellable item at one location.
#[derive(Debug, Clone)]
pub struct CatalogItem {
    id: ItemId,
    name: String,
    price: Amount,
    tax: TaxSpec,
    stock: u32,
    location: LocationId,
}

impl CatalogItem {
    /// Create a catalog item.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the price or tax amount is negative, or if the tax amount
    /// currency differs from the price currency.
    pub fn new(
        id: ItemId,
        name: impl Into<String>,
        price: Amount,
        tax: TaxSpec,
        stock: u32,
        location: LocationId,
    ) -> Result<Self, CatalogError> {
        if pricing::is_negative(&price) {
            return Err(CatalogError::NegativePrice(id));
        }

        if let TaxSpec::PerUnit(amount) = &tax {
            if pricing::is_negative(amount) {
                return Err(CatalogError::NegativeTax(id));
            }

            if amount.currency() != price.currency() {
                return Err(CatalogError::CurrencyMismatch(id));
            }
        }

        Ok(Self {
            id,
            name: name.into(),
            price,
            tax,
            stock,
            location,
        })
    }

    /// Item id
    pub fn id(&self) -> &ItemId {
        &self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit sell price
    pub fn price(&self) -> &Amount {
        &self.price
    }

    /// Tax specification
    pub fn tax(&self) -> &TaxSpec {
        &self.tax
    }

    /// Stock quantity at the time the snapshot was taken
    pub fn stock(&self) -> u32 {
        self.stock
    }

    /// Owning location
    pub fn location(&self) -> &LocationId {
        &self.location
    }

    /// Tax owed for one unit, rounded half-up to the minor unit.
    ///
    /// # Errors
    ///
    /// Returns a [`PricingError`] if a rate cannot be applied to the price.
    pub fn unit_tax(&self) -> Result<Amount, PricingError> {
        match &self.tax {
            TaxSpec::Exempt => Ok(pricing::zero(self.price.currency())),
            TaxSpec::Rate(rate) => pricing::percent_of(rate, &self.price),
            TaxSpec::PerUnit(amount) => Ok(*amount),
        }
    }
}

/// Catalog item as returned by an inventory backend.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogItemPayload {
    /// Item id
    pub id: String,

    /// Display name
    pub name: String,

    /// Unit price in minor units
    pub price: i64,

    /// ISO currency code
    pub currency: String,

    /// Tax rate, e.g. `"19%"` or `"0.19"`
    #[serde(default)]
    pub tax_rate: Option<String>,

    /// Fixed tax per unit in minor units
    #[serde(default)]
    pub tax_amount: Option<i64>,

    /// Stock on hand
    #[serde(default)]
    pub stock: u32,
}

impl CatalogItemPayload {
    /// Convert the payload into a catalog item owned by `location`.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the currency or tax rate cannot be parsed, both tax
    /// forms are present, or the resulting item is invalid.
    pub fn into_item(self, location: LocationId) -> Result<CatalogItem, CatalogError> {
        let id = ItemId::new(self.id);
        let currency = pricing::find_currency(&self.currency)?;

        let tax = match (self.tax_rate, self.tax_amount) {
            (Some(_), Some(_)) => return Err(CatalogError::AmbiguousTax(id)),
            (Some(rate), None) => TaxSpec::Rate(pricing::parse_percentage(&rate)?),
            (None, Some(minor)) => TaxSpec::PerUnit(Money::from_minor(minor, currency)),
            (None, None) => TaxSpec::Exempt,
        };

        CatalogItem::new(
            id,
            self.name,
            Money::from_minor(self.price, currency),
            tax,
            self.stock,
            location,
        )
    }
}

/// Immutable view of the items sellable at one location.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    location: LocationId,
    items: Vec<CatalogItem>,
    index: FxHashMap<ItemId, usize>,
}

impl CatalogSnapshot {
    /// Build a snapshot for `location`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::LocationMismatch`] if an item belongs elsewhere, or
    /// [`CatalogError::DuplicateItem`] if an id repeats.
    pub fn new(
        location: LocationId,
        items: impl IntoIterator<Item = CatalogItem>,
    ) -> Result<Self, CatalogError> {
        let mut snapshot = Self {
            location,
            items: Vec::new(),
            index: FxHashMap::default(),
        };

        for item in items {
            if item.location != snapshot.location {
                return Err(CatalogError::LocationMismatch {
                    item: item.id,
                    expected: snapshot.location,
                    found: item.location,
                });
            }

            if snapshot.index.contains_key(&item.id) {
                return Err(CatalogError::DuplicateItem(item.id));
            }

            snapshot.index.insert(item.id.clone(), snapshot.items.len());
            snapshot.items.push(item);
        }

        Ok(snapshot)
    }

    /// Build a snapshot from backend payloads.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if any payload is invalid.
    pub fn from_payloads(
        location: LocationId,
        payloads: impl IntoIterator<Item = CatalogItemPayload>,
    ) -> Result<Self, CatalogError> {
        let items = payloads
            .into_iter()
            .map(|payload| payload.into_item(location.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(location, items)
    }

    /// Location the snapshot belongs to.
    pub fn location(&self) -> &LocationId {
        &self.location
    }

    /// Look up an item by id.
    pub fn get(&self, id: &str) -> Option<&CatalogItem> {
        self.index.get(id).and_then(|idx| self.items.get(*idx))
    }

    /// Iterate over items in backend order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogItem> {
        self.items.iter()
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the snapshot has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stock levels as recorded when the snapshot was taken.
    pub fn stock_levels(&self) -> StockLevels {
        StockLevels::new(
            self.location.clone(),
            self.items.iter().map(|item| (item.id.clone(), item.stock)),
        )
    }
}

/// Stock level as returned by an inventory backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StockPayload {
    /// Item id
    pub id: String,

    /// Units on hand
    pub quantity: u32,
}

/// Live stock quantities for one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevels {
    location: LocationId,
    levels: FxHashMap<ItemId, u32>,
}

impl StockLevels {
    /// Create stock levels from `(item, quantity)` pairs.
    pub fn new(location: LocationId, levels: impl IntoIterator<Item = (ItemId, u32)>) -> Self {
        Self {
            location,
            levels: levels.into_iter().collect(),
        }
    }

    /// Stock levels from backend payloads. A repeated id keeps its last quantity.
    pub fn from_payloads(
        location: LocationId,
        payloads: impl IntoIterator<Item = StockPayload>,
    ) -> Self {
        Self::new(
            location,
            payloads
                .into_iter()
                .map(|payload| (ItemId::new(payload.id), payload.quantity)),
        )
    }

    /// No stock for anything at `location`.
    pub fn empty(location: LocationId) -> Self {
        Self {
            location,
            levels: FxHashMap::default(),
        }
    }

    /// Location the levels were read for.
    pub fn location(&self) -> &LocationId {
        &self.location
    }

    /// Units available for an item; unknown items have none.
    pub fn available(&self, item: &str) -> u32 {
        self.levels.get(item).copied().unwrap_or(0)
    }

    /// Overwrite the level for an item.
    pub fn set(&mut self, item: ItemId, quantity: u32) {
        self.levels.insert(item, quantity);
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{CLP, USD};
    use testresult::TestResult;

    use super::*;

    fn item(id: &str, price: i64, location: &str) -> Result<CatalogItem, CatalogError> {
        CatalogItem::new(
            ItemId::from(id),
            id,
            Money::from_minor(price, CLP),
            TaxSpec::Exempt,
            5,
            LocationId::from(location),
        )
    }

    #[test]
    fn negative_price_is_rejected() {
        let result = item("A", -1, "main");

        assert!(matches!(result, Err(CatalogError::NegativePrice(id)) if id.as_str() == "A"));
    }

    #[test]
    fn tax_amount_currency_must_match_price() {
        let result = CatalogItem::new(
            ItemId::from("A"),
            "A",
            Money::from_minor(100, CLP),
            TaxSpec::PerUnit(Money::from_minor(10, USD)),
            1,
            LocationId::from("main"),
        );

        assert!(matches!(result, Err(CatalogError::CurrencyMismatch(_))));
    }

    #[test]
    fn unit_tax_for_each_spec() -> TestResult {
        let price = Money::from_minor(15_000, CLP);
        let location = LocationId::from("main");

        let exempt = CatalogItem::new("A".into(), "A", price, TaxSpec::Exempt, 1, location.clone())?;
        let rated = CatalogItem::new(
            "B".into(),
            "B",
            price,
            TaxSpec::Rate(pricing::parse_percentage("19%")?),
            1,
            location.clone(),
        )?;
        let fixed = CatalogItem::new(
            "C".into(),
            "C",
            price,
            TaxSpec::PerUnit(Money::from_minor(500, CLP)),
            1,
            location,
        )?;

        assert_eq!(exempt.unit_tax()?, Money::from_minor(0, CLP));
        assert_eq!(rated.unit_tax()?, Money::from_minor(2_850, CLP));
        assert_eq!(fixed.unit_tax()?, Money::from_minor(500, CLP));

        Ok(())
    }

    #[test]
    fn snapshot_lookup_and_stock_levels() -> TestResult {
        let snapshot = CatalogSnapshot::new(
            LocationId::from("main"),
            [item("A", 100, "main")?, item("B", 200, "main")?],
        )?;

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("B").map(CatalogItem::name), Some("B"));
        assert!(snapshot.get("Z").is_none());
        assert_eq!(snapshot.stock_levels().available("A"), 5);

        Ok(())
    }

    #[test]
    fn snapshot_rejects_foreign_and_duplicate_items() -> TestResult {
        let foreign = CatalogSnapshot::new(LocationId::from("main"), [item("A", 100, "other")?]);
        let duplicate = CatalogSnapshot::new(
            LocationId::from("main"),
            [item("A", 100, "main")?, item("A", 100, "main")?],
        );

        assert!(matches!(foreign, Err(CatalogError::LocationMismatch { .. })));
        assert!(matches!(duplicate, Err(CatalogError::DuplicateItem(_))));

        Ok(())
    }

    #[test]
    fn payloads_convert_into_items() -> TestResult {
        let payloads: Vec<CatalogItemPayload> = serde_norway::from_str(
            r#"
- id: funda
  name: Funda silicona
  price: 15000
  currency: CLP
  tax_rate: "19%"
  stock: 4
- id: cable
  name: Cable USB-C
  price: 5000
  currency: CLP
"#,
        )?;

        let snapshot = CatalogSnapshot::from_payloads(LocationId::from("main"), payloads)?;

        let funda = snapshot.get("funda").ok_or("missing funda")?;
        assert_eq!(funda.unit_tax()?, Money::from_minor(2_850, CLP));
        assert_eq!(funda.stock(), 4);
        assert!(matches!(
            snapshot.get("cable").map(CatalogItem::tax),
            Some(TaxSpec::Exempt)
        ));

        Ok(())
    }

    #[test]
    fn payload_with_both_tax_forms_is_ambiguous() {
        let payload = CatalogItemPayload {
            id: "A".into(),
            name: "A".into(),
            price: 100,
            currency: "CLP".into(),
            tax_rate: Some("19%".into()),
            tax_amount: Some(19),
            stock: 0,
        };

        let result = payload.into_item(LocationId::from("main"));

        assert!(matches!(result, Err(CatalogError::AmbiguousTax(_))));
    }

    #[test]
    fn stock_payloads_build_levels() -> TestResult {
        let payloads: Vec<StockPayload> = serde_norway::from_str(
            r"
- id: funda
  quantity: 4
- id: cable
  quantity: 0
",
        )?;

        let levels = StockLevels::from_payloads(LocationId::from("main"), payloads);

        assert_eq!(levels.available("funda"), 4);
        assert_eq!(levels.available("cable"), 0);
        assert_eq!(levels.location().as_str(), "main");

        Ok(())
    }

    #[test]
    fn missing_stock_entry_reads_as_zero() {
        let mut levels = StockLevels::new(LocationId::from("main"), [(ItemId::from("A"), 3)]);
        levels.set(ItemId::from("B"), 7);

        assert_eq!(levels.available("A"), 3);
        assert_eq!(levels.available("B"), 7);
        assert_eq!(levels.available("C"), 0);
    }
}
