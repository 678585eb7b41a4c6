//! Catalog Fixtures

use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{
    catalog::{CatalogItemPayload, CatalogSnapshot},
    fixtures::FixtureError,
    ids::LocationId,
};

/// Wrapper for catalogs in YAML
#[derive(Debug, Deserialize)]
pub struct CatalogFixture {
    /// Map of location id -> items sold there
    pub locations: FxHashMap<String, Vec<CatalogItemPayload>>,
}

impl CatalogFixture {
    /// Build one snapshot per location.
    ///
    /// # Errors
    ///
    /// Returns a [`FixtureError`] if any item is invalid.
    pub fn into_snapshots(self) -> Result<Vec<CatalogSnapshot>, FixtureError> {
        self.locations
            .into_iter()
            .map(|(location, items)| {
                CatalogSnapshot::from_payloads(LocationId::new(location), items)
                    .map_err(FixtureError::from)
            })
            .collect()
    }
}
