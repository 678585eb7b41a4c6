//! Configuration
//!
//! Engine settings, loadable from YAML:
//!
//! ```yaml
//! currency: CLP
//! tax_treatment: excluded
//! time_zone: America/Santiago
//! ```

use std::{fs, path::Path};

use jiff::tz::TimeZone;
use rusty_money::iso::Currency;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    pricing::{self, PricingError},
    totals::TaxTreatment,
};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the configuration file
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Unsupported currency code
    #[error(transparent)]
    Currency(#[from] PricingError),

    /// Unknown IANA time zone
    #[error("unknown time zone {name}: {source}")]
    TimeZone {
        /// Configured name
        name: String,
        /// Lookup failure
        source: jiff::Error,
    },
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    currency: String,
    tax_treatment: TaxTreatment,
    time_zone: Option<String>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.to_string(),
            tax_treatment: TaxTreatment::default(),
            time_zone: None,
        }
    }
}

/// Currency used when none is configured. Zero minor digits.
pub const DEFAULT_CURRENCY: &str = "CLP";

/// Checkout engine configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// Currency carts and ledgers are kept in
    pub currency: &'static Currency,

    /// Whether tax is charged in the grand total
    pub tax_treatment: TaxTreatment,

    /// Time zone used to decide "today" for warranty dates
    pub time_zone: TimeZone,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            currency: rusty_money::iso::CLP,
            tax_treatment: TaxTreatment::default(),
            time_zone: TimeZone::system(),
        }
    }
}

impl CheckoutConfig {
    /// Parse configuration from a YAML string. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the YAML is malformed, the currency is not supported, or
    /// the time zone is unknown.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_norway::from_str(yaml)?;

        let time_zone = match raw.time_zone {
            Some(name) => {
                TimeZone::get(&name).map_err(|source| ConfigError::TimeZone { name, source })?
            }
            None => TimeZone::system(),
        };

        Ok(Self {
            currency: pricing::find_currency(&raw.currency)?,
            tax_treatment: raw.tax_treatment,
            time_zone,
        })
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rusty_money::iso::{CLP, COP};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() -> TestResult {
        let config = CheckoutConfig::from_yaml_str("{}")?;

        assert_eq!(config.currency, CLP);
        assert_eq!(config.tax_treatment, TaxTreatment::Excluded);

        Ok(())
    }

    #[test]
    fn parses_all_fields() -> TestResult {
        let config = CheckoutConfig::from_yaml_str(
            "currency: COP\ntax_treatment: added\ntime_zone: America/Bogota\n",
        )?;

        assert_eq!(config.currency, COP);
        assert_eq!(config.tax_treatment, TaxTreatment::Added);
        assert_eq!(config.time_zone.iana_name(), Some("America/Bogota"));

        Ok(())
    }

    #[test]
    fn rejects_unknown_currency() {
        let result = CheckoutConfig::from_yaml_str("currency: XYZ\n");

        assert!(matches!(result, Err(ConfigError::Currency(_))));
    }

    #[test]
    fn rejects_unknown_time_zone() {
        let result = CheckoutConfig::from_yaml_str("time_zone: Mars/Olympus\n");

        assert!(matches!(result, Err(ConfigError::TimeZone { .. })));
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = CheckoutConfig::from_yaml_str("curency: CLP\n");

        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn loads_from_file() -> TestResult {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "currency: CLP\ntax_treatment: added")?;

        let config = CheckoutConfig::load(file.path())?;

        assert_eq!(config.tax_treatment, TaxTreatment::Added);

        Ok(())
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = CheckoutConfig::load("/nonexistent/checkout.yml");

        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
