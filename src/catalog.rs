//! Catalog of countries and pollutants known to the downloads service
//!
//! The catalog holds the static part of the dataset vocabulary: country
//! codes and pollutant notations with their numeric vocabulary ids. City
//! names are not static; they are queried from the API at resolution time.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Embedded catalog data, regenerated offline from the API
const CATALOG_JSON: &str = include_str!("catalog.json");

/// Base of the EIONET pollutant vocabulary
const POLLUTANT_VOCABULARY: &str = "http://dd.eionet.europa.eu/vocabulary/aq/pollutant";

/// Global catalog instance (loaded once)
static CATALOG: Lazy<Result<DatasetCatalog, CatalogError>> =
    Lazy::new(|| DatasetCatalog::from_json(CATALOG_JSON));

/// Catalog of known country codes and pollutant notations
#[derive(Debug, Clone)]
pub struct DatasetCatalog {
    countries: Vec<String>,
    pollutants: BTreeMap<String, Vec<u32>>,
}

impl DatasetCatalog {
    /// Load the embedded catalog
    ///
    /// This is a singleton operation - the catalog is loaded once and cached.
    pub fn load() -> Result<&'static Self, &'static CatalogError> {
        CATALOG.as_ref()
    }

    /// Load the embedded catalog, returning an owned copy
    pub fn load_embedded() -> Result<Self, CatalogError> {
        Self::from_json(CATALOG_JSON)
    }

    /// Parse a catalog from JSON
    fn from_json(json: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(json)
            .map_err(|e| CatalogError::ParseError(format!("Failed to parse catalog: {e}")))?;

        let mut countries = raw.countries;
        countries.sort();
        countries.dedup();

        for code in &countries {
            if code.len() != 2 || !code.chars().all(|c| c.is_ascii_uppercase()) {
                return Err(CatalogError::InvalidEntry(format!(
                    "country code must be two uppercase letters, got {code:?}"
                )));
            }
        }

        for (notation, ids) in &raw.pollutants {
            if notation.is_empty() || ids.is_empty() {
                return Err(CatalogError::InvalidEntry(format!(
                    "pollutant {notation:?} has no vocabulary ids"
                )));
            }
        }

        Ok(Self {
            countries,
            pollutants: raw.pollutants,
        })
    }

    /// All known country codes, sorted
    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    /// Check whether a country code is known
    pub fn is_country(&self, code: &str) -> bool {
        self.countries.iter().any(|c| c == code)
    }

    /// All known pollutant notations with their vocabulary ids
    pub fn pollutants(&self) -> &BTreeMap<String, Vec<u32>> {
        &self.pollutants
    }

    /// Vocabulary ids for a pollutant notation
    ///
    /// Some notations map to more than one id.
    pub fn pollutant_ids(&self, notation: &str) -> Option<&[u32]> {
        self.pollutants.get(notation).map(|ids| ids.as_slice())
    }

    /// Case-insensitive substring search over pollutant notations
    pub fn search_pollutant(&self, query: &str) -> Vec<&str> {
        let query = query.to_lowercase();
        self.pollutants
            .keys()
            .filter(|notation| notation.to_lowercase().contains(&query))
            .map(|notation| notation.as_str())
            .collect()
    }

    /// Expand pollutant notations into sorted, deduplicated vocabulary URLs
    ///
    /// Unknown notations contribute nothing; filters are validated against
    /// the catalog before they reach this point.
    pub fn pollutant_vocabulary_urls<I, S>(&self, notations: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut urls: Vec<String> = notations
            .into_iter()
            .filter_map(|notation| self.pollutant_ids(notation.as_ref()))
            .flatten()
            .map(|id| format!("{POLLUTANT_VOCABULARY}/{id}"))
            .collect();
        urls.sort();
        urls.dedup();
        urls
    }
}

/// Raw catalog structure for deserialization
#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[allow(dead_code)]
    schema_version: String,
    #[allow(dead_code)]
    last_updated: String,
    countries: Vec<String>,
    pollutants: BTreeMap<String, Vec<u32>>,
}

/// Errors that can occur when working with the catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Failed to parse catalog JSON
    #[error("catalog parse error: {0}")]
    ParseError(String),

    /// Catalog entry failed a sanity check
    #[error("invalid catalog entry: {0}")]
    InvalidEntry(String),
}
