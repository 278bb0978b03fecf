//! Validated download selection
//!
//! A [`Filter`] names the observations to download: one dataset kind plus
//! optional country, pollutant, city, and frequency restrictions. Filters
//! are validated against the dataset catalog at construction, so the
//! resolver never sees an unknown country code or pollutant notation.

use crate::catalog::DatasetCatalog;
use crate::{Dataset, Frequency};

/// Validated, immutable download selection
///
/// Country and pollutant sets are stored sorted and deduplicated; an empty
/// set means "no restriction". City and country restrictions are mutually
/// exclusive.
///
/// # Examples
///
/// ```
/// use airquality_data_downloader::{Dataset, Filter, Frequency};
///
/// let filter = Filter::builder(Dataset::Verified)
///     .countries(["NL", "de"])
///     .pollutants(["PM10"])
///     .frequency(Frequency::Hourly)
///     .build()
///     .unwrap();
///
/// assert_eq!(filter.countries(), ["DE", "NL"]);
/// assert_eq!(filter.pollutants(), ["PM10"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    dataset: Dataset,
    countries: Vec<String>,
    pollutants: Vec<String>,
    cities: Vec<String>,
    frequency: Option<Frequency>,
}

impl Filter {
    /// Start building a filter for the given dataset
    pub fn builder(dataset: Dataset) -> FilterBuilder {
        FilterBuilder {
            dataset,
            countries: Vec::new(),
            pollutants: Vec::new(),
            cities: Vec::new(),
            frequency: None,
        }
    }

    /// The dataset kind
    pub fn dataset(&self) -> Dataset {
        self.dataset
    }

    /// Selected country codes, sorted (empty = all countries)
    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    /// Selected pollutant notations, sorted (empty = all pollutants)
    pub fn pollutants(&self) -> &[String] {
        &self.pollutants
    }

    /// Selected city names, sorted (empty = select by country instead)
    pub fn cities(&self) -> &[String] {
        &self.cities
    }

    /// Selected aggregation frequency (`None` = any)
    pub fn frequency(&self) -> Option<Frequency> {
        self.frequency
    }
}

/// Builder for [`Filter`]
///
/// Selection methods never fail; all validation happens in
/// [`FilterBuilder::build`].
#[derive(Debug, Clone)]
pub struct FilterBuilder {
    dataset: Dataset,
    countries: Vec<String>,
    pollutants: Vec<String>,
    cities: Vec<String>,
    frequency: Option<Frequency>,
}

impl FilterBuilder {
    /// Restrict to the given country codes
    ///
    /// Codes are case-insensitive and normalized to uppercase.
    pub fn countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.countries
            .extend(countries.into_iter().map(|c| c.as_ref().to_uppercase()));
        self
    }

    /// Restrict to the given pollutant notations
    ///
    /// Notations are matched exactly against the catalog (`Pb`, not `PB`).
    pub fn pollutants<I, S>(mut self, pollutants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.pollutants
            .extend(pollutants.into_iter().map(|p| p.as_ref().to_string()));
        self
    }

    /// Restrict to the given city names
    ///
    /// City names are matched exactly against the API's city table during
    /// resolution; an unknown city becomes a resolution warning.
    pub fn cities<I, S>(mut self, cities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.cities
            .extend(cities.into_iter().map(|c| c.as_ref().to_string()));
        self
    }

    /// Restrict to one aggregation frequency
    pub fn frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    /// Validate the selection against the catalog and build the filter
    ///
    /// # Errors
    ///
    /// Returns an error if a country code or pollutant notation is not in
    /// the catalog, or if both cities and countries are restricted.
    pub fn build(self) -> Result<Filter, ValidationError> {
        let catalog = DatasetCatalog::load()
            .map_err(|e| ValidationError::Catalog(e.to_string()))?;

        let mut countries = self.countries;
        countries.sort();
        countries.dedup();

        let mut pollutants = self.pollutants;
        pollutants.sort();
        pollutants.dedup();

        let mut cities = self.cities;
        cities.sort();
        cities.dedup();

        if !cities.is_empty() && !countries.is_empty() {
            return Err(ValidationError::CitiesAndCountries);
        }

        for code in &countries {
            if !catalog.is_country(code) {
                return Err(ValidationError::UnknownCountry(code.clone()));
            }
        }

        for notation in &pollutants {
            if catalog.pollutant_ids(notation).is_none() {
                return Err(ValidationError::UnknownPollutant(notation.clone()));
            }
        }

        Ok(Filter {
            dataset: self.dataset,
            countries,
            pollutants,
            cities,
            frequency: self.frequency,
        })
    }
}

/// Errors rejected at filter construction
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Country code not present in the catalog
    #[error("unknown country code: {0}")]
    UnknownCountry(String),

    /// Pollutant notation not present in the catalog
    #[error("unknown pollutant notation: {0}")]
    UnknownPollutant(String),

    /// City and country restrictions are mutually exclusive
    #[error("select either cities or countries, not both")]
    CitiesAndCountries,

    /// The embedded catalog failed to load
    #[error("catalog unavailable: {0}")]
    Catalog(String),
}
