//! CLI command for listing catalog contents

use clap::Args;
use serde_json::json;

use crate::catalog::DatasetCatalog;
use crate::fetcher::create_api_client;

use super::download::OutputFormat;
use super::CliError;

/// Catalog subcommand
#[derive(Debug, Args)]
pub struct CatalogCommand {
    #[command(subcommand)]
    action: CatalogAction,
}

/// Catalog actions
#[derive(Debug, clap::Subcommand)]
enum CatalogAction {
    /// List known country codes
    Countries,

    /// List known pollutant notations and their vocabulary ids
    Pollutants {
        /// Case-insensitive substring to filter notations
        #[arg(long)]
        search: Option<String>,
    },

    /// List cities known to the downloads API, queried live
    Cities {
        /// Restrict to country codes (default: all countries)
        countries: Vec<String>,
    },
}

impl CatalogCommand {
    /// Execute the catalog command
    pub async fn execute(&self, format: OutputFormat) -> Result<(), CliError> {
        match &self.action {
            CatalogAction::Countries => self.list_countries(format),
            CatalogAction::Pollutants { search } => {
                self.list_pollutants(search.as_deref(), format)
            }
            CatalogAction::Cities { countries } => self.list_cities(countries, format).await,
        }
    }

    fn list_countries(&self, format: OutputFormat) -> Result<(), CliError> {
        let catalog = DatasetCatalog::load().map_err(|e| CliError::InvalidArgument(e.to_string()))?;

        match format {
            OutputFormat::Json => {
                println!("{}", json!(catalog.countries()));
            }
            OutputFormat::Human => {
                println!("{} known countries:", catalog.countries().len());
                for code in catalog.countries() {
                    println!("  {code}");
                }
            }
        }
        Ok(())
    }

    fn list_pollutants(&self, search: Option<&str>, format: OutputFormat) -> Result<(), CliError> {
        let catalog = DatasetCatalog::load().map_err(|e| CliError::InvalidArgument(e.to_string()))?;

        let notations: Vec<&str> = match search {
            Some(query) => catalog.search_pollutant(query),
            None => catalog.pollutants().keys().map(|n| n.as_str()).collect(),
        };

        match format {
            OutputFormat::Json => {
                let entries: Vec<_> = notations
                    .iter()
                    .map(|notation| {
                        json!({
                            "notation": notation,
                            "ids": catalog.pollutant_ids(notation),
                        })
                    })
                    .collect();
                println!("{}", json!(entries));
            }
            OutputFormat::Human => {
                println!("{} pollutant notation(s):", notations.len());
                for notation in notations {
                    let ids = catalog.pollutant_ids(notation).unwrap_or(&[]);
                    println!("  {notation} (vocabulary ids: {ids:?})");
                }
            }
        }
        Ok(())
    }

    async fn list_cities(&self, countries: &[String], format: OutputFormat) -> Result<(), CliError> {
        let catalog = DatasetCatalog::load().map_err(|e| CliError::InvalidArgument(e.to_string()))?;

        let scope: Vec<String> = if countries.is_empty() {
            catalog.countries().to_vec()
        } else {
            countries.iter().map(|c| c.to_uppercase()).collect()
        };
        for code in &scope {
            if !catalog.is_country(code) {
                return Err(CliError::InvalidArgument(format!(
                    "unknown country code: {code}"
                )));
            }
        }

        let api = create_api_client();
        let cities = api.cities(&scope).await?;

        match format {
            OutputFormat::Json => {
                let entries: Vec<_> = cities
                    .iter()
                    .map(|entry| {
                        json!({
                            "country": entry.country_code,
                            "city": entry.city_name,
                        })
                    })
                    .collect();
                println!("{}", json!(entries));
            }
            OutputFormat::Human => {
                println!("{} city(ies):", cities.len());
                for entry in cities {
                    println!("  {} {}", entry.country_code, entry.city_name);
                }
            }
        }
        Ok(())
    }
}
