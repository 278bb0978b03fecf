//! Download command implementation

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::info;

use crate::downloader::{
    fetch_metadata, DownloadEngine, DownloadSummary, MetadataOutcome, ProgressEvent, ProgressSink,
    METADATA_FILENAME,
};
use crate::fetcher::create_api_client;
use crate::filter::Filter;
use crate::output::DestinationLayout;
use crate::resolver::{LinkResolver, Resolution};
use crate::shutdown::SharedShutdown;
use crate::{Dataset, Frequency};

use super::CliError;

/// Maximum allowed concurrency; beyond this the file servers throttle anyway
const MAX_CONCURRENCY: usize = 256;

/// Parse and validate a concurrency value
fn parse_concurrency(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;

    if value == 0 {
        return Err("concurrency must be at least 1".to_string());
    }
    if value > MAX_CONCURRENCY {
        return Err(format!(
            "concurrency {value} exceeds maximum of {MAX_CONCURRENCY}"
        ));
    }
    Ok(value)
}

/// Air Quality Data Downloader CLI
#[derive(Parser, Debug)]
#[command(name = "airqdl")]
#[command(about = "Download EEA air quality observation files", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Destination root directory for downloaded files
    #[arg(long, global = true, default_value = "data")]
    pub path: PathBuf,

    /// Re-download files whose destination is already populated
    #[arg(short = 'O', long, global = true, default_value_t = false)]
    pub overwrite: bool,

    /// Number of concurrent file downloads (default: 50, max: 256)
    ///
    /// Observation files are small, so a wide pool keeps the download phase
    /// throughput-bound. Lower this on constrained links.
    #[arg(long, global = true, default_value = "50", value_parser = parse_concurrency)]
    pub concurrency: usize,

    /// Number of concurrent partition listing requests (default: 10)
    #[arg(long, global = true, default_value = "10", value_parser = parse_concurrency)]
    pub resolver_concurrency: usize,

    /// Attempts per network operation, first try included (default: 3)
    #[arg(long, global = true, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_retries: u32,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,

    /// Suppress the progress bar
    #[arg(short = 'q', long, global = true, default_value_t = false)]
    pub quiet: bool,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download historical Airbase observations (2002-2012)
    Historical(DownloadArgs),

    /// Download verified (E1a) observations from 2013 onwards
    Verified(DownloadArgs),

    /// Download unverified up-to-date (E2a) observations
    Unverified(DownloadArgs),

    /// Download only the station metadata sidecar
    Metadata,

    /// List known countries, pollutants or cities
    Catalog(super::CatalogCommand),
}

/// Selection arguments shared by the dataset subcommands
#[derive(Parser, Debug)]
pub struct DownloadArgs {
    /// Restrict to a country code (repeatable; default: all countries)
    #[arg(short = 'c', long = "country")]
    pub countries: Vec<String>,

    /// Restrict to a pollutant notation, e.g. PM10 (repeatable)
    #[arg(short = 'p', long = "pollutant")]
    pub pollutants: Vec<String>,

    /// Restrict to a city (repeatable; mutually exclusive with --country)
    #[arg(short = 'C', long = "city")]
    pub cities: Vec<String>,

    /// Restrict to one aggregation frequency (hourly, daily, variable)
    #[arg(short = 'F', long)]
    pub frequency: Option<Frequency>,

    /// Resolve only: print file count and approximate size, download nothing
    #[arg(long)]
    pub summary: bool,

    /// Also download the station metadata sidecar
    #[arg(short = 'M', long)]
    pub metadata: bool,

    /// Place all files directly in the destination root (no country subdirectories)
    #[arg(long)]
    pub flat: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl DownloadArgs {
    /// Build the validated filter for this selection
    pub fn filter(&self, dataset: Dataset) -> Result<Filter, CliError> {
        let mut builder = Filter::builder(dataset)
            .countries(&self.countries)
            .pollutants(&self.pollutants)
            .cities(&self.cities);
        if let Some(frequency) = self.frequency {
            builder = builder.frequency(frequency);
        }
        Ok(builder.build()?)
    }

    /// Execute the two-phase resolve/download pipeline for one dataset
    pub async fn execute(
        &self,
        dataset: Dataset,
        cli: &Cli,
        shutdown: SharedShutdown,
    ) -> Result<(), CliError> {
        let filter = self.filter(dataset)?;
        let api = create_api_client();

        let layout = if self.flat {
            DestinationLayout::flat()
        } else {
            DestinationLayout::country_subdirs()
        };
        let resolver = LinkResolver::new(api.clone())
            .with_max_concurrency(cli.resolver_concurrency)
            .with_max_attempts(cli.max_retries)
            .with_layout(layout);

        if self.summary {
            return self.execute_summary(&resolver, &filter, cli).await;
        }

        info!(dataset = %dataset, "Resolving selection");
        let resolution = resolver.resolve(&filter).await;

        if cli.output_format == OutputFormat::Human {
            for warning in &resolution.warnings {
                eprintln!("warning: {warning}");
            }
        }

        if self.metadata {
            let outcome = fetch_metadata(&api, &cli.path, cli.overwrite, cli.max_retries).await?;
            if cli.output_format == OutputFormat::Human {
                match outcome {
                    MetadataOutcome::Downloaded { bytes } => {
                        println!("Station metadata: {METADATA_FILENAME} ({bytes} bytes)")
                    }
                    MetadataOutcome::Skipped => {
                        println!("Station metadata: already present, skipped")
                    }
                }
            }
        }

        let mut engine = DownloadEngine::new(api)
            .with_overwrite(cli.overwrite)
            .with_max_concurrency(cli.concurrency)
            .with_max_attempts(cli.max_retries)
            .with_shutdown(shutdown);

        let bar = if cli.quiet || cli.output_format == OutputFormat::Json {
            None
        } else {
            let bar = create_progress_bar(resolution.files.len() as u64, dataset);
            engine = engine.with_progress(Arc::new(ProgressBarSink(bar.clone())));
            Some(bar)
        };

        let summary = engine.run(resolution.files.clone(), cli.path.clone()).await?;

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }

        match cli.output_format {
            OutputFormat::Json => output_json(dataset, &resolution, &summary),
            OutputFormat::Human => output_human(dataset, &summary),
        }

        if summary.failed > 0 || summary.cancelled > 0 {
            return Err(CliError::Incomplete {
                failed: summary.failed,
                cancelled: summary.cancelled,
            });
        }
        Ok(())
    }

    /// Dry-run: report what the selection would download
    async fn execute_summary(
        &self,
        resolver: &LinkResolver,
        filter: &Filter,
        cli: &Cli,
    ) -> Result<(), CliError> {
        let summary = resolver.summarize(filter).await;

        match cli.output_format {
            OutputFormat::Json => {
                let output = json!({
                    "dataset": filter.dataset().to_string(),
                    "files": summary.files,
                    "megabytes": summary.megabytes,
                    "warnings": summary.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
                });
                println!("{output}");
            }
            OutputFormat::Human => {
                for warning in &summary.warnings {
                    eprintln!("warning: {warning}");
                }
                println!(
                    "found {} file(s), ~{} Mb in total",
                    summary.files, summary.megabytes
                );
            }
        }
        Ok(())
    }
}

/// Download the station metadata sidecar on its own
pub async fn execute_metadata(cli: &Cli) -> Result<(), CliError> {
    let api = create_api_client();
    let outcome = fetch_metadata(&api, &cli.path, cli.overwrite, cli.max_retries).await?;

    match cli.output_format {
        OutputFormat::Json => {
            let (downloaded, bytes) = match outcome {
                MetadataOutcome::Downloaded { bytes } => (true, bytes),
                MetadataOutcome::Skipped => (false, 0),
            };
            let output = json!({
                "path": cli.path.join(METADATA_FILENAME).display().to_string(),
                "downloaded": downloaded,
                "bytes": bytes,
            });
            println!("{output}");
        }
        OutputFormat::Human => match outcome {
            MetadataOutcome::Downloaded { bytes } => {
                println!(
                    "Station metadata written to {} ({bytes} bytes)",
                    cli.path.join(METADATA_FILENAME).display()
                )
            }
            MetadataOutcome::Skipped => println!("Station metadata already present, skipped"),
        },
    }
    Ok(())
}

/// Output a run result as one JSON object
fn output_json(dataset: Dataset, resolution: &Resolution, summary: &DownloadSummary) {
    let output = json!({
        "success": summary.is_complete_success(),
        "dataset": dataset.to_string(),
        "resolved": resolution.files.len(),
        "downloaded": summary.downloaded,
        "skipped": summary.skipped,
        "failed": summary.failed,
        "cancelled": summary.cancelled,
        "bytes_written": summary.bytes_written,
        "failures": summary.failures,
        "warnings": resolution.warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
    });
    println!("{output}");
}

/// Output a run result in human-readable form
fn output_human(dataset: Dataset, summary: &DownloadSummary) {
    if summary.is_complete_success() {
        println!("\nDownload of {dataset} data completed successfully!");
    } else {
        println!("\nDownload of {dataset} data finished with problems.");
    }
    println!("Downloaded: {}", summary.downloaded);
    println!("Skipped: {}", summary.skipped);
    if summary.failed > 0 {
        println!("Failed: {}", summary.failed);
    }
    if summary.cancelled > 0 {
        println!("Cancelled: {}", summary.cancelled);
    }
    println!("Bytes written: {}", summary.bytes_written);

    for failure in &summary.failures {
        eprintln!(
            "failed: {} after {} attempt(s): {}",
            failure.dest.display(),
            failure.attempts,
            failure.error
        );
    }
}

/// Forwards terminal outcomes to an indicatif bar
struct ProgressBarSink(ProgressBar);

impl ProgressSink for ProgressBarSink {
    fn on_event(&self, event: &ProgressEvent) {
        self.0.set_position(event.totals.completed());
        self.0
            .set_message(event.outcome.file.dest.display().to_string());
    }
}

/// Create a progress bar sized to the resolved file count
fn create_progress_bar(total_files: u64, dataset: Dataset) -> ProgressBar {
    let pb = ProgressBar::new(total_files);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .expect("hardcoded template is valid")
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {dataset} data"));
    pb
}
