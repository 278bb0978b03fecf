//! Main entry point for the airqdl CLI

use airquality_data_downloader::cli::{download, Cli, Commands};
use airquality_data_downloader::shutdown::{self, ShutdownCoordinator};
use airquality_data_downloader::{metrics, Dataset};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber with optional JSON formatting
fn init_tracing() {
    // Check if JSON output is requested via environment variable
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("airquality_data_downloader=info"));

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Bind the Prometheus exporter when METRICS_ADDR is set
async fn init_metrics_if_configured() {
    let Ok(addr) = std::env::var("METRICS_ADDR") else {
        return;
    };
    match addr.parse() {
        Ok(addr) => {
            if let Err(e) = metrics::init_metrics(addr).await {
                error!("Failed to start metrics exporter on {addr}: {e}");
            }
        }
        Err(e) => error!("Invalid METRICS_ADDR {addr:?}: {e}"),
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();

    init_metrics_if_configured().await;

    // Install global shutdown coordinator and Ctrl+C handler
    let shutdown = ShutdownCoordinator::shared();
    shutdown::set_global_shutdown(shutdown.clone());
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received - letting in-flight downloads finish...");
                shutdown.request_shutdown();
            }
        }
    });

    let result = match &cli.command {
        Commands::Historical(args) => args.execute(Dataset::Historical, &cli, shutdown).await,
        Commands::Verified(args) => args.execute(Dataset::Verified, &cli, shutdown).await,
        Commands::Unverified(args) => args.execute(Dataset::Unverified, &cli, shutdown).await,
        Commands::Metadata => download::execute_metadata(&cli).await,
        Commands::Catalog(catalog) => catalog.execute(cli.output_format).await,
    };

    if let Err(e) = result.map_err(|e| anyhow::anyhow!(e)) {
        error!("Command failed: {}", e);
        std::process::exit(1);
    }
}
