//! panoscout - street-level coverage freshness checker
//!
//! Finds newer panoramas at or near stored locations and recommends how to
//! retag them. JSON results go to stdout (or `--output`), logs to stderr.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use panoscout_common::config::{to_toml_string, TomlConfig};
use panoscout_common::PanoId;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use panoscout_engine::locations::{check_locations, read_locations, reconcile_locations};
use panoscout_engine::services::pano_graph;
use panoscout_engine::CoverageResolver;

/// Command-line arguments for panoscout
#[derive(Parser, Debug)]
#[command(name = "panoscout")]
#[command(about = "Detect stale street-level coverage in location datasets")]
#[command(version)]
struct Args {
    /// Configuration file (TOML); falls back to PANOSCOUT_CONFIG, then the user config dir
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write JSON output to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve newest coverage for one panorama
    Resolve {
        pano_id: String,
        /// Capture year the location is tagged with
        year: String,
        /// Capture month the location is tagged with
        month: String,
        /// Search radius in meters (defaults to the configured radius)
        #[arg(long)]
        radius: Option<f64>,
    },
    /// Check every location in an exported JSON file for newer coverage
    Check { locations: PathBuf },
    /// Re-check locations tagged as updated
    Reconcile { locations: PathBuf },
    /// List every capture at the same location, oldest first
    History { pano_id: String },
    /// Show current, spatial and history links of a panorama
    Neighbors { pano_id: String },
    /// Print the effective configuration as TOML
    PrintConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing; RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting panoscout {}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Resolve {
            pano_id,
            year,
            month,
            radius,
        } => {
            let fetcher = panoscout_engine::build_fetcher(&config, config.provider.request_timeout())
                .context("Failed to create metadata client")?;
            let resolver = CoverageResolver::new(fetcher, config.resolver.clone());
            let radius = radius.unwrap_or(config.resolver.radius_meters);
            let verdict = resolver
                .resolve_within(&PanoId::from(pano_id), &year, &month, radius)
                .await
                .context("Coverage resolution failed")?;
            write_json(args.output.as_deref(), &verdict)?;
        }
        Command::Check { locations } => {
            let locations = read_locations(&locations)
                .with_context(|| format!("Failed to read locations from {}", locations.display()))?;
            info!("Checking {} locations", locations.len());
            let batch = panoscout_engine::build_batch_resolver(&config).context("Failed to create metadata client")?;
            let report = check_locations(&batch, &locations).await;
            write_json(args.output.as_deref(), &report)?;
        }
        Command::Reconcile { locations } => {
            let locations = read_locations(&locations)
                .with_context(|| format!("Failed to read locations from {}", locations.display()))?;
            let batch = panoscout_engine::build_batch_resolver(&config).context("Failed to create metadata client")?;
            let report = reconcile_locations(&batch, &locations).await;
            write_json(args.output.as_deref(), &report)?;
        }
        Command::History { pano_id } => {
            let fetcher = panoscout_engine::build_fetcher(&config, config.provider.request_timeout())
                .context("Failed to create metadata client")?;
            let panos = pano_graph::all_panos(&fetcher, &PanoId::from(pano_id))
                .await
                .context("Metadata lookup failed")?;
            write_json(args.output.as_deref(), &panos)?;
        }
        Command::Neighbors { pano_id } => {
            let fetcher = panoscout_engine::build_fetcher(&config, config.provider.request_timeout())
                .context("Failed to create metadata client")?;
            let adjacent = pano_graph::adjacent_panos(&fetcher, &PanoId::from(pano_id))
                .await
                .context("Metadata lookup failed")?;
            write_json(args.output.as_deref(), &adjacent)?;
        }
        Command::PrintConfig => {
            print!("{}", to_toml_string(&config)?);
        }
    }

    Ok(())
}

/// Pretty-print JSON to the output file or stdout
fn write_json<T: Serialize>(output: Option<&Path>, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
