//! empmetrics - employee activity metrics extraction
//!
//! Reads per-employee activity metrics from a SQLite store, joins them and
//! writes one Parquet file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use empmetrics_core::config::EmpMetricsConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// Configuration file read when `--config` is not given, if present.
const DEFAULT_CONFIG_FILE: &str = "empmetrics.toml";

/// empmetrics - employee activity metrics extraction
#[derive(Parser, Debug)]
#[command(name = "empmetrics")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (default: ./empmetrics.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract the metrics, join them and write the output file
    Run(commands::run::RunArgs),

    /// Preview a previously written output file
    Inspect(commands::inspect::InspectArgs),
}

/// Loads the configuration file, falling back to defaults when no file was
/// named and the default one is absent.
fn load_config(path: Option<&Path>) -> Result<EmpMetricsConfig> {
    match path {
        Some(path) => EmpMetricsConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.exists() {
                EmpMetricsConfig::from_file(default)
                    .with_context(|| format!("failed to load config from {DEFAULT_CONFIG_FILE}"))
            } else {
                Ok(EmpMetricsConfig::default())
            }
        },
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for NDJSON events
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::Run(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::run::run(config, &args)
        },
        Commands::Inspect(args) => commands::inspect::run(&args),
    }
}
