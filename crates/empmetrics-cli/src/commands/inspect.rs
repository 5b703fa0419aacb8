//! Inspect command: preview a written output file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use empmetrics_core::persist;
use serde::Serialize;

use super::{ColumnSummary, FORMAT_JSON, FORMAT_TEXT, column_summaries};

/// Arguments for the `inspect` command.
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Parquet file written by `empmetrics run`.
    pub file: PathBuf,

    /// Number of rows to show.
    #[arg(short = 'n', long, default_value = "5")]
    pub rows: usize,

    /// Output format (text or json).
    #[arg(long, default_value = "text", value_parser = [FORMAT_TEXT, FORMAT_JSON])]
    pub format: String,
}

#[derive(Debug, Serialize)]
struct InspectSummary {
    file: String,
    rows: usize,
    columns: Vec<ColumnSummary>,
}

/// Runs the `inspect` command.
pub fn run(args: &InspectArgs) -> Result<()> {
    let table = persist::load(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    if args.format == FORMAT_JSON {
        let summary = InspectSummary {
            file: args.file.display().to_string(),
            rows: table.num_rows(),
            columns: column_summaries(&table),
        };
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("{}", args.file.display());
        println!("{}", table.preview(args.rows));
    }
    Ok(())
}
