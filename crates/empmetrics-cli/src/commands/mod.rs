//! CLI command implementations.

pub mod inspect;
pub mod run;

use std::time::Duration;

use chrono::{DateTime, Utc};
use empmetrics_core::table::Table;
use serde::Serialize;

/// Output format flag shared by the commands.
pub const FORMAT_TEXT: &str = "text";

/// NDJSON output format.
pub const FORMAT_JSON: &str = "json";

/// Name and inferred type of one column.
#[derive(Debug, Serialize)]
pub struct ColumnSummary {
    /// Column name.
    pub name: String,
    /// Inferred type name.
    #[serde(rename = "type")]
    pub column_type: &'static str,
}

/// Column summaries of `table`, in column order.
#[must_use]
pub fn column_summaries(table: &Table) -> Vec<ColumnSummary> {
    table
        .column_types()
        .into_iter()
        .map(|(name, ty)| ColumnSummary {
            name: name.to_string(),
            column_type: ty.name(),
        })
        .collect()
}

/// NDJSON event types for observability.
#[derive(Debug, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A stage has started.
    StageStart {
        /// ISO 8601 timestamp.
        timestamp: DateTime<Utc>,
        /// Stage name.
        stage: &'static str,
    },
    /// A stage has completed successfully.
    StageComplete {
        /// ISO 8601 timestamp.
        timestamp: DateTime<Utc>,
        /// Stage name.
        stage: &'static str,
        /// Duration in milliseconds.
        duration_ms: u64,
        /// Rows in the stage output.
        rows: usize,
        /// Columns of the stage output with inferred types.
        columns: Vec<ColumnSummary>,
    },
    /// A stage has failed.
    StageError {
        /// ISO 8601 timestamp.
        timestamp: DateTime<Utc>,
        /// Stage name.
        stage: &'static str,
        /// Duration in milliseconds until failure.
        duration_ms: u64,
        /// Error message.
        error: String,
    },
    /// The entire pipeline has completed.
    PipelineComplete {
        /// ISO 8601 timestamp.
        timestamp: DateTime<Utc>,
        /// Organization the run resolved to.
        organization: String,
        /// Total duration in milliseconds.
        total_duration_ms: u64,
        /// Number of stages completed.
        stages_completed: usize,
        /// Rows in the joined table.
        rows: usize,
        /// Whether this was a dry run.
        dry_run: bool,
        /// File written, absent for a dry run.
        output: Option<String>,
    },
}

impl PipelineEvent {
    /// Emits this event as NDJSON to stdout.
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{json}");
        }
    }
}

/// Milliseconds in `duration`, saturating.
#[must_use]
pub fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
