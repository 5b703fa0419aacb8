//! Run command: extract, join and persist.
//!
//! This module provides `empmetrics run`. It loads the configuration, applies
//! command-line overrides, opens the store read-only and drives the core
//! pipeline:
//!
//! 1. **Extract**: clicks, patients accessed, after-hours access, department,
//!    termination indicator
//! 2. **Join**: join of the five tables on `employee_id`, keeping the
//!    employees of the termination indicator table
//! 3. **Persist**: write the joined table as Parquet (skipped with
//!    `--dry-run`)
//!
//! Progress goes to stderr as text, or to stdout as NDJSON events with
//! `--format json`.

use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use empmetrics_core::config::EmpMetricsConfig;
use empmetrics_core::pipeline::{Pipeline, PipelineObserver, PipelineReport, Stage};
use empmetrics_core::resolver::SqlConfigurationResolver;
use empmetrics_core::source::SqliteDataSource;
use empmetrics_core::table::Table;
use tracing::debug;

use super::{FORMAT_JSON, FORMAT_TEXT, PipelineEvent, column_summaries, duration_ms};

/// Arguments for the `run` command.
///
/// Every option overrides the matching configuration value.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// SQLite store to read from.
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Parquet file to write.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Case-insensitive substring of the organization name.
    #[arg(long)]
    pub organization: Option<String>,

    /// First day of the search range (YYYY-MM-DD).
    #[arg(long)]
    pub start_date: Option<String>,

    /// Last day of the search range, inclusive (YYYY-MM-DD).
    #[arg(long)]
    pub end_date: Option<String>,

    /// Start of working hours (HH:MM).
    #[arg(long)]
    pub start_time: Option<String>,

    /// End of working hours (HH:MM).
    #[arg(long)]
    pub end_time: Option<String>,

    /// Termination cutoff date (YYYY-MM-DD).
    #[arg(long)]
    pub term_date: Option<String>,

    /// Organization setting naming the hire-date field.
    #[arg(long)]
    pub hire_setting: Option<String>,

    /// Name of the termination-date field.
    #[arg(long)]
    pub term_field: Option<String>,

    /// Rows shown in each table preview.
    #[arg(long)]
    pub preview_rows: Option<usize>,

    /// Dry run mode - extract and join without writing the output file.
    #[arg(long, default_value = "false")]
    pub dry_run: bool,

    /// Output format (text or json for NDJSON events).
    #[arg(long, default_value = "text", value_parser = [FORMAT_TEXT, FORMAT_JSON])]
    pub format: String,
}

impl RunArgs {
    /// Applies the command-line overrides to `config`.
    fn apply(&self, config: &mut EmpMetricsConfig) {
        let ext = &mut config.extraction;
        let overrides = [
            (&mut ext.organization, &self.organization),
            (&mut ext.search_start_date, &self.start_date),
            (&mut ext.search_end_date, &self.end_date),
            (&mut ext.start_time, &self.start_time),
            (&mut ext.end_time, &self.end_time),
            (&mut ext.term_search_date, &self.term_date),
            (&mut ext.hire_setting, &self.hire_setting),
            (&mut ext.term_field_name, &self.term_field),
        ];
        for (slot, value) in overrides {
            if let Some(value) = value {
                slot.clone_from(value);
            }
        }

        if let Some(path) = &self.database {
            config.database.path.clone_from(path);
        }
        if let Some(path) = &self.output {
            config.output.path.clone_from(path);
        }
        if let Some(rows) = self.preview_rows {
            config.output.preview_rows = rows;
        }
    }
}

/// Reports pipeline progress as text on stderr or NDJSON on stdout.
struct ProgressReporter {
    json: bool,
    preview_rows: usize,
}

impl PipelineObserver for ProgressReporter {
    fn on_stage_start(&mut self, stage: Stage) {
        if self.json {
            PipelineEvent::StageStart {
                timestamp: Utc::now(),
                stage: stage.name(),
            }
            .emit();
        } else {
            eprintln!("Starting stage: {}", stage.name());
        }
    }

    fn on_stage_complete(&mut self, stage: Stage, table: &Table, elapsed: Duration) {
        if self.json {
            PipelineEvent::StageComplete {
                timestamp: Utc::now(),
                stage: stage.name(),
                duration_ms: duration_ms(elapsed),
                rows: table.num_rows(),
                columns: column_summaries(table),
            }
            .emit();
        } else {
            eprintln!(
                "Completed stage: {} ({} rows, {}ms)",
                stage.name(),
                table.num_rows(),
                duration_ms(elapsed)
            );
            if stage != Stage::Persist {
                eprintln!("{}", table.preview(self.preview_rows));
            }
        }
    }

    fn on_stage_error(
        &mut self,
        stage: Stage,
        elapsed: Duration,
        error: &(dyn std::error::Error + 'static),
    ) {
        if self.json {
            PipelineEvent::StageError {
                timestamp: Utc::now(),
                stage: stage.name(),
                duration_ms: duration_ms(elapsed),
                error: error.to_string(),
            }
            .emit();
        } else {
            eprintln!("Error in stage {}: {error}", stage.name());
        }
    }
}

/// Runs the `run` command.
pub fn run(mut config: EmpMetricsConfig, args: &RunArgs) -> Result<()> {
    args.apply(&mut config);
    debug!(?config, dry_run = args.dry_run, "effective configuration");
    let settings = config.validate().context("invalid run parameters")?;
    let json = args.format == FORMAT_JSON;

    if !json {
        if args.dry_run {
            eprintln!("Metrics Extraction (dry run)");
        } else {
            eprintln!("Metrics Extraction");
        }
        eprintln!("  Database: {}", config.database.path.display());
        eprintln!("  Organization filter: {}", settings.organization);
        eprintln!(
            "  Search range: {} to {}",
            settings.range.start(),
            settings.range.end()
        );
        eprintln!(
            "  Working hours: {} to {}",
            settings.window.start(),
            settings.window.end()
        );
        eprintln!("  Termination cutoff: {}", settings.cutoff);
        eprintln!();
    }

    let source = SqliteDataSource::open(&config.database.path).with_context(|| {
        format!(
            "failed to open database {}",
            config.database.path.display()
        )
    })?;
    let resolver = SqlConfigurationResolver::new(&source)
        .with_hire_setting(config.extraction.hire_setting.as_str())
        .with_term_field_name(config.extraction.term_field_name.as_str());

    let output = (!args.dry_run).then_some(config.output.path.as_path());
    let started = Instant::now();
    let report = Pipeline::new(&source, &resolver)
        .with_observer(ProgressReporter {
            json,
            preview_rows: config.output.preview_rows,
        })
        .run(&settings, output)
        .context("extraction pipeline failed")?;
    let total = started.elapsed();

    if json {
        PipelineEvent::PipelineComplete {
            timestamp: Utc::now(),
            organization: report.organization.name.clone(),
            total_duration_ms: duration_ms(total),
            stages_completed: report.stages.len(),
            rows: report.table.num_rows(),
            dry_run: args.dry_run,
            output: report.output.as_ref().map(|p| p.display().to_string()),
        }
        .emit();
    } else {
        print_summary(&report, total)?;
    }

    Ok(())
}

/// Prints a human-readable summary of the run.
fn print_summary(report: &PipelineReport, total: Duration) -> Result<()> {
    let mut stderr = std::io::stderr();

    writeln!(stderr)?;
    match &report.output {
        Some(path) => writeln!(stderr, "Pipeline completed, wrote {}", path.display())?,
        None => writeln!(stderr, "Pipeline completed (dry run - no files written)")?,
    }
    writeln!(stderr)?;

    writeln!(stderr, "Summary:")?;
    writeln!(stderr, "  Organization: {}", report.organization)?;
    writeln!(stderr, "  Employees: {}", report.table.num_rows())?;
    writeln!(stderr, "  Total Duration: {}ms", duration_ms(total))?;
    for stage in &report.stages {
        writeln!(
            stderr,
            "  {:<22} {:>6} rows {:>6}ms",
            stage.stage.name(),
            stage.rows,
            duration_ms(stage.elapsed)
        )?;
    }

    Ok(())
}
