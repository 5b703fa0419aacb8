//! Run orchestration.
//!
//! A run resolves the organization, runs the five extractors in join order,
//! joins their tables on `employee_id` and, unless no output path is
//! given, writes the result. Stages run sequentially on one connection. The
//! first failure aborts the run before anything is written.
//!
//! Progress is reported to a [`PipelineObserver`]; the CLI renders it as text
//! or NDJSON.

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{info, warn};

use crate::extract::{
    self, DateRange, EMPLOYEE_ID, ExtractError, Metric, TerminationParams, TimeWindow,
};
use crate::persist::{self, PersistError};
use crate::resolver::{ConfigurationResolver, OrganizationRecord, ResolveError};
use crate::source::DataSource;
use crate::table::{Table, TableError, join_all};

/// Validated parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSettings {
    /// Case-insensitive substring of the organization name.
    pub organization: String,
    /// Days searched by the activity metrics.
    pub range: DateRange,
    /// Working hours; accesses outside count as after-hours.
    pub window: TimeWindow,
    /// Employee info recorded after this day feeds the termination indicator.
    pub cutoff: NaiveDate,
}

/// Pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// One metric extractor.
    Extract(Metric),
    /// Join of the extracted tables.
    Join,
    /// Writing the joined table.
    Persist,
}

impl Stage {
    /// Get the stage name for logging and events.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Extract(metric) => metric.name(),
            Self::Join => "join",
            Self::Persist => "persist",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives progress notifications during [`Pipeline::run`].
///
/// All methods default to doing nothing.
pub trait PipelineObserver {
    /// A stage is about to run.
    fn on_stage_start(&mut self, _stage: Stage) {}

    /// A stage finished. `table` is its output; for [`Stage::Persist`] it is
    /// the table that was written.
    fn on_stage_complete(&mut self, _stage: Stage, _table: &Table, _elapsed: Duration) {}

    /// A stage failed and the run is about to abort.
    fn on_stage_error(
        &mut self,
        _stage: Stage,
        _elapsed: Duration,
        _error: &(dyn std::error::Error + 'static),
    ) {
    }
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

impl<T: PipelineObserver + ?Sized> PipelineObserver for &mut T {
    fn on_stage_start(&mut self, stage: Stage) {
        (**self).on_stage_start(stage);
    }

    fn on_stage_complete(&mut self, stage: Stage, table: &Table, elapsed: Duration) {
        (**self).on_stage_complete(stage, table, elapsed);
    }

    fn on_stage_error(
        &mut self,
        stage: Stage,
        elapsed: Duration,
        error: &(dyn std::error::Error + 'static),
    ) {
        (**self).on_stage_error(stage, elapsed, error);
    }
}

/// Row count and duration of a completed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    /// Stage that ran.
    pub stage: Stage,
    /// Rows in the stage's output table.
    pub rows: usize,
    /// Wall-clock duration.
    pub elapsed: Duration,
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Organization the run was resolved against.
    pub organization: OrganizationRecord,
    /// Completed stages in execution order.
    pub stages: Vec<StageReport>,
    /// The joined table.
    pub table: Table,
    /// File written, `None` for a dry run.
    pub output: Option<PathBuf>,
}

/// Errors that abort a run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// The organization lookup failed.
    #[error("organization lookup failed: {0}")]
    Resolve(#[from] ResolveError),

    /// An extractor failed.
    #[error("stage {stage} failed: {source}")]
    Extract {
        /// Failed stage.
        stage: Stage,
        /// Underlying error.
        #[source]
        source: ExtractError,
    },

    /// The join failed.
    #[error("join failed: {0}")]
    Join(#[source] TableError),

    /// Writing the output failed.
    #[error("persist failed: {0}")]
    Persist(#[source] PersistError),
}

impl PipelineError {
    /// Stage that failed, if the failure happened inside one.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Resolve(_) => None,
            Self::Extract { stage, .. } => Some(*stage),
            Self::Join(_) => Some(Stage::Join),
            Self::Persist(_) => Some(Stage::Persist),
        }
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Sequential extraction pipeline over one data source.
pub struct Pipeline<'a> {
    source: &'a dyn DataSource,
    resolver: &'a dyn ConfigurationResolver,
    observer: Box<dyn PipelineObserver + 'a>,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline reading from `source` and resolving reference ids
    /// through `resolver`.
    #[must_use]
    pub fn new(source: &'a dyn DataSource, resolver: &'a dyn ConfigurationResolver) -> Self {
        Self {
            source,
            resolver,
            observer: Box::new(NoopObserver),
        }
    }

    /// Sets the progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: impl PipelineObserver + 'a) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Runs every stage. With `output` set to `None` the joined table is
    /// returned without being written.
    ///
    /// # Errors
    ///
    /// Returns the first failure. Nothing is written if any stage before
    /// [`Stage::Persist`] fails.
    pub fn run(
        &mut self,
        settings: &ExtractionSettings,
        output: Option<&Path>,
    ) -> Result<PipelineReport, PipelineError> {
        let organization = self.resolver.organization(&settings.organization)?;
        info!(
            org_id = organization.id,
            org_name = %organization.name,
            "organization resolved"
        );
        let termination = TerminationParams::new(settings.cutoff, organization.clone());

        let mut stages = Vec::with_capacity(Metric::ALL.len() + 2);
        let mut tables = Vec::with_capacity(Metric::ALL.len());
        let (source, resolver) = (self.source, self.resolver);
        for metric in Metric::ALL {
            let stage = Stage::Extract(metric);
            let table = self
                .timed(stage, &mut stages, || match metric {
                    Metric::Clicks => extract::clicks(source, &settings.range),
                    Metric::PatientsAccessed => extract::patients_accessed(source, &settings.range),
                    Metric::AfterHoursAccess => {
                        extract::after_hours_access(source, &settings.range, &settings.window)
                    },
                    Metric::Department => extract::department(source, &settings.range),
                    Metric::TerminationIndicator => {
                        extract::termination_indicator(source, resolver, &termination)
                    },
                })
                .map_err(|source| PipelineError::Extract { stage, source })?;
            tables.push(table);
        }

        let joined = self
            .timed(Stage::Join, &mut stages, || join_all(&tables, EMPLOYEE_ID))
            .map_err(PipelineError::Join)?;

        let output = match output {
            Some(path) => {
                self.persist(&joined, path, &mut stages)?;
                Some(path.to_path_buf())
            },
            None => {
                info!("dry run, output not written");
                None
            },
        };

        Ok(PipelineReport {
            organization,
            stages,
            table: joined,
            output,
        })
    }

    fn timed<E>(
        &mut self,
        stage: Stage,
        stages: &mut Vec<StageReport>,
        f: impl FnOnce() -> Result<Table, E>,
    ) -> Result<Table, E>
    where
        E: std::error::Error + 'static,
    {
        self.observer.on_stage_start(stage);
        let started = Instant::now();
        let result = f();
        let elapsed = started.elapsed();

        match &result {
            Ok(table) => {
                info!(
                    stage = stage.name(),
                    rows = table.num_rows(),
                    elapsed_ms = elapsed_ms(elapsed),
                    "stage complete"
                );
                self.observer.on_stage_complete(stage, table, elapsed);
                stages.push(StageReport {
                    stage,
                    rows: table.num_rows(),
                    elapsed,
                });
            },
            Err(e) => {
                warn!(
                    stage = stage.name(),
                    elapsed_ms = elapsed_ms(elapsed),
                    error = %e,
                    "stage failed"
                );
                self.observer.on_stage_error(stage, elapsed, e);
            },
        }
        result
    }

    fn persist(
        &mut self,
        table: &Table,
        path: &Path,
        stages: &mut Vec<StageReport>,
    ) -> Result<(), PipelineError> {
        let stage = Stage::Persist;
        self.observer.on_stage_start(stage);
        let started = Instant::now();

        match persist::save(table, path) {
            Ok(()) => {
                let elapsed = started.elapsed();
                info!(
                    stage = stage.name(),
                    path = %path.display(),
                    elapsed_ms = elapsed_ms(elapsed),
                    "stage complete"
                );
                self.observer.on_stage_complete(stage, table, elapsed);
                stages.push(StageReport {
                    stage,
                    rows: table.num_rows(),
                    elapsed,
                });
                Ok(())
            },
            Err(e) => {
                let elapsed = started.elapsed();
                warn!(
                    stage = stage.name(),
                    path = %path.display(),
                    error = %e,
                    "stage failed"
                );
                self.observer.on_stage_error(stage, elapsed, &e);
                Err(PipelineError::Persist(e))
            },
        }
    }
}
