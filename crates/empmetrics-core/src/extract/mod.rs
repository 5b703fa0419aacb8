//! Metric extractors.
//!
//! Each extractor binds a fixed SQL template to typed parameters and returns
//! one table keyed by `employee_id`. All five run through
//! [`MetricQuery::run`]; they differ only in their template and bindings.
//!
//! Every template aggregates or window-filters to one row per employee and
//! orders by `employee_id`, so repeated runs over unchanged data return equal
//! tables.

mod params;


use std::fmt;

use thiserror::Error;
use tracing::debug;

pub use params::{
    DATE_FORMAT, DateRange, ParamError, TIME_FORMAT, TerminationParams, TimeWindow, parse_date,
    parse_time,
};

use crate::resolver::{ConfigurationResolver, ResolveError};
use crate::source::{DataSource, DataSourceError, QueryParams};
use crate::table::Table;

/// Join key shared by every extractor output.
pub const EMPLOYEE_ID: &str = "employee_id";

/// Errors raised by an extractor.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractError {
    /// Parameters failed validation.
    #[error("invalid parameters: {0}")]
    Params(#[from] ParamError),

    /// A reference id could not be resolved.
    #[error("configuration lookup failed: {0}")]
    Resolve(#[from] ResolveError),

    /// The metric query failed.
    #[error("{metric} query failed: {source}")]
    Query {
        /// Metric being extracted.
        metric: Metric,
        /// Underlying data source error.
        #[source]
        source: DataSourceError,
    },
}

/// The five extracted metrics, in join order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Count of access actions.
    Clicks,
    /// Count of distinct patients first accessed.
    PatientsAccessed,
    /// Count of distinct patients accessed outside working hours.
    AfterHoursAccess,
    /// Department field value.
    Department,
    /// Whether the latest termination date follows the latest hire date.
    TerminationIndicator,
}

impl Metric {
    /// All metrics in join order.
    pub const ALL: [Self; 5] = [
        Self::Clicks,
        Self::PatientsAccessed,
        Self::AfterHoursAccess,
        Self::Department,
        Self::TerminationIndicator,
    ];

    /// Snake-case name used in logs and events.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Clicks => "clicks",
            Self::PatientsAccessed => "patients_accessed",
            Self::AfterHoursAccess => "after_hours_access",
            Self::Department => "department",
            Self::TerminationIndicator => "termination_indicator",
        }
    }

    /// Name of the metric column next to `employee_id`.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Clicks => "clicks_count",
            Self::PatientsAccessed => "patients_accessed_count",
            Self::AfterHoursAccess => "after_hours_count",
            Self::Department => "department",
            Self::TerminationIndicator => "indicator",
        }
    }

    /// SQL template of the metric.
    #[must_use]
    pub const fn template(self) -> &'static str {
        match self {
            Self::Clicks => CLICKS_SQL,
            Self::PatientsAccessed => PATIENTS_ACCESSED_SQL,
            Self::AfterHoursAccess => AFTER_HOURS_SQL,
            Self::Department => DEPARTMENT_SQL,
            Self::TerminationIndicator => TERMINATION_SQL,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const CLICKS_SQL: &str = "
    SELECT e.employee_id, COUNT(e.access_action_id) AS clicks_count
    FROM access_events e
    WHERE date(e.time) BETWEEN :search_start_date AND :search_end_date
    GROUP BY e.employee_id
    ORDER BY e.employee_id
";

const PATIENTS_ACCESSED_SQL: &str = "
    SELECT a.employee_id, COUNT(DISTINCT a.patient_id) AS patients_accessed_count
    FROM first_access a
    WHERE date(a.time) BETWEEN :search_start_date AND :search_end_date
    GROUP BY a.employee_id
    ORDER BY a.employee_id
";

// Both sides keep milliseconds so events just past a bound still count.
const AFTER_HOURS_SQL: &str = "
    SELECT a.employee_id, COUNT(DISTINCT a.patient_id) AS after_hours_count
    FROM access_events a
    WHERE date(a.time) BETWEEN :search_start_date AND :search_end_date
      AND time(a.time, 'subsec') NOT BETWEEN time(:start_time, 'subsec') AND time(:end_time, 'subsec')
      AND a.access_action_id IS NOT NULL
    GROUP BY a.employee_id
    ORDER BY a.employee_id
";

// Latest department assignment of every employee with a first access in range.
const DEPARTMENT_SQL: &str = "
    SELECT employee_id, department
    FROM (
        SELECT d.employee_id, f.value AS department,
               ROW_NUMBER() OVER (PARTITION BY d.employee_id ORDER BY d.id DESC) AS rn
        FROM employee_departments d
        INNER JOIN field_values f ON f.id = d.value_id
        WHERE d.employee_id IN (
            SELECT a.employee_id
            FROM first_access a
            WHERE date(a.time) BETWEEN :search_start_date AND :search_end_date
        )
    )
    WHERE rn = 1
    ORDER BY employee_id
";

// Values compare as text. A term value without a hire value leaves the
// indicator NULL.
const TERMINATION_SQL: &str = "
    WITH term_values AS (
        SELECT employee_id, value
        FROM (
            SELECT i.employee_id, v.value,
                   ROW_NUMBER() OVER (PARTITION BY i.employee_id ORDER BY i.time DESC, i.id DESC) AS rn
            FROM employee_info i
            INNER JOIN field_values v
                ON i.value_id = v.id AND v.field_definition_id = :term_field_id
            WHERE i.time > :term_search_date
        )
        WHERE rn = 1
    ),
    hire_values AS (
        SELECT employee_id, value
        FROM (
            SELECT i.employee_id, v.value,
                   ROW_NUMBER() OVER (PARTITION BY i.employee_id ORDER BY i.time DESC, i.id DESC) AS rn
            FROM employee_info i
            INNER JOIN field_values v
                ON i.value_id = v.id AND v.field_definition_id = :hire_field_id
            WHERE i.time > :term_search_date
        )
        WHERE rn = 1
    )
    SELECT t.employee_id,
           CASE
               WHEN t.value > h.value THEN '1'
               WHEN t.value <= h.value THEN '0'
           END AS indicator
    FROM term_values t
    LEFT JOIN hire_values h ON h.employee_id = t.employee_id
    ORDER BY t.employee_id
";

/// A metric template with its bound parameters.
#[derive(Debug, Clone)]
pub struct MetricQuery {
    /// Metric produced.
    pub metric: Metric,
    /// Bound parameters.
    pub params: QueryParams,
}

impl MetricQuery {
    /// Creates a query for `metric` with `params`.
    #[must_use]
    pub const fn new(metric: Metric, params: QueryParams) -> Self {
        Self { metric, params }
    }

    /// Executes the query against `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Query`] if the data source fails.
    pub fn run(&self, source: &dyn DataSource) -> Result<Table, ExtractError> {
        debug!(metric = self.metric.name(), "running metric query");
        source
            .execute_query(self.metric.template(), &self.params)
            .map_err(|source| ExtractError::Query {
                metric: self.metric,
                source,
            })
    }
}

fn date_params(range: &DateRange) -> QueryParams {
    QueryParams::new()
        .with(
            "search_start_date",
            range.start().format(DATE_FORMAT).to_string(),
        )
        .with("search_end_date", range.end().format(DATE_FORMAT).to_string())
}

/// Access actions per employee with an event in `range`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn clicks(source: &dyn DataSource, range: &DateRange) -> Result<Table, ExtractError> {
    MetricQuery::new(Metric::Clicks, date_params(range)).run(source)
}

/// Distinct patients first accessed per employee within `range`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn patients_accessed(
    source: &dyn DataSource,
    range: &DateRange,
) -> Result<Table, ExtractError> {
    MetricQuery::new(Metric::PatientsAccessed, date_params(range)).run(source)
}

/// Distinct patients acted on outside `window` per employee within `range`.
///
/// Events without an access action are ignored.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn after_hours_access(
    source: &dyn DataSource,
    range: &DateRange,
    window: &TimeWindow,
) -> Result<Table, ExtractError> {
    let params = date_params(range)
        .with("start_time", window.start().format(TIME_FORMAT).to_string())
        .with("end_time", window.end().format(TIME_FORMAT).to_string());
    MetricQuery::new(Metric::AfterHoursAccess, params).run(source)
}

/// Department of every employee with a first access in `range`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn department(source: &dyn DataSource, range: &DateRange) -> Result<Table, ExtractError> {
    MetricQuery::new(Metric::Department, date_params(range)).run(source)
}

/// Termination indicator per employee with a termination value recorded
/// after the cutoff.
///
/// `'1'` when the latest termination value is greater than the latest hire
/// value, `'0'` when it is not, NULL when the employee has no hire value.
/// Field definition ids are resolved through `resolver` first.
///
/// # Errors
///
/// Returns an error if either field definition cannot be resolved or the
/// query fails.
pub fn termination_indicator(
    source: &dyn DataSource,
    resolver: &dyn ConfigurationResolver,
    params: &TerminationParams,
) -> Result<Table, ExtractError> {
    let term_field = resolver.term_field_definition(&params.organization)?;
    let hire_field = resolver.hire_field_definition(&params.organization)?;
    debug!(
        org_id = params.organization.id,
        term_field_id = term_field.0,
        hire_field_id = hire_field.0,
        "resolved termination field definitions"
    );

    let query_params = QueryParams::new()
        .with("term_field_id", term_field.0)
        .with("hire_field_id", hire_field.0)
        .with("term_search_date", params.cutoff_timestamp());
    MetricQuery::new(Metric::TerminationIndicator, query_params).run(source)
}
