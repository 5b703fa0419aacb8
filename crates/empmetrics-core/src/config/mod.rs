//! Configuration parsing.
//!
//! A run is described by an optional TOML file with three sections:
//!
//! ```toml
//! [database]
//! path = "store.db"
//!
//! [extraction]
//! organization = "Maize"
//! search_start_date = "2020-01-01"
//! search_end_date = "2020-06-08"
//! start_time = "08:00"
//! end_time = "18:00"
//! term_search_date = "2020-05-08"
//! hire_setting = "hired"
//! term_field_name = "term date"
//!
//! [output]
//! path = "cone_burnout_data.parquet"
//! preview_rows = 5
//! ```
//!
//! Every key is optional. Values stay textual until [`EmpMetricsConfig::validate`]
//! turns them into typed [`ExtractionSettings`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::extract::{DateRange, TimeWindow, parse_date};
use crate::pipeline::ExtractionSettings;
use crate::resolver::{DEFAULT_HIRE_SETTING, DEFAULT_TERM_FIELD_NAME};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmpMetricsConfig {
    /// Store to read from.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Query parameters.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Output file and console previews.
    #[serde(default)]
    pub output: OutputConfig,
}

impl EmpMetricsConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or names an unknown key.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize configuration to TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks the extraction section and converts it into typed settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if a date or time does not parse,
    /// a range is inverted, or the organization filter is blank.
    pub fn validate(&self) -> Result<ExtractionSettings, ConfigError> {
        let ext = &self.extraction;
        if ext.organization.trim().is_empty() {
            return Err(ConfigError::Validation(
                "extraction.organization must not be empty".to_string(),
            ));
        }

        let range = DateRange::parse(&ext.search_start_date, &ext.search_end_date)
            .map_err(|e| ConfigError::Validation(format!("search dates: {e}")))?;
        let window = TimeWindow::parse(&ext.start_time, &ext.end_time)
            .map_err(|e| ConfigError::Validation(format!("working hours: {e}")))?;
        let cutoff = parse_date(&ext.term_search_date)
            .map_err(|e| ConfigError::Validation(format!("term_search_date: {e}")))?;

        Ok(ExtractionSettings {
            organization: ext.organization.clone(),
            range,
            window,
            cutoff,
        })
    }
}

/// Store location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Path of the SQLite store, opened read-only.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Extraction parameters, kept textual until validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Case-insensitive substring of the organization name.
    #[serde(default = "default_organization")]
    pub organization: String,

    /// First day of the search range (`YYYY-MM-DD`).
    #[serde(default = "default_search_start_date")]
    pub search_start_date: String,

    /// Last day of the search range, inclusive.
    #[serde(default = "default_search_end_date")]
    pub search_end_date: String,

    /// Start of working hours (`HH:MM` or `HH:MM:SS`).
    #[serde(default = "default_start_time")]
    pub start_time: String,

    /// End of working hours.
    #[serde(default = "default_end_time")]
    pub end_time: String,

    /// Only employee info recorded after this day counts towards the
    /// termination indicator.
    #[serde(default = "default_term_search_date")]
    pub term_search_date: String,

    /// Organization setting naming the hire-date field.
    #[serde(default = "default_hire_setting")]
    pub hire_setting: String,

    /// Name of the termination-date field.
    #[serde(default = "default_term_field_name")]
    pub term_field_name: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            organization: default_organization(),
            search_start_date: default_search_start_date(),
            search_end_date: default_search_end_date(),
            start_time: default_start_time(),
            end_time: default_end_time(),
            term_search_date: default_term_search_date(),
            hire_setting: default_hire_setting(),
            term_field_name: default_term_field_name(),
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Parquet file written at the end of a run.
    #[serde(default = "default_output_path")]
    pub path: PathBuf,

    /// Rows shown in each table preview.
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            preview_rows: default_preview_rows(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("empmetrics.db")
}

fn default_organization() -> String {
    "Maize".to_string()
}

fn default_search_start_date() -> String {
    "2020-01-01".to_string()
}

fn default_search_end_date() -> String {
    "2020-06-08".to_string()
}

fn default_start_time() -> String {
    "08:00".to_string()
}

fn default_end_time() -> String {
    "18:00".to_string()
}

fn default_term_search_date() -> String {
    "2020-05-08".to_string()
}

fn default_hire_setting() -> String {
    DEFAULT_HIRE_SETTING.to_string()
}

fn default_term_field_name() -> String {
    DEFAULT_TERM_FIELD_NAME.to_string()
}

fn default_output_path() -> PathBuf {
    PathBuf::from("cone_burnout_data.parquet")
}

const fn default_preview_rows() -> usize {
    5
}

/// Configuration errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// I/O error reading configuration file.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Validation error.
    #[error("configuration validation failed: {0}")]
    Validation(String),
}
