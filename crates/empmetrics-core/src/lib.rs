//! empmetrics-core - employee activity metrics extraction
//!
//! This library pulls five per-employee metrics out of an access-log store,
//! joins them on `employee_id` and writes the result as a Parquet file.
//!
//! # Modules
//!
//! - [`source`]: `DataSource` trait with named-parameter binding, and the
//!   read-only SQLite backend
//! - [`table`]: in-memory tables, column type inference, previews and the
//!   joins that reduce the metric tables to one
//! - [`resolver`]: organization and field-definition lookups
//! - [`extract`]: the five metric extractors and their typed parameters
//! - [`persist`]: Parquet writer and reader
//! - [`pipeline`]: sequential orchestration with progress observers
//! - [`config`]: TOML configuration
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use empmetrics_core::config::EmpMetricsConfig;
//! use empmetrics_core::pipeline::Pipeline;
//! use empmetrics_core::resolver::SqlConfigurationResolver;
//! use empmetrics_core::source::SqliteDataSource;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EmpMetricsConfig::from_file(Path::new("empmetrics.toml"))?;
//! let settings = config.validate()?;
//! let source = SqliteDataSource::open(&config.database.path)?;
//! let resolver = SqlConfigurationResolver::new(&source);
//!
//! let report = Pipeline::new(&source, &resolver).run(&settings, Some(&config.output.path))?;
//! println!("{}", report.table.preview(config.output.preview_rows));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod extract;
pub mod persist;
pub mod pipeline;
pub mod resolver;
pub mod source;
pub mod table;
