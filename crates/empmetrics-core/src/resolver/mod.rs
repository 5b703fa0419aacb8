//! Configuration lookups.
//!
//! Some extractor parameters are ids of reference records owned by the
//! store: the organization under analysis and the field definitions that
//! hold hire and termination dates for it. A [`ConfigurationResolver`]
//! resolves them before any metric query is bound. Every lookup fails loudly
//! when nothing matches; there is no default id.

mod sql;

use std::fmt;

use thiserror::Error;

use crate::source::DataSourceError;

pub use sql::{DEFAULT_HIRE_SETTING, DEFAULT_TERM_FIELD_NAME, SqlConfigurationResolver};

/// Errors raised by configuration lookups.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResolveError {
    /// No organization name contains the filter.
    #[error("no organization matches '{filter}'")]
    OrganizationNotFound {
        /// Case-insensitive substring that was searched for.
        filter: String,
    },

    /// The organization has no field definition for the lookup.
    #[error("organization {org_id} has no field definition for '{lookup}'")]
    FieldDefinitionNotFound {
        /// Organization searched.
        org_id: i64,
        /// Setting or field name searched for.
        lookup: String,
    },

    /// More than one field definition matched a lookup that must be unique.
    #[error("organization {org_id} has {count} field definitions named '{lookup}'")]
    AmbiguousFieldDefinition {
        /// Organization searched.
        org_id: i64,
        /// Field name searched for.
        lookup: String,
        /// Number of matches.
        count: usize,
    },

    /// The lookup query returned something other than an integer id.
    #[error("lookup '{lookup}' returned a non-integer id")]
    InvalidId {
        /// Lookup that misbehaved.
        lookup: String,
    },

    /// The lookup query itself failed.
    #[error("lookup query failed: {0}")]
    Source(#[from] DataSourceError),
}

/// An organization whose data is being analysed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationRecord {
    /// Primary key.
    pub id: i64,
    /// Display name.
    pub name: String,
}

impl OrganizationRecord {
    /// Creates an organization record.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for OrganizationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id {})", self.name, self.id)
    }
}

/// Id of a typed, versioned attribute definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldDefinitionId(pub i64);

impl fmt::Display for FieldDefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolves reference ids needed to bind extractor parameters.
pub trait ConfigurationResolver {
    /// Finds the first organization (lowest id) whose name contains
    /// `name_filter`, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::OrganizationNotFound`] if none matches.
    fn organization(&self, name_filter: &str) -> Result<OrganizationRecord, ResolveError>;

    /// Field definition holding hire dates for `org`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::FieldDefinitionNotFound`] if the organization
    /// has none.
    fn hire_field_definition(
        &self,
        org: &OrganizationRecord,
    ) -> Result<FieldDefinitionId, ResolveError>;

    /// Field definition holding termination dates for `org`.
    ///
    /// # Errors
    ///
    /// Returns an error unless exactly one definition matches.
    fn term_field_definition(
        &self,
        org: &OrganizationRecord,
    ) -> Result<FieldDefinitionId, ResolveError>;
}
