//! Resolver backed by the same [`DataSource`] as the extractors.

use tracing::debug;

use super::{ConfigurationResolver, FieldDefinitionId, OrganizationRecord, ResolveError};
use crate::source::{DataSource, QueryParams};
use crate::table::{Table, Value};

/// Setting name mapping an organization to its hire-date field.
pub const DEFAULT_HIRE_SETTING: &str = "hired";

/// Name of the termination-date field definition.
pub const DEFAULT_TERM_FIELD_NAME: &str = "term date";

// SQLite's lower() folds ASCII only, so names are matched in Rust.
const ORGANIZATION_SQL: &str = "
    SELECT o.id, o.name
    FROM organizations o
    ORDER BY o.id
";

const HIRE_FIELD_SQL: &str = "
    SELECT s.field_definition_id
    FROM field_definition_settings s
    WHERE s.org_id = :org_id AND s.setting = :setting
";

const TERM_FIELD_SQL: &str = "
    SELECT d.id
    FROM field_definitions d
    WHERE d.org_id = :org_id AND d.name = :name
    ORDER BY d.id
";

/// Looks reference ids up with SQL against a [`DataSource`].
pub struct SqlConfigurationResolver<'a> {
    source: &'a dyn DataSource,
    hire_setting: String,
    term_field_name: String,
}

impl<'a> SqlConfigurationResolver<'a> {
    /// Creates a resolver using the default setting and field names.
    #[must_use]
    pub fn new(source: &'a dyn DataSource) -> Self {
        Self {
            source,
            hire_setting: DEFAULT_HIRE_SETTING.to_string(),
            term_field_name: DEFAULT_TERM_FIELD_NAME.to_string(),
        }
    }

    /// Overrides the setting used to find the hire-date field.
    #[must_use]
    pub fn with_hire_setting(mut self, setting: impl Into<String>) -> Self {
        self.hire_setting = setting.into();
        self
    }

    /// Overrides the name of the termination-date field.
    #[must_use]
    pub fn with_term_field_name(mut self, name: impl Into<String>) -> Self {
        self.term_field_name = name.into();
        self
    }

    fn single_id(
        table: &Table,
        org: &OrganizationRecord,
        lookup: &str,
    ) -> Result<FieldDefinitionId, ResolveError> {
        match table.rows() {
            [] => Err(ResolveError::FieldDefinitionNotFound {
                org_id: org.id,
                lookup: lookup.to_string(),
            }),
            [row] => row
                .first()
                .and_then(Value::as_integer)
                .map(FieldDefinitionId)
                .ok_or_else(|| ResolveError::InvalidId {
                    lookup: lookup.to_string(),
                }),
            rows => Err(ResolveError::AmbiguousFieldDefinition {
                org_id: org.id,
                lookup: lookup.to_string(),
                count: rows.len(),
            }),
        }
    }
}

impl ConfigurationResolver for SqlConfigurationResolver<'_> {
    fn organization(&self, name_filter: &str) -> Result<OrganizationRecord, ResolveError> {
        let table = self
            .source
            .execute_query(ORGANIZATION_SQL, &QueryParams::new())?;

        let needle = name_filter.to_lowercase();
        let row = table
            .rows()
            .iter()
            .find(|row| {
                row[1]
                    .as_text()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
            .ok_or_else(|| ResolveError::OrganizationNotFound {
                filter: name_filter.to_string(),
            })?;
        let id = row[0].as_integer().ok_or_else(|| ResolveError::InvalidId {
            lookup: format!("organization '{name_filter}'"),
        })?;
        let name = row[1].as_text().unwrap_or_default();

        debug!(org_id = id, org_name = name, "resolved organization");
        Ok(OrganizationRecord::new(id, name))
    }

    fn hire_field_definition(
        &self,
        org: &OrganizationRecord,
    ) -> Result<FieldDefinitionId, ResolveError> {
        let table = self.source.execute_query(
            HIRE_FIELD_SQL,
            &QueryParams::new()
                .with("org_id", org.id)
                .with("setting", self.hire_setting.as_str()),
        )?;
        let id = Self::single_id(&table, org, &self.hire_setting)?;
        debug!(org_id = org.id, field_definition_id = id.0, "resolved hire field");
        Ok(id)
    }

    fn term_field_definition(
        &self,
        org: &OrganizationRecord,
    ) -> Result<FieldDefinitionId, ResolveError> {
        let table = self.source.execute_query(
            TERM_FIELD_SQL,
            &QueryParams::new()
                .with("org_id", org.id)
                .with("name", self.term_field_name.as_str()),
        )?;
        let id = Self::single_id(&table, org, &self.term_field_name)?;
        debug!(org_id = org.id, field_definition_id = id.0, "resolved term field");
        Ok(id)
    }
}
