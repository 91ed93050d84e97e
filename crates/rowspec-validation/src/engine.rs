//! Compliance validation engine

use crate::acceptance::WideningRules;
use crate::report::{ComplianceReport, Violation};
use crate::{Error, Result};
use rowspec_schema::{FieldTable, MergedField};
use rowspec_types::{ColumnTypes, SchemaVersion};
use std::sync::Arc;
use tracing::debug;

/// Validation configuration
#[derive(Debug, Clone, Default)]
pub struct ValidationConfig {
    /// Maximum violations `find_violations` collects (0 = unlimited).
    /// `validate` always reports every violation.
    pub max_violations: usize,
}

impl ValidationConfig {
    pub fn with_max_violations(mut self, max_violations: usize) -> Self {
        self.max_violations = max_violations;
        self
    }
}

/// Checks runtime column schemas against merged field tables
#[derive(Debug, Clone, Default)]
pub struct ComplianceValidator {
    config: ValidationConfig,
    widenings: Arc<WideningRules>,
}

impl ComplianceValidator {
    /// Create a validator with the built-in acceptance rules only
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a shared table of custom widenings
    pub fn with_widenings(mut self, widenings: Arc<WideningRules>) -> Self {
        self.widenings = widenings;
        self
    }

    pub fn widenings(&self) -> &Arc<WideningRules> {
        &self.widenings
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// First violation in field order, if any. Extra columns never violate.
    pub fn find_violation(&self, columns: &dyn ColumnTypes, fields: &FieldTable) -> Option<Violation> {
        fields.iter().find_map(|field| self.check_field(columns, field))
    }

    /// Every violation in field order, up to `max_violations`.
    pub fn find_violations(&self, columns: &dyn ColumnTypes, fields: &FieldTable) -> Vec<Violation> {
        let violations = self.violations(columns, fields);
        match self.config.max_violations {
            0 => violations.collect(),
            max => violations.take(max).collect(),
        }
    }

    fn violations<'a>(
        &'a self,
        columns: &'a dyn ColumnTypes,
        fields: &'a FieldTable,
    ) -> impl Iterator<Item = Violation> + 'a {
        fields.iter().filter_map(move |field| self.check_field(columns, field))
    }

    /// Succeed silently or fail with a report of every violation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ComplianceViolation`] when any field violates.
    pub fn validate(
        &self,
        columns: &dyn ColumnTypes,
        fields: &FieldTable,
        schema_version: &SchemaVersion,
    ) -> Result<()> {
        let violations: Vec<Violation> = self.violations(columns, fields).collect();
        if violations.is_empty() {
            debug!(schema_version = %schema_version, "Column schema complies");
            return Ok(());
        }

        debug!(
            schema_version = %schema_version,
            violations = violations.len(),
            "Column schema does not comply"
        );
        Err(Error::ComplianceViolation(ComplianceReport::new(
            schema_version.to_string(),
            violations,
        )))
    }

    pub fn complies_with(&self, columns: &dyn ColumnTypes, fields: &FieldTable) -> bool {
        self.find_violation(columns, fields).is_none()
    }

    fn check_field(&self, columns: &dyn ColumnTypes, field: &MergedField) -> Option<Violation> {
        let accepted = self.widenings.accepted_type(&field.declared_type);
        match columns.column_type(&field.name) {
            Some(found) if found.is_subtype(&accepted) => None,
            Some(found) => Some(Violation::mismatch(
                &field.name,
                field.declared_type.clone(),
                accepted,
                found.clone(),
            )),
            None if accepted.admits_missing() => None,
            None => Some(Violation::missing(&field.name, field.declared_type.clone(), accepted)),
        }
    }
}
