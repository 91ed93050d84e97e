//! Compliance reports

use rowspec_types::TypeExpr;
use serde::Serialize;
use std::fmt;

/// One field-level mismatch between a column schema and a field table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Field name
    pub field: String,
    /// Declared type of the field
    pub declared: TypeExpr,
    /// Widest column type the field accepts
    pub accepted: TypeExpr,
    /// Column type found, `None` when the column is absent
    pub found: Option<TypeExpr>,
}

impl Violation {
    pub fn missing(field: impl Into<String>, declared: TypeExpr, accepted: TypeExpr) -> Self {
        Self {
            field: field.into(),
            declared,
            accepted,
            found: None,
        }
    }

    pub fn mismatch(field: impl Into<String>, declared: TypeExpr, accepted: TypeExpr, found: TypeExpr) -> Self {
        Self {
            field: field.into(),
            declared,
            accepted,
            found: Some(found),
        }
    }

    /// Whether the column was absent rather than mistyped
    pub fn is_missing(&self) -> bool {
        self.found.is_none()
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.found {
            None => write!(f, "missing field '{}' (expected {})", self.field, self.accepted),
            Some(found) => write!(
                f,
                "field '{}': expected a subtype of {}, found {}",
                self.field, self.accepted, found
            ),
        }
    }
}

/// Every violation found for one schema version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
    pub schema_version: String,
    pub violations: Vec<Violation>,
}

impl ComplianceReport {
    pub fn new(schema_version: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self {
            schema_version: schema_version.into(),
            violations,
        }
    }

    pub fn is_compliant(&self) -> bool {
        self.violations.is_empty()
    }

    /// Fields whose column is absent
    pub fn missing(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_missing())
    }

    /// Fields whose column has a non-conforming type
    pub fn mismatched(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| !v.is_missing())
    }
}

impl fmt::Display for ComplianceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Column schema does not comply with {} ({} violation{})",
            self.schema_version,
            self.violations.len(),
            if self.violations.len() == 1 { "" } else { "s" }
        )?;
        for violation in &self.violations {
            write!(f, "\n  - {violation}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lists_every_violation() {
        let report = ComplianceReport::new(
            "shapes.square@1",
            vec![
                Violation::mismatch("a", TypeExpr::Integer, TypeExpr::Integer, TypeExpr::Float64),
                Violation::missing("b", TypeExpr::String, TypeExpr::AbstractString),
            ],
        );

        assert!(!report.is_compliant());
        assert_eq!(report.missing().count(), 1);
        assert_eq!(report.mismatched().count(), 1);

        let text = report.to_string();
        assert!(text.contains("shapes.square@1 (2 violations)"));
        assert!(text.contains("field 'a': expected a subtype of Integer, found Float64"));
        assert!(text.contains("missing field 'b' (expected AbstractString)"));
    }
}
