#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # rowspec-validation
//!
//! Accepted-type resolution and compliance checks of runtime column schemas
//! against declared field tables.
//!
//! ## Example Usage
//!
//! ```rust
//! use rowspec_schema::{DeclaredFieldInfo, inheritance::merge_fields};
//! use rowspec_types::{ColumnSchema, TypeExpr};
//! use rowspec_validation::ComplianceValidator;
//!
//! let fields = merge_fields(None, &[
//!     DeclaredFieldInfo::new("a", TypeExpr::Integer),
//!     DeclaredFieldInfo::new("b", TypeExpr::optional(TypeExpr::String)),
//! ]);
//! let columns = ColumnSchema::new()
//!     .with_column("a", TypeExpr::Int64)
//!     .with_column("c", TypeExpr::Float64);
//!
//! let validator = ComplianceValidator::new();
//! assert!(validator.complies_with(&columns, &fields));
//! ```

pub mod acceptance;
pub mod engine;
pub mod report;

pub use acceptance::{WideningRule, WideningRules, accepted_type};
pub use engine::{ComplianceValidator, ValidationConfig};
pub use report::{ComplianceReport, Violation};

use rowspec_schema::{FieldTable, Owner};
use rowspec_types::{ColumnTypes, SchemaVersion};
use thiserror::Error;

/// Errors that can occur during validation
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    ComplianceViolation(ComplianceReport),

    #[error("Widening of {type_name} belongs to {existing}; {attempted} cannot change it")]
    WideningOwnership {
        type_name: String,
        existing: Owner,
        attempted: Owner,
    },

    #[error("Only custom named types can be widened, not {0}")]
    NotWidenable(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Check `columns` against `fields` with default settings
///
/// # Errors
///
/// Returns [`Error::ComplianceViolation`] listing every violation.
pub fn validate(columns: &dyn ColumnTypes, fields: &FieldTable, schema_version: &SchemaVersion) -> Result<()> {
    ComplianceValidator::new().validate(columns, fields, schema_version)
}

/// Whether `columns` complies with `fields` under the built-in acceptance rules
pub fn complies_with(columns: &dyn ColumnTypes, fields: &FieldTable) -> bool {
    ComplianceValidator::new().complies_with(columns, fields)
}
