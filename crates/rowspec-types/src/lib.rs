#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # rowspec-types
//!
//! Schema identity, type lattice, and dynamic value model.
//!
//! This crate provides the vocabulary shared by every other rowspec crate:
//! validated schema names and versions, the type expressions that fields and
//! columns are declared with, the values records hold, and the narrow
//! interfaces through which external tables are consumed.

/// Runtime column schemas supplied by table-reading collaborators.
pub mod columns;
/// Value coercion toward declared types.
pub mod coerce;
/// Schema names, versions, and qualified identifiers.
pub mod identity;
/// Name-keyed row access.
pub mod row;
/// Type expressions and subtyping.
pub mod types;
/// Dynamic values held by records.
pub mod value;

pub use columns::{ColumnDef, ColumnSchema, ColumnTypes};
pub use coerce::coerce;
pub use identity::{SchemaName, SchemaVersion, format_identifier, parse_identifier};
pub use row::FieldLookup;
pub use types::TypeExpr;
pub use value::{FromValue, Value};

use thiserror::Error;

/// Errors that can occur when building identities, types, or values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Invalid schema name '{name}': {reason}")]
    InvalidSchemaName { name: String, reason: String },

    #[error("Invalid version {version} for schema '{name}': versions must be non-negative")]
    InvalidVersion { name: String, version: i64 },

    #[error("Malformed schema version identifier '{input}': {reason}")]
    MalformedIdentifier { input: String, reason: String },

    #[error("Invalid type expression '{input}': {reason}")]
    TypeParse { input: String, reason: String },

    #[error("Cannot convert {value} of type {found} to {expected}")]
    Conversion {
        expected: String,
        found: String,
        value: String,
    },

    #[error("Column '{0}' appears more than once")]
    DuplicateColumn(String),
}

impl Error {
    /// Build an invalid-name error with the offending input.
    pub fn invalid_schema_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchemaName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Build a malformed-identifier error with the offending input.
    pub fn malformed_identifier(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedIdentifier {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Build a type-parse error with the offending input.
    pub fn type_parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TypeParse {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Build a conversion error describing the rejected value.
    pub fn conversion(expected: &TypeExpr, value: &Value) -> Self {
        Self::Conversion {
            expected: expected.to_string(),
            found: value.type_of().to_string(),
            value: value.to_string(),
        }
    }
}

/// Crate-local result type for identity, type, and value operations.
pub type Result<T> = std::result::Result<T, Error>;
