#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

//! # rowspec-catalog
//!
//! The declaration store: declares schema versions against a name registry,
//! keeps their merged field tables and generated record types, and answers
//! lookups, compliance checks, and record construction by schema version.
//!
//! ## Example Usage
//!
//! ```rust
//! use rowspec_catalog::Catalog;
//! use rowspec_schema::{Owner, SchemaDeclaration};
//! use rowspec_types::{ColumnSchema, SchemaName, SchemaVersion, TypeExpr, Value};
//!
//! let catalog = Catalog::new();
//! catalog.register_name(&SchemaName::new("example.foo").unwrap(), &Owner::new("Example"))?;
//!
//! let sv = SchemaVersion::new("example.foo", 1).unwrap();
//! catalog.declare(&SchemaDeclaration::new(sv.clone()).statements(["a::Int64", "b::Int64 = a * 2"]))?;
//!
//! let record = catalog.construct(&sv, [("a", Value::from(21i64))])?;
//! assert_eq!(record.get("b"), Some(&Value::Int64(42)));
//!
//! let columns = ColumnSchema::new()
//!     .with_column("a", TypeExpr::Int64)
//!     .with_column("b", TypeExpr::Int64);
//! assert!(catalog.complies_with(&columns, &sv)?);
//! # Ok::<(), rowspec_catalog::Error>(())
//! ```

pub mod catalog;
pub mod config;
pub mod entry;
pub mod metadata;

pub use catalog::Catalog;
pub use config::CatalogConfig;
pub use entry::{DeclarationEntry, EntrySummary};
pub use metadata::{SCHEMA_METADATA_KEY, attach_schema_metadata, schema_metadata};

use rowspec_schema::Owner;
use rowspec_validation::ComplianceReport;
use thiserror::Error;

/// Errors that can occur when declaring or using schema versions
#[derive(Error, Debug)]
pub enum Error {
    #[error("{schema_version} is already declared differently: {message}")]
    RedeclarationConflict { schema_version: String, message: String },

    #[error("Unknown schema version: {}", describe_unknown(.schema_version, .owner))]
    UnknownSchemaVersion {
        /// `None` when no schema version was recorded at all
        schema_version: Option<String>,
        /// Registrant of the schema name, when the name is known
        owner: Option<Owner>,
    },

    #[error("{0}")]
    ComplianceViolation(ComplianceReport),

    #[error("Failed to lock {0}")]
    Lock(String),

    #[error(transparent)]
    Schema(#[from] rowspec_schema::Error),

    #[error(transparent)]
    Record(#[from] rowspec_record::Error),

    #[error(transparent)]
    Validation(rowspec_validation::Error),

    #[error(transparent)]
    Types(#[from] rowspec_types::Error),
}

impl Error {
    pub fn unknown(schema_version: impl ToString, owner: Option<Owner>) -> Self {
        Self::UnknownSchemaVersion {
            schema_version: Some(schema_version.to_string()),
            owner,
        }
    }

    /// Construction error of a single record, if that is what this is
    pub fn construction(&self) -> Option<&rowspec_record::ConstructionError> {
        match self {
            Self::Record(rowspec_record::Error::Construction(e)) => Some(e),
            _ => None,
        }
    }
}

impl From<rowspec_validation::Error> for Error {
    fn from(err: rowspec_validation::Error) -> Self {
        match err {
            rowspec_validation::Error::ComplianceViolation(report) => Self::ComplianceViolation(report),
            other => Self::Validation(other),
        }
    }
}

fn describe_unknown(schema_version: &Option<String>, owner: &Option<Owner>) -> String {
    match (schema_version, owner) {
        (None, _) => format!("no schema version recorded under '{SCHEMA_METADATA_KEY}'"),
        (Some(sv), None) => format!("{sv} is not declared in this process"),
        (Some(sv), Some(owner)) => format!(
            "{sv} is not declared in this process; its schema name is registered by {owner}, which may provide it"
        ),
    }
}

pub type Result<T> = std::result::Result<T, Error>;
