//! # rowspec-record
//!
//! Record types generated from schema declarations.
//!
//! A [`RecordType`] holds the merged field table of a schema version together
//! with the initializers and constraints it declares. Its constructors
//! evaluate initializers against the supplied values, coerce each result to
//! the declared type, and run the declared constraints before handing out an
//! immutable [`Record`].

pub mod eval;
pub mod functions;
pub mod record;

pub use eval::evaluate;
pub use functions::{Function, FunctionRegistry};
pub use record::{Record, RecordType};

use thiserror::Error;

/// Why a single record could not be constructed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("{schema}: no field named '{field}'")]
    UnknownField { schema: String, field: String },

    #[error("{schema}: initializer of field '{field}' failed: {message}")]
    InitializerFailed {
        schema: String,
        field: String,
        message: String,
    },

    #[error("{schema}: field '{field}' expects {expected}, got {value} of type {found}")]
    TypeMismatch {
        schema: String,
        field: String,
        expected: String,
        found: String,
        value: String,
    },

    #[error("{schema}: constraint '{constraint}' is not satisfied")]
    ConstraintFailed { schema: String, constraint: String },

    #[error("{schema}: constraint '{constraint}' raised an error: {message}")]
    ConstraintErrored {
        schema: String,
        constraint: String,
        message: String,
    },
}

impl ConstructionError {
    /// Field the error is about, if it concerns a single field
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::UnknownField { field, .. }
            | Self::InitializerFailed { field, .. }
            | Self::TypeMismatch { field, .. } => Some(field),
            Self::ConstraintFailed { .. } | Self::ConstraintErrored { .. } => None,
        }
    }
}

/// Errors that can occur when evaluating expressions or building records
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Function registry error: {0}")]
    Registry(String),

    #[error(transparent)]
    Types(#[from] rowspec_types::Error),
}

impl Error {
    /// Create an evaluation error
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
