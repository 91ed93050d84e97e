//! # rowspec-schema
//!
//! Name registry, field declaration model, and inheritance/merge logic.
//!
//! A schema version is declared from an ordered list of statements: field
//! statements (`name`, `name::T`, `name = expr`, `name::T = expr`,
//! `name::(<:T) = expr`) followed by `@check` constraints. This crate parses
//! those statements, checks a child's fields against its parent's, and merges
//! the two into the ordered field table a record type is built from.

pub mod expr;
pub mod inheritance;
pub mod loader;
pub mod model;
pub mod parser;
pub mod registry;

pub use expr::{BinaryOp, Expr, UnaryOp, parse_expr};
pub use loader::{DeclarationDocument, DeclarationLoader, SchemaFile};
pub use model::{
    Constraint, Declaration, DeclaredFieldInfo, FieldTable, MergedField, NativeCheck, ParsedDeclaration,
    SchemaDeclaration, Statement,
};
pub use parser::{parse_field, parse_statement};
pub use registry::{NameRegistry, Owner};

use thiserror::Error;

/// Errors that can occur when declaring schemas
#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema name '{name}' is already registered by {existing}; {attempted} cannot register it")]
    NamingCollision {
        name: String,
        existing: Owner,
        attempted: Owner,
    },

    #[error("Invalid declaration of {schema}: {message}")]
    Declaration { schema: String, message: String },

    #[error("{child} cannot extend {parent}: {message}")]
    IncompatibleInheritance {
        child: String,
        parent: String,
        message: String,
    },

    #[error("Parse error in '{input}': {message}")]
    Parse { input: String, message: String },

    #[error("Invalid declaration document: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Types(#[from] rowspec_types::Error),
}

impl Error {
    /// Create a parse error
    pub fn parse(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Create a declaration error
    pub fn declaration(schema: impl ToString, message: impl Into<String>) -> Self {
        Self::Declaration {
            schema: schema.to_string(),
            message: message.into(),
        }
    }

    /// Create an incompatible inheritance error
    pub fn incompatible(child: impl ToString, parent: impl ToString, message: impl Into<String>) -> Self {
        Self::IncompatibleInheritance {
            child: child.to_string(),
            parent: parent.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
