//! Runtime column schemas
//!
//! A [`ColumnSchema`] is what an external table reader reports about the data
//! it holds: ordered `(name, type)` columns with constant-time lookup by name.

use crate::types::TypeExpr;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Name lookup over the columns of a runtime table
pub trait ColumnTypes {
    /// Type of the column called `name`, if present.
    fn column_type(&self, name: &str) -> Option<&TypeExpr>;
}

/// Definition of a single column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name
    pub name: String,
    /// Column element type
    #[serde(rename = "type")]
    pub column_type: TypeExpr,
}

impl ColumnDef {
    /// Create a column definition
    pub fn new(name: impl Into<String>, column_type: TypeExpr) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Ordered column layout of a runtime table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ColumnSchemaFile", into = "ColumnSchemaFile")]
pub struct ColumnSchema {
    columns: Vec<ColumnDef>,
    index: HashMap<String, usize>,
}

/// Serializable form of a column schema
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnSchemaFile {
    columns: Vec<ColumnDef>,
}

impl ColumnSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from column definitions, rejecting duplicate names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateColumn`] if a name repeats.
    pub fn from_columns(columns: impl IntoIterator<Item = ColumnDef>) -> Result<Self> {
        let mut schema = Self::new();
        for column in columns {
            if schema.index.contains_key(&column.name) {
                return Err(Error::DuplicateColumn(column.name));
            }
            schema.push(column);
        }
        Ok(schema)
    }

    /// Add a column; a repeated name replaces the earlier column's type in place
    pub fn with_column(mut self, name: impl Into<String>, column_type: TypeExpr) -> Self {
        let column = ColumnDef::new(name, column_type);
        match self.index.get(&column.name) {
            Some(&idx) => self.columns[idx] = column,
            None => self.push(column),
        }
        self
    }

    fn push(&mut self, column: ColumnDef) {
        self.index.insert(column.name.clone(), self.columns.len());
        self.columns.push(column);
    }

    /// Get column definition by name
    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.index.get(name).map(|&idx| &self.columns[idx])
    }

    /// Columns in order
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Column names in order
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Get the number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if the schema has any columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl ColumnTypes for ColumnSchema {
    fn column_type(&self, name: &str) -> Option<&TypeExpr> {
        self.get_column(name).map(|c| &c.column_type)
    }
}

impl ColumnTypes for HashMap<String, TypeExpr> {
    fn column_type(&self, name: &str) -> Option<&TypeExpr> {
        self.get(name)
    }
}

impl TryFrom<ColumnSchemaFile> for ColumnSchema {
    type Error = Error;

    fn try_from(file: ColumnSchemaFile) -> Result<Self> {
        Self::from_columns(file.columns)
    }
}

impl From<ColumnSchema> for ColumnSchemaFile {
    fn from(schema: ColumnSchema) -> Self {
        Self {
            columns: schema.columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_schema_creation() {
        let schema = ColumnSchema::new()
            .with_column("id", TypeExpr::Uuid)
            .with_column("score", TypeExpr::Float64);

        assert_eq!(schema.len(), 2);
        assert_eq!(schema.names(), vec!["id", "score"]);
        assert_eq!(schema.column_type("score"), Some(&TypeExpr::Float64));
        assert_eq!(schema.column_type("nonexistent"), None);
    }

    #[test]
    fn test_repeated_column_replaces_in_place() {
        let schema = ColumnSchema::new()
            .with_column("a", TypeExpr::Int64)
            .with_column("b", TypeExpr::String)
            .with_column("a", TypeExpr::Float64);

        assert_eq!(schema.names(), vec!["a", "b"]);
        assert_eq!(schema.column_type("a"), Some(&TypeExpr::Float64));
    }

    #[test]
    fn test_from_columns_rejects_duplicates() {
        let result = ColumnSchema::from_columns(vec![
            ColumnDef::new("a", TypeExpr::Int64),
            ColumnDef::new("a", TypeExpr::Int32),
        ]);
        assert_eq!(result.unwrap_err(), Error::DuplicateColumn("a".to_string()));
    }

    #[test]
    fn test_deserialize_from_json() {
        let json = r#"{"columns": [{"name": "a", "type": "Int64"}, {"name": "b", "type": "Optional{String}"}]}"#;
        let schema: ColumnSchema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(
            schema.column_type("b"),
            Some(&TypeExpr::optional(TypeExpr::String))
        );

        let duplicate = r#"{"columns": [{"name": "a", "type": "Int64"}, {"name": "a", "type": "Int64"}]}"#;
        assert!(serde_json::from_str::<ColumnSchema>(duplicate).is_err());
    }

    #[test]
    fn test_deserialize_from_yaml() {
        let yaml = "columns:\n  - name: a\n    type: List{Int32}\n";
        let schema: ColumnSchema = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(schema.column_type("a"), Some(&TypeExpr::list(TypeExpr::Int32)));
    }

    #[test]
    fn test_hash_map_lookup() {
        let mut columns = HashMap::new();
        columns.insert("a".to_string(), TypeExpr::Bool);
        assert_eq!(columns.column_type("a"), Some(&TypeExpr::Bool));
    }
}
