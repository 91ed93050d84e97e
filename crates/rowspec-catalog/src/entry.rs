//! Declaration store entries

use rowspec_record::RecordType;
use rowspec_schema::{Declaration, FieldTable, ParsedDeclaration};
use rowspec_types::SchemaVersion;
use serde::Serialize;
use std::sync::Arc;

/// Everything stored for one declared schema version. Never mutated after
/// insertion.
#[derive(Debug)]
pub struct DeclarationEntry {
    pub schema_version: SchemaVersion,
    pub parent: Option<SchemaVersion>,
    /// Merged field table, parent fields first
    pub fields: FieldTable,
    /// Identifier plus this version's own fields
    pub declaration: Declaration,
    pub record_name: String,
    /// Constraint names in declaration order
    pub constraints: Vec<String>,
    pub record_type: Arc<RecordType>,
}

impl DeclarationEntry {
    /// Qualified identifier, `child@v>parent@v>...`
    pub fn identifier(&self) -> &str {
        &self.declaration.identifier
    }

    /// Whether re-declaring with `declaration` would change nothing
    pub(crate) fn is_same_declaration(&self, declaration: &Declaration, parsed: &ParsedDeclaration) -> bool {
        self.declaration == *declaration
            && self.record_name == parsed.record_name
            && self.constraints.iter().map(String::as_str).eq(parsed.constraint_names())
    }

    /// Parent difference from a re-declaration, for error messages
    pub(crate) fn describe_parent_difference(&self, parent: Option<&SchemaVersion>) -> String {
        let render = |p: Option<&SchemaVersion>| p.map_or_else(|| "none".to_string(), ToString::to_string);
        format!(
            "stored parent is {}, new one is {}",
            render(self.parent.as_ref()),
            render(parent)
        )
    }

    /// First difference from a re-declaration, for error messages
    pub(crate) fn describe_difference(&self, declaration: &Declaration, parsed: &ParsedDeclaration) -> String {
        if self.declaration.identifier != declaration.identifier {
            return format!(
                "stored identifier is {}, new one is {}",
                self.declaration.identifier, declaration.identifier
            );
        }
        if self.declaration.fields != declaration.fields {
            let render = |d: &Declaration| {
                d.fields
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            return format!(
                "stored fields are [{}], new fields are [{}]",
                render(&self.declaration),
                render(declaration)
            );
        }
        if self.record_name != parsed.record_name {
            return format!(
                "stored record name is {}, new one is {}",
                self.record_name, parsed.record_name
            );
        }
        "constraints differ".to_string()
    }

    /// Serializable overview of the entry
    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            schema_version: self.schema_version.to_string(),
            identifier: self.identifier().to_string(),
            parent: self.parent.as_ref().map(ToString::to_string),
            record_name: self.record_name.clone(),
            fields: self.fields.clone(),
            constraints: self.constraints.clone(),
        }
    }
}

/// Flat view of a [`DeclarationEntry`] for display and export
#[derive(Debug, Clone, Serialize)]
pub struct EntrySummary {
    pub schema_version: String,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    pub record_name: String,
    pub fields: FieldTable,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
}
