//! Declaration model

use crate::expr::{Expr, is_identifier};
use crate::parser::parse_statement;
use crate::{Error, Result};
use rowspec_types::{FieldLookup, SchemaVersion, TypeExpr};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Prefix reserved for synthesized type-parameter names
pub const RESERVED_PREFIX: char = '_';

/// One declared field in canonical `name::Type = initializer` form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclaredFieldInfo {
    /// Field name
    pub name: String,
    /// Declared type; the upper bound for open fields
    pub declared_type: TypeExpr,
    /// Whether the concrete type is chosen per record (an open field)
    pub parameterize: bool,
    /// Initializer expression; defaults to the field's own name
    pub initializer: Expr,
}

impl DeclaredFieldInfo {
    /// Field of a fixed type with the default initializer
    pub fn new(name: impl Into<String>, declared_type: TypeExpr) -> Self {
        let name = name.into();
        Self {
            initializer: Expr::Field(name.clone()),
            name,
            declared_type,
            parameterize: false,
        }
    }

    /// Open field bounded above by `bound`
    pub fn open(name: impl Into<String>, bound: TypeExpr) -> Self {
        Self {
            parameterize: true,
            ..Self::new(name, bound)
        }
    }

    /// Replace the initializer expression
    pub fn with_initializer(mut self, initializer: Expr) -> Self {
        self.initializer = initializer;
        self
    }

    /// Whether the initializer is just the field's own value
    pub fn has_default_initializer(&self) -> bool {
        self.initializer.is_field_ref(&self.name)
    }

    /// Name of the synthesized type parameter for an open field.
    pub fn type_parameter_name(&self) -> String {
        format!("{RESERVED_PREFIX}{}", self.name)
    }
}

impl fmt::Display for DeclaredFieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parameterize {
            write!(f, "{}::(<:{})", self.name, self.declared_type)?;
        } else {
            write!(f, "{}::{}", self.name, self.declared_type)?;
        }
        if !self.has_default_initializer() {
            write!(f, " = {}", self.initializer)?;
        }
        Ok(())
    }
}

/// The declaration stored for a schema version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Qualified identifier, `child@v>parent@v>...`
    pub identifier: String,
    /// This version's own field declarations
    pub fields: Vec<DeclaredFieldInfo>,
}

/// A field of the merged (inherited plus own) field table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedField {
    pub name: String,
    #[serde(rename = "type")]
    pub declared_type: TypeExpr,
    pub parameterize: bool,
}

/// Ordered, name-unique field table of a schema version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldTable {
    fields: Vec<MergedField>,
}

impl FieldTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, replacing an existing entry of the same name in place.
    pub fn upsert(&mut self, field: MergedField) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
    }

    /// Get a field by name
    pub fn get(&self, name: &str) -> Option<&MergedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check if a field exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Fields in merged order
    pub fn iter(&self) -> impl Iterator<Item = &MergedField> {
        self.fields.iter()
    }

    /// Field names in merged order
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'a> IntoIterator for &'a FieldTable {
    type Item = &'a MergedField;
    type IntoIter = std::slice::Iter<'a, MergedField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Predicate evaluated against a fully assigned record
pub type NativeCheck =
    Arc<dyn Fn(&dyn FieldLookup) -> std::result::Result<bool, String> + Send + Sync>;

/// A constraint run after all fields of a record are assigned
#[derive(Clone)]
pub enum Constraint {
    /// `@check <expr>`, named by its source text
    Expr { source: String, expr: Expr },
    /// Named native predicate
    Native { name: String, check: NativeCheck },
}

impl Constraint {
    /// Create a named native constraint
    pub fn native<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&dyn FieldLookup) -> std::result::Result<bool, String> + Send + Sync + 'static,
    {
        Self::Native {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Name reported when the constraint fails
    pub fn name(&self) -> &str {
        match self {
            Constraint::Expr { source, .. } => source,
            Constraint::Native { name, .. } => name,
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Expr { source, .. } => f.debug_tuple("Expr").field(source).finish(),
            Constraint::Native { name, .. } => f.debug_tuple("Native").field(name).finish(),
        }
    }
}

/// A parsed declaration statement
#[derive(Debug, Clone)]
pub enum Statement {
    Field(DeclaredFieldInfo),
    Check(Constraint),
}

#[derive(Debug, Clone)]
enum PendingStatement {
    Source(String),
    Parsed(Statement),
}

/// Builder for a schema version declaration
///
/// Statements are collected in source order and parsed by [`parse`](Self::parse);
/// nothing is checked until then.
#[derive(Debug, Clone)]
pub struct SchemaDeclaration {
    schema_version: SchemaVersion,
    parent: Option<SchemaVersion>,
    record_name: Option<String>,
    statements: Vec<PendingStatement>,
}

impl SchemaDeclaration {
    /// Start a declaration of `schema_version`
    pub fn new(schema_version: SchemaVersion) -> Self {
        Self {
            schema_version,
            parent: None,
            record_name: None,
            statements: Vec::new(),
        }
    }

    /// Set the parent schema version
    pub fn extends(mut self, parent: SchemaVersion) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Set an explicit record type name
    pub fn record_name(mut self, name: impl Into<String>) -> Self {
        self.record_name = Some(name.into());
        self
    }

    /// Add a field or `@check` statement in source form
    pub fn statement(mut self, source: impl Into<String>) -> Self {
        self.statements.push(PendingStatement::Source(source.into()));
        self
    }

    /// Add several statements in source form
    pub fn statements<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statements
            .extend(sources.into_iter().map(|s| PendingStatement::Source(s.into())));
        self
    }

    /// Add an already built field
    pub fn field(mut self, field: DeclaredFieldInfo) -> Self {
        self.statements
            .push(PendingStatement::Parsed(Statement::Field(field)));
        self
    }

    /// Add a `@check` constraint from expression source
    pub fn check(self, source: impl AsRef<str>) -> Self {
        self.statement(format!("@check {}", source.as_ref()))
    }

    /// Add a named native constraint
    pub fn check_with<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&dyn FieldLookup) -> std::result::Result<bool, String> + Send + Sync + 'static,
    {
        self.statements
            .push(PendingStatement::Parsed(Statement::Check(Constraint::native(name, check))));
        self
    }

    pub fn schema_version(&self) -> &SchemaVersion {
        &self.schema_version
    }

    pub fn parent(&self) -> Option<&SchemaVersion> {
        self.parent.as_ref()
    }

    /// Parse and check every statement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Declaration`] for a malformed statement, a duplicate
    /// or reserved field name, a constraint preceding a field, a declaration
    /// with no fields, or a malformed record name.
    pub fn parse(&self) -> Result<ParsedDeclaration> {
        let sv = &self.schema_version;
        let mut fields: Vec<DeclaredFieldInfo> = Vec::new();
        let mut constraints: Vec<Constraint> = Vec::new();
        let mut seen = HashSet::new();

        for pending in &self.statements {
            let statement = match pending {
                PendingStatement::Source(source) => {
                    parse_statement(source).map_err(|e| Error::declaration(sv, e.to_string()))?
                }
                PendingStatement::Parsed(statement) => statement.clone(),
            };

            match statement {
                Statement::Field(field) => {
                    if let Some(first) = constraints.first() {
                        return Err(Error::declaration(
                            sv,
                            format!(
                                "field '{}' follows constraint '{}'; constraints must come after all fields",
                                field.name,
                                first.name()
                            ),
                        ));
                    }
                    check_field_name(sv, &field.name)?;
                    if !seen.insert(field.name.clone()) {
                        return Err(Error::declaration(
                            sv,
                            format!("field '{}' is declared more than once", field.name),
                        ));
                    }
                    fields.push(field);
                }
                Statement::Check(constraint) => constraints.push(constraint),
            }
        }

        if fields.is_empty() {
            return Err(Error::declaration(sv, "no fields declared"));
        }

        let record_name = match &self.record_name {
            Some(name) => {
                validate_record_name(name, sv)?;
                name.clone()
            }
            None => default_record_name(sv),
        };

        Ok(ParsedDeclaration {
            schema_version: sv.clone(),
            parent: self.parent.clone(),
            record_name,
            fields,
            constraints,
        })
    }
}

/// A declaration whose statements have been parsed and checked
#[derive(Debug, Clone)]
pub struct ParsedDeclaration {
    pub schema_version: SchemaVersion,
    pub parent: Option<SchemaVersion>,
    pub record_name: String,
    pub fields: Vec<DeclaredFieldInfo>,
    pub constraints: Vec<Constraint>,
}

impl ParsedDeclaration {
    /// Names of the constraints, in order
    pub fn constraint_names(&self) -> Vec<&str> {
        self.constraints.iter().map(Constraint::name).collect()
    }
}

fn check_field_name(sv: &SchemaVersion, name: &str) -> Result<()> {
    if name.starts_with(RESERVED_PREFIX) {
        return Err(Error::declaration(
            sv,
            format!("field name '{name}' uses the reserved prefix '{RESERVED_PREFIX}'"),
        ));
    }
    if !is_identifier(name) {
        return Err(Error::declaration(sv, format!("'{name}' is not a valid field name")));
    }
    Ok(())
}

/// Default record type name: CamelCased schema name plus `V<version>`.
///
/// `example.foo-bar` version 1 becomes `ExampleFooBarV1`.
pub fn default_record_name(sv: &SchemaVersion) -> String {
    let mut out = String::new();
    for segment in sv.name().as_str().split(['.', '-']) {
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    out.push_str(&format!("V{}", sv.version()));
    out
}

/// Check that an explicit record name is CamelCase and ends in `V<version>`.
///
/// # Errors
///
/// Returns [`Error::Declaration`] describing the expected form.
pub fn validate_record_name(name: &str, sv: &SchemaVersion) -> Result<()> {
    let suffix = format!("V{}", sv.version());
    let stem = name.strip_suffix(&suffix).unwrap_or("");
    let well_formed = stem.starts_with(|c: char| c.is_ascii_uppercase())
        && stem.chars().all(|c| c.is_ascii_alphanumeric());
    if well_formed {
        Ok(())
    } else {
        Err(Error::declaration(
            sv,
            format!("record name '{name}' must be CamelCase and end in '{suffix}'"),
        ))
    }
}
