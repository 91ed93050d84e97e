//! Record types and records

use crate::eval::evaluate;
use crate::functions::FunctionRegistry;
use crate::{ConstructionError, Error, Result};
use rowspec_schema::{Constraint, DeclaredFieldInfo, FieldTable, ParsedDeclaration};
use rowspec_types::{ColumnSchema, FieldLookup, FromValue, SchemaVersion, TypeExpr, Value, coerce};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::trace;

/// The generated record shape of one schema version
#[derive(Debug)]
pub struct RecordType {
    name: String,
    schema_version: SchemaVersion,
    identifier: String,
    fields: FieldTable,
    own_fields: Vec<DeclaredFieldInfo>,
    constraints: Vec<Constraint>,
    parent: Option<Arc<RecordType>>,
    functions: FunctionRegistry,
}

impl RecordType {
    /// Create a record type from a parsed declaration and its merged fields
    pub fn new(
        declaration: ParsedDeclaration,
        fields: FieldTable,
        identifier: impl Into<String>,
        parent: Option<Arc<RecordType>>,
    ) -> Self {
        Self {
            name: declaration.record_name,
            schema_version: declaration.schema_version,
            identifier: identifier.into(),
            fields,
            own_fields: declaration.fields,
            constraints: declaration.constraints,
            parent,
            functions: FunctionRegistry::new(),
        }
    }

    /// Use the given function registry for initializers and constraints
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    /// Record type name, e.g. `ExampleFooV1`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema_version(&self) -> &SchemaVersion {
        &self.schema_version
    }

    /// Qualified identifier, `child@v>parent@v>...`
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Merged field table
    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    /// Fields declared by this schema version itself
    pub fn own_fields(&self) -> &[DeclaredFieldInfo] {
        &self.own_fields
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn parent(&self) -> Option<&Arc<RecordType>> {
        self.parent.as_ref()
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Column layout a table of these records would have
    pub fn column_schema(&self) -> ColumnSchema {
        self.fields
            .iter()
            .fold(ColumnSchema::new(), |schema, field| {
                schema.with_column(field.name.clone(), field.declared_type.clone())
            })
    }

    /// Construct a record from named values; unnamed fields are missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::UnknownField`] for a name that is not a
    /// field, or any error from [`construct_from`](Self::construct_from).
    pub fn construct<I, K>(self: &Arc<Self>, args: I) -> Result<Record>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut supplied = HashMap::new();
        for (name, value) in args {
            let name = name.into();
            if !self.fields.contains(&name) {
                return Err(ConstructionError::UnknownField {
                    schema: self.schema_version.to_string(),
                    field: name,
                }
                .into());
            }
            supplied.insert(name, value);
        }
        self.build(&supplied)
    }

    /// Construct a record from any name-keyed row, ignoring names that are
    /// not fields.
    ///
    /// # Errors
    ///
    /// Returns a [`ConstructionError`] when an initializer fails, a value
    /// cannot be coerced to its declared type, or a constraint fails.
    pub fn construct_from(self: &Arc<Self>, row: &dyn FieldLookup) -> Result<Record> {
        self.build(row)
    }

    fn build(self: &Arc<Self>, args: &dyn FieldLookup) -> Result<Record> {
        trace!(schema = %self.schema_version, "Constructing record");

        let mut env: HashMap<String, Value> = self
            .fields
            .iter()
            .map(|f| {
                let value = args.get_field(&f.name).cloned().unwrap_or(Value::Missing);
                (f.name.clone(), value)
            })
            .collect();

        if let Some(parent) = &self.parent {
            let inherited = parent.build(args)?;
            // Redeclared fields start from the parent's value too.
            for (name, value) in inherited.fields() {
                env.insert(name.to_string(), value.clone());
            }
        }

        for field in &self.own_fields {
            let value = evaluate(&field.initializer, &env, &self.functions).map_err(|e| {
                ConstructionError::InitializerFailed {
                    schema: self.schema_version.to_string(),
                    field: field.name.clone(),
                    message: e.to_string(),
                }
            })?;
            let value = self.assign(field, value)?;
            env.insert(field.name.clone(), value);
        }

        let values: Vec<Value> = self
            .fields
            .iter()
            .map(|f| env.remove(&f.name).unwrap_or(Value::Missing))
            .collect();
        let type_parameters = self
            .fields
            .iter()
            .zip(&values)
            .filter(|(field, _)| field.parameterize)
            .map(|(field, value)| (field.name.clone(), value.type_of()))
            .collect();

        let record = Record {
            record_type: Arc::clone(self),
            values,
            type_parameters,
        };
        self.check_constraints(&record)?;
        Ok(record)
    }

    fn assign(&self, field: &DeclaredFieldInfo, value: Value) -> Result<Value> {
        let mismatch = |value: &Value| ConstructionError::TypeMismatch {
            schema: self.schema_version.to_string(),
            field: field.name.clone(),
            expected: field.declared_type.to_string(),
            found: value.type_of().to_string(),
            value: value.to_string(),
        };

        if field.parameterize {
            if value.type_of().is_subtype(&field.declared_type) {
                return Ok(value);
            }
            return Err(mismatch(&value).into());
        }

        coerce(value.clone(), &field.declared_type).map_err(|_| Error::from(mismatch(&value)))
    }

    fn check_constraints(&self, record: &Record) -> Result<()> {
        for constraint in &self.constraints {
            let outcome = match constraint {
                Constraint::Expr { expr, .. } => match evaluate(expr, record, &self.functions) {
                    Ok(Value::Bool(satisfied)) => Ok(satisfied),
                    Ok(other) => Err(format!(
                        "expected a Bool result, got {other} of type {}",
                        other.type_of()
                    )),
                    Err(e) => Err(e.to_string()),
                },
                Constraint::Native { check, .. } => check(record as &dyn FieldLookup),
            };

            match outcome {
                Ok(true) => {}
                Ok(false) => {
                    return Err(ConstructionError::ConstraintFailed {
                        schema: self.schema_version.to_string(),
                        constraint: constraint.name().to_string(),
                    }
                    .into());
                }
                Err(message) => {
                    return Err(ConstructionError::ConstraintErrored {
                        schema: self.schema_version.to_string(),
                        constraint: constraint.name().to_string(),
                        message,
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// An immutable row of a schema version
///
/// Two records are equal only when they belong to the same schema version
/// and hold equal values.
#[derive(Clone)]
pub struct Record {
    record_type: Arc<RecordType>,
    values: Vec<Value>,
    type_parameters: Vec<(String, TypeExpr)>,
}

impl Record {
    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record_type
    }

    pub fn schema_version(&self) -> &SchemaVersion {
        &self.record_type.schema_version
    }

    /// Value of a field
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.record_type
            .fields
            .iter()
            .position(|f| f.name == name)
            .map(|idx| &self.values[idx])
    }

    /// Typed value of a field
    ///
    /// # Errors
    ///
    /// Returns an error if there is no such field or the value does not fit `T`.
    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get(name).ok_or_else(|| ConstructionError::UnknownField {
            schema: self.schema_version().to_string(),
            field: name.to_string(),
        })?;
        Ok(value.get()?)
    }

    /// `(name, value)` pairs in field order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.record_type
            .fields
            .iter()
            .map(|f| f.name.as_str())
            .zip(&self.values)
    }

    /// Values in field order
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Owned `(name, value)` pairs, the flat form external writers consume
    pub fn to_pairs(&self) -> Vec<(String, Value)> {
        self.fields()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    /// Concrete type chosen for an open field
    pub fn type_parameter(&self, field: &str) -> Option<&TypeExpr> {
        self.type_parameters
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, ty)| ty)
    }

    /// Concrete types of all open fields, keyed by synthesized parameter name
    pub fn type_parameters(&self) -> Vec<(String, &TypeExpr)> {
        self.type_parameters
            .iter()
            .map(|(name, ty)| (format!("{}{name}", rowspec_schema::model::RESERVED_PREFIX), ty))
            .collect()
    }

    /// Render as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.fields()
                .map(|(name, value)| (name.to_string(), value.to_json()))
                .collect(),
        )
    }
}

impl FieldLookup for Record {
    fn get_field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema_version() == other.schema_version() && self.values == other.values
    }
}

impl Eq for Record {}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.schema_version().hash(state);
        self.values.hash(state);
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(&self.record_type.name);
        for (name, value) in self.fields() {
            s.field(name, value);
        }
        s.finish()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.record_type.name)?;
        for (i, (name, value)) in self.fields().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name} = {value}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowspec_schema::SchemaDeclaration;
    use rowspec_schema::inheritance::{merge_fields, qualified_identifier};
    use std::collections::HashSet;

    fn sv(name: &str, version: i64) -> SchemaVersion {
        SchemaVersion::new(name, version).unwrap()
    }

    fn generate(declaration: SchemaDeclaration, parent: Option<Arc<RecordType>>) -> Arc<RecordType> {
        let parsed = declaration.parse().unwrap();
        let fields = merge_fields(parent.as_ref().map(|p| p.fields()), &parsed.fields);
        let identifier = qualified_identifier(
            &parsed.schema_version,
            parent.as_ref().map(|p| p.identifier()),
        );
        Arc::new(RecordType::new(parsed, fields, identifier, parent))
    }

    fn construction_error(err: Error) -> ConstructionError {
        match err {
            Error::Construction(e) => e,
            other => panic!("expected construction error, got {other:?}"),
        }
    }

    #[test]
    fn test_construct_with_defaults_and_coercion() {
        let rt = generate(
            SchemaDeclaration::new(sv("example.foo", 1)).statements(["a::Int32", "b::Optional{String}", "c"]),
            None,
        );
        let record = rt.construct([("a", Value::Int64(7))]).unwrap();

        assert_eq!(record.get("a"), Some(&Value::Int32(7)));
        assert_eq!(record.get("b"), Some(&Value::Missing));
        assert_eq!(record.get("c"), Some(&Value::Missing));
        assert_eq!(record.get_as::<i32>("a").unwrap(), 7);
        assert_eq!(record.get_as::<Option<String>>("b").unwrap(), None);
        assert_eq!(rt.name(), "ExampleFooV1");
        assert_eq!(record.to_string(), "ExampleFooV1(a = 7, b = missing, c = missing)");
    }

    #[test]
    fn test_type_mismatch_names_field() {
        let rt = generate(SchemaDeclaration::new(sv("x", 1)).statement("n::Int64"), None);
        let err = construction_error(rt.construct([("n", Value::from("12"))]).unwrap_err());
        assert_eq!(
            err,
            ConstructionError::TypeMismatch {
                schema: "x@1".into(),
                field: "n".into(),
                expected: "Int64".into(),
                found: "String".into(),
                value: "\"12\"".into(),
            }
        );
        assert_eq!(err.field(), Some("n"));
    }

    #[test]
    fn test_missing_for_required_field_is_mismatch() {
        let rt = generate(SchemaDeclaration::new(sv("x", 1)).statement("n::Int64"), None);
        let err = construction_error(rt.construct(Vec::<(String, Value)>::new()).unwrap_err());
        assert!(matches!(err, ConstructionError::TypeMismatch { ref found, .. } if found == "Missing"));
    }

    #[test]
    fn test_initializers_run_in_order() {
        let rt = generate(
            SchemaDeclaration::new(sv("x", 1)).statements([
                "a::Int64 = coalesce(a, 1)",
                "b::Float64 = a * 2",
                "label::String = uppercase(coalesce(label, \"none\"))",
            ]),
            None,
        );
        let record = rt.construct([("label", Value::from("hi"))]).unwrap();
        assert_eq!(record.get("a"), Some(&Value::Int64(1)));
        assert_eq!(record.get("b"), Some(&Value::Float64(2.0)));
        assert_eq!(record.get("label"), Some(&Value::from("HI")));
    }

    #[test]
    fn test_initializer_failure() {
        let rt = generate(SchemaDeclaration::new(sv("x", 1)).statement("a = nope(a)"), None);
        let err = construction_error(rt.construct([("a", Value::Int64(1))]).unwrap_err());
        assert!(matches!(err, ConstructionError::InitializerFailed { ref field, .. } if field == "a"));
    }

    #[test]
    fn test_unknown_field_rejected_but_ignored_by_construct_from() {
        let rt = generate(SchemaDeclaration::new(sv("x", 1)).statement("a"), None);
        let err = construction_error(rt.construct([("zzz", Value::Int64(1))]).unwrap_err());
        assert!(matches!(err, ConstructionError::UnknownField { .. }));

        let row = vec![
            ("a".to_string(), Value::Int64(1)),
            ("zzz".to_string(), Value::Int64(2)),
        ];
        let record = rt.construct_from(&row).unwrap();
        assert_eq!(record.to_pairs(), vec![("a".to_string(), Value::Int64(1))]);
    }

    #[test]
    fn test_open_field_keeps_runtime_type() {
        let rt = generate(SchemaDeclaration::new(sv("x", 1)).statement("v::(<:Real)"), None);
        let a = rt.construct([("v", Value::Int32(1))]).unwrap();
        let b = rt.construct([("v", Value::Float64(1.5))]).unwrap();

        assert_eq!(a.get("v"), Some(&Value::Int32(1)));
        assert_eq!(a.type_parameter("v"), Some(&TypeExpr::Int32));
        assert_eq!(b.type_parameter("v"), Some(&TypeExpr::Float64));
        assert_eq!(a.type_parameters(), vec![("_v".to_string(), &TypeExpr::Int32)]);

        let err = construction_error(rt.construct([("v", Value::from("1"))]).unwrap_err());
        assert!(matches!(err, ConstructionError::TypeMismatch { .. }));
    }

    #[test]
    fn test_constraints() {
        let rt = generate(
            SchemaDeclaration::new(sv("x", 1))
                .statements(["a::Int64", "b::Optional{Int64}"])
                .check("a > 0")
                .check("b")
                .check_with("never", |_| Ok(false)),
            None,
        );

        let err = construction_error(rt.construct([("a", Value::Int64(0))]).unwrap_err());
        assert_eq!(
            err,
            ConstructionError::ConstraintFailed {
                schema: "x@1".into(),
                constraint: "a > 0".into(),
            }
        );

        let err = construction_error(rt.construct([("a", Value::Int64(1))]).unwrap_err());
        assert!(matches!(err, ConstructionError::ConstraintErrored { ref constraint, .. } if constraint == "b"));

        let err = construction_error(
            rt.construct([("a", Value::Int64(1)), ("b", Value::Bool(true))])
                .unwrap_err(),
        );
        assert!(matches!(err, ConstructionError::TypeMismatch { .. }));
    }

    #[test]
    fn test_native_constraint_sees_record() {
        let rt = generate(
            SchemaDeclaration::new(sv("x", 1))
                .statements(["lo::Int64", "hi::Int64"])
                .check_with("ordered", |row| {
                    let lo = row.get_field("lo").and_then(Value::as_i128);
                    let hi = row.get_field("hi").and_then(Value::as_i128);
                    match (lo, hi) {
                        (Some(lo), Some(hi)) => Ok(lo <= hi),
                        _ => Err("bounds missing".to_string()),
                    }
                }),
            None,
        );
        assert!(rt.construct([("lo", Value::Int64(1)), ("hi", Value::Int64(2))]).is_ok());
        let err = construction_error(
            rt.construct([("lo", Value::Int64(3)), ("hi", Value::Int64(2))])
                .unwrap_err(),
        );
        assert!(matches!(err, ConstructionError::ConstraintFailed { ref constraint, .. } if constraint == "ordered"));
    }

    #[test]
    fn test_child_inherits_parent_initializers() {
        let parent = generate(
            SchemaDeclaration::new(sv("base", 1)).statements(["x::Integer", "y::Int64 = x + 1"]),
            None,
        );
        let child = generate(
            SchemaDeclaration::new(sv("child", 1))
                .extends(sv("base", 1))
                .statements(["x::Int64 = x * 10", "z::String = string(y)"]),
            Some(Arc::clone(&parent)),
        );

        assert_eq!(child.identifier(), "child@1>base@1");
        assert_eq!(child.fields().names(), vec!["x", "y", "z"]);

        let record = child.construct([("x", Value::Int64(2))]).unwrap();
        assert_eq!(record.get("x"), Some(&Value::Int64(20)));
        assert_eq!(record.get("y"), Some(&Value::Int64(3)));
        assert_eq!(record.get("z"), Some(&Value::from("3")));
    }

    #[test]
    fn test_parent_constraints_apply_to_child() {
        let parent = generate(
            SchemaDeclaration::new(sv("base", 1)).statement("x::Int64").check("x >= 0"),
            None,
        );
        let child = generate(
            SchemaDeclaration::new(sv("child", 1)).extends(sv("base", 1)).statement("y"),
            Some(parent),
        );
        let err = construction_error(child.construct([("x", Value::Int64(-1))]).unwrap_err());
        assert!(matches!(err, ConstructionError::ConstraintFailed { ref schema, .. } if schema == "base@1"));
    }

    #[test]
    fn test_redeclared_field_starts_from_parent_value() {
        let parent = generate(
            SchemaDeclaration::new(sv("base", 1))
                .statements(["name::String = lowercase(name)", "x::Integer = coalesce(x, 0)"])
                .check("name == lowercase(name)"),
            None,
        );
        let child = generate(
            SchemaDeclaration::new(sv("child", 1))
                .extends(sv("base", 1))
                .statements(["name::String", "x::Int64"]),
            Some(parent),
        );

        let record = child.construct([("name", Value::from("ABC"))]).unwrap();
        assert_eq!(record.get("name"), Some(&Value::from("abc")));
        assert_eq!(record.get("x"), Some(&Value::Int64(0)));
    }

    #[test]
    fn test_record_equality_includes_schema_version() {
        let one = generate(SchemaDeclaration::new(sv("a", 1)).statement("v::Int64"), None);
        let other = generate(SchemaDeclaration::new(sv("b", 1)).statement("v::Int64"), None);

        let r1 = one.construct([("v", Value::Int64(5))]).unwrap();
        let r2 = one.construct([("v", Value::Int64(5))]).unwrap();
        let r3 = other.construct([("v", Value::Int64(5))]).unwrap();

        assert_eq!(r1, r2);
        assert_ne!(r1, r3);

        let set: HashSet<Record> = [r1, r2, r3].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_column_schema_and_json() {
        let rt = generate(
            SchemaDeclaration::new(sv("x", 1)).statements(["a::Int64", "b::Optional{String}"]),
            None,
        );
        let columns = rt.column_schema();
        assert_eq!(columns.names(), vec!["a", "b"]);

        let record = rt.construct([("a", Value::Int64(1))]).unwrap();
        assert_eq!(record.to_json(), serde_json::json!({"a": 1, "b": null}));
    }
}
