//! Declaration store and schema-version-keyed operations
//!
//! Declaring a schema version is a write to shared state: name registration,
//! the parent and compatibility checks, the merge, and the insert all happen
//! under one write lock. Stored entries are immutable, so every read hands
//! out a shared `Arc<DeclarationEntry>`.

use crate::config::CatalogConfig;
use crate::entry::DeclarationEntry;
use crate::{Error, Result};
use rowspec_record::{FunctionRegistry, Record, RecordType};
use rowspec_schema::inheritance::{check_compatibility, check_parent, merge_fields, qualified_identifier};
use rowspec_schema::{Declaration, DeclarationDocument, FieldTable, NameRegistry, Owner, SchemaDeclaration};
use rowspec_types::{ColumnSchema, ColumnTypes, FieldLookup, SchemaName, SchemaVersion, TypeExpr, Value};
use rowspec_validation::{ComplianceValidator, Violation, WideningRules};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct CatalogState {
    names: NameRegistry,
    entries: HashMap<SchemaVersion, Arc<DeclarationEntry>>,
}

impl CatalogState {
    fn unknown(&self, schema_version: &SchemaVersion) -> Error {
        Error::unknown(schema_version, self.names.owner_of(schema_version.name()).cloned())
    }
}

/// Process-wide catalog of declared schema versions
///
/// Clones share the same store, widenings, and functions.
#[derive(Debug, Clone)]
pub struct Catalog {
    state: Arc<RwLock<CatalogState>>,
    config: CatalogConfig,
    validator: ComplianceValidator,
    functions: FunctionRegistry,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Create an empty catalog with the built-in initializer functions
    pub fn new() -> Self {
        Self::with_config(CatalogConfig::default())
    }

    pub fn with_config(config: CatalogConfig) -> Self {
        let validator = ComplianceValidator::new()
            .with_config(config.validation.clone())
            .with_widenings(Arc::new(WideningRules::new()));
        Self {
            state: Arc::new(RwLock::new(CatalogState::default())),
            config,
            validator,
            functions: FunctionRegistry::new(),
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Functions available to initializers and constraints of every record
    /// type in this catalog
    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, CatalogState>> {
        self.state
            .read()
            .map_err(|_| Error::Lock("declaration store".to_string()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, CatalogState>> {
        self.state
            .write()
            .map_err(|_| Error::Lock("declaration store".to_string()))
    }

    /// Register `name` to `owner`; idempotent for the same owner.
    ///
    /// # Errors
    ///
    /// Returns a naming collision when another owner holds the name.
    pub fn register_name(&self, name: &SchemaName, owner: &Owner) -> Result<()> {
        self.write_state()?.names.register(name, owner)?;
        Ok(())
    }

    pub fn owner_of(&self, name: &SchemaName) -> Result<Option<Owner>> {
        Ok(self.read_state()?.names.owner_of(name).cloned())
    }

    /// Declare a schema version.
    ///
    /// Re-declaring an identical declaration returns the stored entry;
    /// nothing is stored when any check fails.
    ///
    /// # Errors
    ///
    /// Returns a declaration error for malformed statements or an
    /// unregistered schema name, [`Error::UnknownSchemaVersion`] for an
    /// undeclared parent, an incompatible-inheritance error, or
    /// [`Error::RedeclarationConflict`].
    pub fn declare(&self, declaration: &SchemaDeclaration) -> Result<Arc<DeclarationEntry>> {
        let parsed = declaration.parse()?;
        let sv = parsed.schema_version.clone();

        let mut state = self.write_state()?;

        let register_as = if state.names.contains(sv.name()) {
            None
        } else {
            match &self.config.auto_register_owner {
                Some(owner) => Some(owner),
                None => {
                    return Err(rowspec_schema::Error::declaration(
                        &sv,
                        format!("schema name '{}' has not been registered", sv.name()),
                    )
                    .into());
                }
            }
        };

        if let Some(existing) = state.entries.get(&sv) {
            if existing.parent != parsed.parent {
                warn!(schema_version = %sv, "Conflicting re-declaration rejected");
                return Err(Error::RedeclarationConflict {
                    schema_version: sv.to_string(),
                    message: existing.describe_parent_difference(parsed.parent.as_ref()),
                });
            }
        }

        let parent = match &parsed.parent {
            Some(parent_sv) => {
                check_parent(&sv, parent_sv)?;
                let parent = state
                    .entries
                    .get(parent_sv)
                    .cloned()
                    .ok_or_else(|| state.unknown(parent_sv))?;
                check_compatibility(&sv, parent_sv, &parent.fields, &parsed.fields)?;
                Some(parent)
            }
            None => None,
        };

        let fields = merge_fields(parent.as_ref().map(|p| &p.fields), &parsed.fields);
        let identifier = qualified_identifier(&sv, parent.as_ref().map(|p| p.identifier()));
        let stored = Declaration {
            identifier: identifier.clone(),
            fields: parsed.fields.clone(),
        };

        if let Some(existing) = state.entries.get(&sv) {
            if existing.is_same_declaration(&stored, &parsed) {
                debug!(schema_version = %sv, "Identical re-declaration ignored");
                return Ok(Arc::clone(existing));
            }
            warn!(schema_version = %sv, "Conflicting re-declaration rejected");
            return Err(Error::RedeclarationConflict {
                schema_version: sv.to_string(),
                message: existing.describe_difference(&stored, &parsed),
            });
        }

        let record_name = parsed.record_name.clone();
        let constraints = parsed
            .constraint_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let parent_sv = parsed.parent.clone();
        let record_type = RecordType::new(
            parsed,
            fields.clone(),
            identifier.clone(),
            parent.as_ref().map(|p| Arc::clone(&p.record_type)),
        )
        .with_functions(self.functions.clone());

        let entry = Arc::new(DeclarationEntry {
            schema_version: sv.clone(),
            parent: parent_sv,
            fields,
            declaration: stored,
            record_name,
            constraints,
            record_type: Arc::new(record_type),
        });
        if let Some(owner) = register_as {
            state.names.register(sv.name(), owner)?;
        }
        state.entries.insert(sv, Arc::clone(&entry));

        info!(identifier = %identifier, fields = entry.fields.len(), "Declared schema version");
        Ok(entry)
    }

    /// Register every schema name in `document` to its owner, then declare
    /// its schema versions parents first.
    ///
    /// # Errors
    ///
    /// Returns the first registration or declaration error. Versions
    /// declared before the error stay declared.
    pub fn load_document(&self, document: &DeclarationDocument) -> Result<Vec<SchemaVersion>> {
        let declarations = document.declarations()?;
        for declaration in &declarations {
            self.register_name(declaration.schema_version().name(), &document.owner)?;
        }

        let mut declared = Vec::with_capacity(declarations.len());
        for declaration in &declarations {
            declared.push(self.declare(declaration)?.schema_version.clone());
        }
        debug!(owner = %document.owner, count = declared.len(), "Loaded declaration document");
        Ok(declared)
    }

    /// Stored entry of `schema_version`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSchemaVersion`] when it has not been declared.
    pub fn lookup(&self, schema_version: &SchemaVersion) -> Result<Arc<DeclarationEntry>> {
        let state = self.read_state()?;
        match state.entries.get(schema_version) {
            Some(entry) => Ok(Arc::clone(entry)),
            None => {
                debug!(schema_version = %schema_version, "Lookup of undeclared schema version");
                Err(state.unknown(schema_version))
            }
        }
    }

    pub fn is_declared(&self, schema_version: &SchemaVersion) -> Result<bool> {
        Ok(self.read_state()?.entries.contains_key(schema_version))
    }

    /// Declared versions of one schema name, ascending
    pub fn declared_versions(&self, name: &SchemaName) -> Result<Vec<SchemaVersion>> {
        let state = self.read_state()?;
        let mut versions: Vec<SchemaVersion> = state
            .entries
            .keys()
            .filter(|sv| sv.name() == name)
            .cloned()
            .collect();
        versions.sort();
        Ok(versions)
    }

    /// Every declared schema version, sorted
    pub fn schema_versions(&self) -> Result<Vec<SchemaVersion>> {
        let mut versions: Vec<SchemaVersion> = self.read_state()?.entries.keys().cloned().collect();
        versions.sort();
        Ok(versions)
    }

    pub fn identifier(&self, schema_version: &SchemaVersion) -> Result<String> {
        Ok(self.lookup(schema_version)?.identifier().to_string())
    }

    pub fn parent(&self, schema_version: &SchemaVersion) -> Result<Option<SchemaVersion>> {
        Ok(self.lookup(schema_version)?.parent.clone())
    }

    /// `schema_version` followed by its ancestors, nearest first
    pub fn parent_chain(&self, schema_version: &SchemaVersion) -> Result<Vec<SchemaVersion>> {
        let state = self.read_state()?;
        let mut chain = Vec::new();
        let mut current = Some(schema_version.clone());
        while let Some(sv) = current {
            let entry = state.entries.get(&sv).ok_or_else(|| state.unknown(&sv))?;
            current = entry.parent.clone();
            chain.push(sv);
        }
        Ok(chain)
    }

    pub fn merged_fields(&self, schema_version: &SchemaVersion) -> Result<FieldTable> {
        Ok(self.lookup(schema_version)?.fields.clone())
    }

    pub fn declaration(&self, schema_version: &SchemaVersion) -> Result<Declaration> {
        Ok(self.lookup(schema_version)?.declaration.clone())
    }

    pub fn record_type(&self, schema_version: &SchemaVersion) -> Result<Arc<RecordType>> {
        Ok(Arc::clone(&self.lookup(schema_version)?.record_type))
    }

    /// Column layout of a table of records of `schema_version`
    pub fn column_schema(&self, schema_version: &SchemaVersion) -> Result<ColumnSchema> {
        Ok(self.lookup(schema_version)?.record_type.column_schema())
    }

    /// Register a custom widening for a named type. The first owner to
    /// widen a type owns it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-named type or a foreign owner.
    pub fn register_widening(&self, declared: TypeExpr, accepted: TypeExpr, owner: &Owner) -> Result<()> {
        self.validator.widenings().register(declared, accepted, owner)?;
        Ok(())
    }

    /// Accepted column type of a declared field type, custom widenings included
    pub fn accepted_type(&self, declared: &TypeExpr) -> TypeExpr {
        self.validator.widenings().accepted_type(declared)
    }

    /// First violation of `columns` against `schema_version`, if any.
    ///
    /// # Errors
    ///
    /// Only [`Error::UnknownSchemaVersion`]; violations are data.
    pub fn find_violation(
        &self,
        columns: &dyn ColumnTypes,
        schema_version: &SchemaVersion,
    ) -> Result<Option<Violation>> {
        let entry = self.lookup(schema_version)?;
        Ok(self.validator.find_violation(columns, &entry.fields))
    }

    /// Every violation of `columns` against `schema_version`, in field order.
    pub fn find_violations(&self, columns: &dyn ColumnTypes, schema_version: &SchemaVersion) -> Result<Vec<Violation>> {
        let entry = self.lookup(schema_version)?;
        Ok(self.validator.find_violations(columns, &entry.fields))
    }

    /// # Errors
    ///
    /// Returns [`Error::ComplianceViolation`] listing every violation.
    pub fn validate(&self, columns: &dyn ColumnTypes, schema_version: &SchemaVersion) -> Result<()> {
        let entry = self.lookup(schema_version)?;
        self.validator.validate(columns, &entry.fields, schema_version)?;
        Ok(())
    }

    pub fn complies_with(&self, columns: &dyn ColumnTypes, schema_version: &SchemaVersion) -> Result<bool> {
        Ok(self.find_violation(columns, schema_version)?.is_none())
    }

    /// Construct a record of `schema_version` from named values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSchemaVersion`] or the construction error.
    pub fn construct<I, K>(&self, schema_version: &SchemaVersion, args: I) -> Result<Record>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Ok(self.record_type(schema_version)?.construct(args)?)
    }

    /// Construct a record of `schema_version` from a row, ignoring extra names.
    pub fn construct_from(&self, schema_version: &SchemaVersion, row: &dyn FieldLookup) -> Result<Record> {
        Ok(self.record_type(schema_version)?.construct_from(row)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sv(name: &str, version: i64) -> SchemaVersion {
        SchemaVersion::new(name, version).unwrap()
    }

    fn catalog() -> Catalog {
        Catalog::with_config(CatalogConfig::default().with_auto_register(Owner::new("Test")))
    }

    #[test]
    fn test_declare_requires_registered_name() {
        let catalog = Catalog::new();
        let err = catalog
            .declare(&SchemaDeclaration::new(sv("test.a", 1)).statement("x::Int64"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Schema(rowspec_schema::Error::Declaration { .. })
        ));
        assert!(!catalog.is_declared(&sv("test.a", 1)).unwrap());

        catalog
            .register_name(sv("test.a", 1).name(), &Owner::new("Test"))
            .unwrap();
        catalog
            .declare(&SchemaDeclaration::new(sv("test.a", 1)).statement("x::Int64"))
            .unwrap();
        assert!(catalog.is_declared(&sv("test.a", 1)).unwrap());
    }

    #[test]
    fn test_auto_register_records_owner() {
        let catalog = catalog();
        catalog
            .declare(&SchemaDeclaration::new(sv("test.a", 1)).statement("x"))
            .unwrap();
        assert_eq!(
            catalog.owner_of(sv("test.a", 1).name()).unwrap(),
            Some(Owner::new("Test"))
        );
    }

    #[test]
    fn test_redeclaration() {
        let catalog = catalog();
        let decl = SchemaDeclaration::new(sv("test.a", 1)).statements(["x::Int64", "y = x + 1"]);
        let first = catalog.declare(&decl).unwrap();
        let again = catalog.declare(&decl.clone()).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let changed = SchemaDeclaration::new(sv("test.a", 1)).statements(["x::Int64", "y = x + 2"]);
        assert!(matches!(
            catalog.declare(&changed),
            Err(Error::RedeclarationConflict { .. })
        ));

        let with_check = decl.clone().check("x > 0");
        assert!(matches!(
            catalog.declare(&with_check),
            Err(Error::RedeclarationConflict { .. })
        ));
        assert_eq!(catalog.lookup(&sv("test.a", 1)).unwrap().constraints.len(), 0);
    }

    #[test]
    fn test_redeclaration_with_undeclared_parent_conflicts() {
        let catalog = catalog();
        catalog
            .declare(&SchemaDeclaration::new(sv("test.a", 1)).statement("x"))
            .unwrap();

        let reparented = SchemaDeclaration::new(sv("test.a", 1))
            .extends(sv("test.missing", 1))
            .statement("x");
        let Err(Error::RedeclarationConflict { message, .. }) = catalog.declare(&reparented) else {
            panic!("expected a redeclaration conflict");
        };
        assert_eq!(message, "stored parent is none, new one is test.missing@1");
        assert_eq!(catalog.parent(&sv("test.a", 1)).unwrap(), None);
    }

    #[test]
    fn test_undeclared_parent_is_unknown() {
        let catalog = catalog();
        let decl = SchemaDeclaration::new(sv("test.b", 1))
            .extends(sv("test.a", 1))
            .statement("x");
        assert!(matches!(
            catalog.declare(&decl),
            Err(Error::UnknownSchemaVersion { .. })
        ));
        assert!(!catalog.is_declared(&sv("test.b", 1)).unwrap());
        assert_eq!(catalog.owner_of(sv("test.b", 1).name()).unwrap(), None);
    }

    #[test]
    fn test_lookup_miss_names_owner() {
        let catalog = catalog();
        catalog
            .declare(&SchemaDeclaration::new(sv("test.a", 1)).statement("x"))
            .unwrap();

        let Err(Error::UnknownSchemaVersion { schema_version, owner }) = catalog.lookup(&sv("test.a", 2)) else {
            panic!("expected an unknown schema version");
        };
        assert_eq!(schema_version.as_deref(), Some("test.a@2"));
        assert_eq!(owner, Some(Owner::new("Test")));

        let Err(Error::UnknownSchemaVersion { owner, .. }) = catalog.lookup(&sv("test.zzz", 1)) else {
            panic!("expected an unknown schema version");
        };
        assert_eq!(owner, None);
    }

    #[test]
    fn test_parent_chain_and_versions() {
        let catalog = catalog();
        catalog
            .declare(&SchemaDeclaration::new(sv("test.a", 1)).statement("x"))
            .unwrap();
        catalog
            .declare(&SchemaDeclaration::new(sv("test.a", 2)).statement("x"))
            .unwrap();
        catalog
            .declare(
                &SchemaDeclaration::new(sv("test.b", 1))
                    .extends(sv("test.a", 2))
                    .statement("y"),
            )
            .unwrap();

        assert_eq!(
            catalog.parent_chain(&sv("test.b", 1)).unwrap(),
            vec![sv("test.b", 1), sv("test.a", 2)]
        );
        assert_eq!(
            catalog.declared_versions(sv("test.a", 1).name()).unwrap(),
            vec![sv("test.a", 1), sv("test.a", 2)]
        );
        assert_eq!(catalog.schema_versions().unwrap().len(), 3);
        assert_eq!(catalog.parent(&sv("test.b", 1)).unwrap(), Some(sv("test.a", 2)));
    }
}
