//! Declaration document loading
//!
//! A declaration document names the owning package and lists schema versions
//! in statement form:
//!
//! ```yaml
//! owner:
//!   name: Acme
//!   version: "1.2.0"
//! schemas:
//!   - name: acme.base
//!     version: 1
//!     statements: ["id::UUID", "label::Optional{String}"]
//!   - name: acme.event
//!     version: 2
//!     extends: acme.base@1
//!     statements: ["id::UUID", "at::DateTime", "@check !ismissing(at)"]
//! ```

use crate::model::SchemaDeclaration;
use crate::registry::Owner;
use crate::{Error, Result};
use rowspec_types::SchemaVersion;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// One schema version entry of a declaration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaFile {
    pub name: String,
    pub version: i64,
    /// Parent identity, `name@version`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_name: Option<String>,
    #[serde(default)]
    pub statements: Vec<String>,
}

impl SchemaFile {
    /// Schema version this entry declares
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or negative version.
    pub fn schema_version(&self) -> Result<SchemaVersion> {
        Ok(SchemaVersion::new(&self.name, self.version)?)
    }

    /// Parent schema version, if any
    ///
    /// # Errors
    ///
    /// Returns an error when `extends` is not a single `name@version`.
    pub fn parent(&self) -> Result<Option<SchemaVersion>> {
        self.extends
            .as_deref()
            .map(|s| s.parse::<SchemaVersion>().map_err(Error::from))
            .transpose()
    }

    /// Build the declaration builder for this entry
    ///
    /// # Errors
    ///
    /// Returns an error when the identity or parent is malformed.
    pub fn to_declaration(&self) -> Result<SchemaDeclaration> {
        let mut declaration =
            SchemaDeclaration::new(self.schema_version()?).statements(self.statements.iter().cloned());
        if let Some(parent) = self.parent()? {
            declaration = declaration.extends(parent);
        }
        if let Some(record_name) = &self.record_name {
            declaration = declaration.record_name(record_name.clone());
        }
        Ok(declaration)
    }
}

/// A parsed declaration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclarationDocument {
    pub owner: Owner,
    #[serde(default)]
    pub schemas: Vec<SchemaFile>,
}

impl DeclarationDocument {
    /// Declarations in an order where parents from the same document come
    /// before their children; otherwise document order is kept.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed entry or a parent cycle inside the
    /// document.
    pub fn declarations(&self) -> Result<Vec<SchemaDeclaration>> {
        let mut pending: Vec<SchemaDeclaration> = self
            .schemas
            .iter()
            .map(SchemaFile::to_declaration)
            .collect::<Result<_>>()?;
        let local: HashSet<SchemaVersion> =
            pending.iter().map(|d| d.schema_version().clone()).collect();

        let mut ordered = Vec::with_capacity(pending.len());
        let mut placed: HashSet<SchemaVersion> = HashSet::new();

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for declaration in pending {
                let ready = declaration
                    .parent()
                    .is_none_or(|p| !local.contains(p) || placed.contains(p));
                if ready {
                    placed.insert(declaration.schema_version().clone());
                    ordered.push(declaration);
                } else {
                    deferred.push(declaration);
                }
            }
            if deferred.len() == before {
                let stuck: Vec<String> = deferred
                    .iter()
                    .map(|d| d.schema_version().to_string())
                    .collect();
                return Err(Error::InvalidFormat(format!(
                    "parent cycle between {}",
                    stuck.join(", ")
                )));
            }
            pending = deferred;
        }

        Ok(ordered)
    }
}

/// Loader for declaration documents
#[derive(Debug, Clone, Default)]
pub struct DeclarationLoader {
    search_paths: Vec<PathBuf>,
}

impl DeclarationLoader {
    /// Create a loader with the given search paths
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Add a search path
    pub fn add_path(&mut self, path: PathBuf) {
        self.search_paths.push(path);
    }

    /// Find `<stem>.yaml`, `<stem>.yml` or `<stem>.json` in the search paths
    /// and load it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if no such file exists, or any load error.
    pub fn load(&self, stem: &str) -> Result<DeclarationDocument> {
        for path in &self.search_paths {
            for extension in EXTENSIONS {
                let candidate = path.join(format!("{stem}.{extension}"));
                if candidate.exists() {
                    trace!("Found declaration file: {:?}", candidate);
                    return self.load_from_file(&candidate);
                }
            }
        }
        Err(Error::InvalidFormat(format!(
            "declaration document '{}' not found in search paths: {:?}",
            stem, self.search_paths
        )))
    }

    /// Load a document from a file; `.yaml`/`.yml` are read as YAML,
    /// anything else as JSON.
    ///
    /// # Errors
    ///
    /// Returns an IO error or [`Error::InvalidFormat`].
    pub fn load_from_file(&self, path: &Path) -> Result<DeclarationDocument> {
        trace!("Loading declarations from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;

        let is_yaml = path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml");
        let document = if is_yaml {
            self.load_from_yaml(&content)?
        } else {
            self.load_from_json(&content)?
        };
        debug!(
            path = %path.display(),
            owner = %document.owner,
            schemas = document.schemas.len(),
            "Loaded declaration document"
        );
        Ok(document)
    }

    /// Load a document from a JSON string
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] on malformed JSON.
    pub fn load_from_json(&self, json: &str) -> Result<DeclarationDocument> {
        serde_json::from_str(json).map_err(|e| Error::InvalidFormat(format!("JSON parse error: {e}")))
    }

    /// Load a document from a YAML string
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] on malformed YAML.
    pub fn load_from_yaml(&self, yaml: &str) -> Result<DeclarationDocument> {
        serde_yaml::from_str(yaml).map_err(|e| Error::InvalidFormat(format!("YAML parse error: {e}")))
    }
}
