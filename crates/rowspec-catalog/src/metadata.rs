//! Schema identity in columnar file metadata
//!
//! Writers of record tables store the governing identifier under
//! [`SCHEMA_METADATA_KEY`]; readers recover the declaration from it.

use crate::catalog::Catalog;
use crate::entry::DeclarationEntry;
use crate::{Error, Result};
use rowspec_types::parse_identifier;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Metadata key holding the qualified identifier
pub const SCHEMA_METADATA_KEY: &str = "rowspec_schema_qualified";

/// Store `identifier` under the well-known key, replacing any previous value
pub fn attach_schema_metadata(metadata: &mut HashMap<String, String>, identifier: &str) {
    metadata.insert(SCHEMA_METADATA_KEY.to_string(), identifier.to_string());
}

/// Identifier stored in `metadata`, if any
pub fn schema_metadata(metadata: &HashMap<String, String>) -> Option<&str> {
    metadata.get(SCHEMA_METADATA_KEY).map(String::as_str)
}

impl Catalog {
    /// Store the identifier of a declared schema version in `metadata`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSchemaVersion`] when it has not been declared.
    pub fn attach_metadata(
        &self,
        metadata: &mut HashMap<String, String>,
        schema_version: &rowspec_types::SchemaVersion,
    ) -> Result<()> {
        let entry = self.lookup(schema_version)?;
        attach_schema_metadata(metadata, entry.identifier());
        Ok(())
    }

    /// Declaration that governs data carrying `metadata`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownSchemaVersion`] when the key is absent or names
    /// a version not declared here, a parse error for a malformed identifier,
    /// and [`Error::RedeclarationConflict`] when the version is declared with
    /// a different ancestry than the data was written under.
    pub fn governing_schema_version(&self, metadata: &HashMap<String, String>) -> Result<Arc<DeclarationEntry>> {
        let Some(identifier) = schema_metadata(metadata) else {
            return Err(Error::UnknownSchemaVersion {
                schema_version: None,
                owner: None,
            });
        };

        let chain = parse_identifier(identifier)?;
        let Some(governing) = chain.first() else {
            return Err(Error::UnknownSchemaVersion {
                schema_version: Some(identifier.to_string()),
                owner: None,
            });
        };

        let entry = self.lookup(governing)?;
        if entry.identifier() != identifier {
            warn!(
                stored = %identifier,
                declared = %entry.identifier(),
                "Data was written under a different ancestry"
            );
            return Err(Error::RedeclarationConflict {
                schema_version: governing.to_string(),
                message: format!(
                    "data was written as {identifier} but this process declares {}",
                    entry.identifier()
                ),
            });
        }
        Ok(entry)
    }
}
