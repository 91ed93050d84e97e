//! Schema version inheritance and field merge logic
//!
//! A schema version has at most one parent, so the ancestry is a simple
//! chain. A child may narrow the type of any field it shares with its parent,
//! add new fields, and inherits everything else unchanged.

use crate::model::{DeclaredFieldInfo, FieldTable, MergedField};
use crate::{Error, Result};
use rowspec_types::SchemaVersion;
use rowspec_types::identity::PARENT_SEPARATOR;
use tracing::trace;

/// Reject a parent that is another version of the child's own schema.
///
/// # Errors
///
/// Returns [`Error::IncompatibleInheritance`] when both share a name.
pub fn check_parent(child: &SchemaVersion, parent: &SchemaVersion) -> Result<()> {
    if child.name() == parent.name() {
        return Err(Error::incompatible(
            child,
            parent,
            "a schema version may not extend another version of the same schema",
        ));
    }
    Ok(())
}

/// Check that every field shared with the parent narrows the parent's type.
///
/// # Errors
///
/// Returns [`Error::IncompatibleInheritance`] naming the first field whose
/// declared type is not a subtype of the parent's.
pub fn check_compatibility(
    child: &SchemaVersion,
    parent: &SchemaVersion,
    parent_fields: &FieldTable,
    own_fields: &[DeclaredFieldInfo],
) -> Result<()> {
    for field in own_fields {
        let Some(inherited) = parent_fields.get(&field.name) else {
            continue;
        };
        trace!(
            field = %field.name,
            child_type = %field.declared_type,
            parent_type = %inherited.declared_type,
            "Checking inherited field"
        );
        if !field.declared_type.is_subtype(&inherited.declared_type) {
            return Err(Error::incompatible(
                child,
                parent,
                format!(
                    "field '{}' is declared as {} but the parent declares {}",
                    field.name, field.declared_type, inherited.declared_type
                ),
            ));
        }
    }
    Ok(())
}

/// Merge the parent's field table with the child's own fields.
///
/// Parent fields come first in their original order. A child field that
/// repeats a parent field replaces it in place; new child fields are appended
/// in declaration order.
pub fn merge_fields(parent_fields: Option<&FieldTable>, own_fields: &[DeclaredFieldInfo]) -> FieldTable {
    let mut merged = parent_fields.cloned().unwrap_or_default();
    for field in own_fields {
        merged.upsert(MergedField {
            name: field.name.clone(),
            declared_type: field.declared_type.clone(),
            parameterize: field.parameterize,
        });
    }
    merged
}

/// Qualified identifier of `child` given its parent's identifier.
pub fn qualified_identifier(child: &SchemaVersion, parent_identifier: Option<&str>) -> String {
    match parent_identifier {
        Some(parent) => format!("{child}{PARENT_SEPARATOR}{parent}"),
        None => child.to_string(),
    }
}
