//! Schema name registry
//!
//! Every schema name is owned by exactly one package. A name must be
//! registered before any version of it can be declared.

use crate::{Error, Result};
use rowspec_types::SchemaName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// The package that owns a set of schema names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    /// Package name
    pub name: String,
    /// Package version, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Owner {
    /// Create an owner without version information
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }

    /// Attach a package version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} {}", self.name, version),
            None => f.write_str(&self.name),
        }
    }
}

/// Registry mapping schema names to their owners
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    owners: HashMap<SchemaName, Owner>,
}

impl NameRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` as owned by `owner`.
    ///
    /// Registering a name again for the same owner is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NamingCollision`] if a different owner already holds
    /// the name.
    pub fn register(&mut self, name: &SchemaName, owner: &Owner) -> Result<()> {
        match self.owners.get(name) {
            Some(existing) if existing == owner => Ok(()),
            Some(existing) => Err(Error::NamingCollision {
                name: name.to_string(),
                existing: existing.clone(),
                attempted: owner.clone(),
            }),
            None => {
                debug!(name = %name, owner = %owner, "Registered schema name");
                self.owners.insert(name.clone(), owner.clone());
                Ok(())
            }
        }
    }

    /// Owner of a registered name
    pub fn owner_of(&self, name: &SchemaName) -> Option<&Owner> {
        self.owners.get(name)
    }

    /// Check if a name is registered
    pub fn contains(&self, name: &SchemaName) -> bool {
        self.owners.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&SchemaName> {
        let mut names: Vec<_> = self.owners.keys().collect();
        names.sort();
        names
    }

    /// Number of registered names
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    /// Check if no names are registered
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> SchemaName {
        SchemaName::new(s).unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = NameRegistry::new();
        let owner = Owner::new("Pkg").with_version("0.3.1");
        registry.register(&name("example.foo"), &owner).unwrap();

        assert!(registry.contains(&name("example.foo")));
        assert_eq!(registry.owner_of(&name("example.foo")), Some(&owner));
        assert_eq!(registry.owner_of(&name("example.bar")), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reregister_same_owner_is_noop() {
        let mut registry = NameRegistry::new();
        let owner = Owner::new("Pkg");
        registry.register(&name("a"), &owner).unwrap();
        registry.register(&name("a"), &owner).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_collision_with_other_owner() {
        let mut registry = NameRegistry::new();
        registry.register(&name("a"), &Owner::new("First")).unwrap();

        let err = registry.register(&name("a"), &Owner::new("Second")).unwrap_err();
        match err {
            Error::NamingCollision {
                name,
                existing,
                attempted,
            } => {
                assert_eq!(name, "a");
                assert_eq!(existing.name, "First");
                assert_eq!(attempted.name, "Second");
            }
            other => panic!("expected NamingCollision, got {other:?}"),
        }
        assert_eq!(registry.owner_of(&name("a")).unwrap().name, "First");
    }

    #[test]
    fn test_owner_display() {
        assert_eq!(Owner::new("Pkg").to_string(), "Pkg");
        assert_eq!(Owner::new("Pkg").with_version("1.0").to_string(), "Pkg 1.0");
    }

    #[test]
    fn test_names_sorted() {
        let mut registry = NameRegistry::new();
        let owner = Owner::new("Pkg");
        registry.register(&name("b"), &owner).unwrap();
        registry.register(&name("a"), &owner).unwrap();
        let names: Vec<_> = registry.names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
