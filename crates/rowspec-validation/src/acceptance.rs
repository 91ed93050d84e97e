//! Accepted-type resolution
//!
//! The accepted type of a declared field type is the widest column type a
//! compliant table may present for it. Nullability and representation
//! widening are decided here and nowhere else.

use crate::{Error, Result};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rowspec_schema::Owner;
use rowspec_types::TypeExpr;
use tracing::{debug, warn};

/// A custom widening registered for one named type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideningRule {
    pub declared: TypeExpr,
    pub accepted: TypeExpr,
    pub owner: Owner,
}

/// Owner-checked table of custom widenings, keyed by named type
///
/// The first owner to register a widening for a named type owns it; only
/// that owner may replace it afterwards.
#[derive(Debug, Default)]
pub struct WideningRules {
    rules: DashMap<String, WideningRule>,
}

impl WideningRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or, for the owning package, replace) a widening.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotWidenable`] for anything but a named type, and
    /// [`Error::WideningOwnership`] when another owner holds the type.
    pub fn register(&self, declared: TypeExpr, accepted: TypeExpr, owner: &Owner) -> Result<()> {
        let TypeExpr::Named(type_name) = &declared else {
            return Err(Error::NotWidenable(declared.to_string()));
        };

        let rule = WideningRule {
            declared: declared.clone(),
            accepted,
            owner: owner.clone(),
        };
        match self.rules.entry(type_name.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().owner != *owner {
                    warn!(type_name = %type_name, owner = %owner, "Rejected widening from non-owner");
                    return Err(Error::WideningOwnership {
                        type_name: type_name.clone(),
                        existing: entry.get().owner.clone(),
                        attempted: owner.clone(),
                    });
                }
                entry.insert(rule);
            }
            Entry::Vacant(entry) => {
                entry.insert(rule);
            }
        }

        debug!(declared = %declared, owner = %owner, "Registered widening");
        Ok(())
    }

    /// Accepted type registered for a named type
    pub fn get(&self, type_name: &str) -> Option<TypeExpr> {
        self.rules.get(type_name).map(|rule| rule.accepted.clone())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Accepted type of `declared` under the built-in rules plus these widenings
    pub fn accepted_type(&self, declared: &TypeExpr) -> TypeExpr {
        resolve(declared, Some(self))
    }
}

/// Accepted type of `declared` under the built-in rules only.
///
/// | Declared          | Accepted                               |
/// |-------------------|----------------------------------------|
/// | `Any`             | `Any`                                  |
/// | `SchemaVersion`   | `Union{SchemaVersion, String}`         |
/// | `UUID`            | `Union{UUID, UInt128}`                 |
/// | `Symbol`          | `Union{Symbol, AbstractString}`        |
/// | `String`          | `AbstractString`                       |
/// | `List{T}`         | `List{accepted(T)}`                    |
/// | `Union{A, B, ..}` | `Union{accepted(A), accepted(B), ..}`  |
/// | anything else     | itself                                 |
pub fn accepted_type(declared: &TypeExpr) -> TypeExpr {
    resolve(declared, None)
}

fn resolve(declared: &TypeExpr, rules: Option<&WideningRules>) -> TypeExpr {
    match declared {
        TypeExpr::Any => TypeExpr::Any,
        TypeExpr::SchemaVersion => TypeExpr::union([TypeExpr::SchemaVersion, TypeExpr::String]),
        TypeExpr::Uuid => TypeExpr::union([TypeExpr::Uuid, TypeExpr::UInt128]),
        TypeExpr::Symbol => TypeExpr::union([TypeExpr::Symbol, TypeExpr::AbstractString]),
        TypeExpr::String => TypeExpr::AbstractString,
        TypeExpr::List(element) => TypeExpr::list(resolve(element, rules)),
        TypeExpr::Union(members) => TypeExpr::union(members.iter().map(|m| resolve(m, rules))),
        TypeExpr::Named(name) => rules
            .and_then(|r| r.get(name))
            .unwrap_or_else(|| declared.clone()),
        other => other.clone(),
    }
}
