//! Name-keyed access to the values of a row

use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

/// A row whose values can be looked up by field name
///
/// Records are built from any `FieldLookup`; names the row does not have are
/// treated as missing.
pub trait FieldLookup {
    /// Value stored under `name`, if any.
    fn get_field(&self, name: &str) -> Option<&Value>;
}

impl FieldLookup for HashMap<String, Value> {
    fn get_field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl FieldLookup for BTreeMap<String, Value> {
    fn get_field(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl FieldLookup for [(String, Value)] {
    fn get_field(&self, name: &str) -> Option<&Value> {
        self.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl FieldLookup for Vec<(String, Value)> {
    fn get_field(&self, name: &str) -> Option<&Value> {
        self.as_slice().get_field(name)
    }
}

impl<T: FieldLookup + ?Sized> FieldLookup for &T {
    fn get_field(&self, name: &str) -> Option<&Value> {
        (**self).get_field(name)
    }
}
