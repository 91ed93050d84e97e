//! Functions callable from initializer and constraint expressions
//!
//! Every registry starts with the built-in functions; user functions are added
//! with [`FunctionRegistry::register`] and may shadow a built-in.

use crate::{Error, Result};
use regex::Regex;
use rowspec_types::{SchemaVersion, TypeExpr, Value, coerce};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// A callable expression function
pub type Function = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Shared table of expression functions
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: Arc<Mutex<HashMap<String, Function>>>,
}

impl FunctionRegistry {
    /// Registry with only the built-in functions
    pub fn new() -> Self {
        let registry = Self::empty();
        if let Ok(mut functions) = registry.functions.lock() {
            for (name, builtin) in BUILTINS {
                functions.insert((*name).to_string(), Arc::new(*builtin));
            }
        }
        registry
    }

    /// Registry with no functions at all
    pub fn empty() -> Self {
        Self {
            functions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register (or replace) a function
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn register(
        &self,
        name: impl Into<String>,
        function: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Result<()> {
        let name = name.into();
        let mut functions = self
            .functions
            .lock()
            .map_err(|_| Error::Registry("Failed to lock function registry".to_string()))?;
        debug!(function = %name, "Registered expression function");
        functions.insert(name, Arc::new(function));
        Ok(())
    }

    /// Look up a function
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn get(&self, name: &str) -> Result<Option<Function>> {
        let functions = self
            .functions
            .lock()
            .map_err(|_| Error::Registry("Failed to lock function registry".to_string()))?;
        Ok(functions.get(name).cloned())
    }

    /// Check if a function exists
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn has_function(&self, name: &str) -> Result<bool> {
        Ok(self.get(name)?.is_some())
    }

    /// Registered function names, sorted
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn function_names(&self) -> Result<Vec<String>> {
        let functions = self
            .functions
            .lock()
            .map_err(|_| Error::Registry("Failed to lock function registry".to_string()))?;
        let mut names: Vec<String> = functions.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Call a function by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the function is unknown or fails.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let function = self
            .get(name)?
            .ok_or_else(|| Error::evaluation(format!("unknown function '{name}'")))?;
        function(args)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.function_names().unwrap_or_default())
            .finish()
    }
}

type Builtin = fn(&[Value]) -> Result<Value>;

const BUILTINS: &[(&str, Builtin)] = &[
    ("coalesce", coalesce),
    ("ismissing", ismissing),
    ("uppercase", uppercase),
    ("lowercase", lowercase),
    ("strip", strip),
    ("string", string),
    ("length", length),
    ("symbol", symbol),
    ("uuid", uuid),
    ("schema_version", schema_version),
    ("int", int),
    ("float", float),
    ("matches", matches),
];

fn expect_args<'a, const N: usize>(name: &str, args: &'a [Value]) -> Result<&'a [Value; N]> {
    args.try_into().map_err(|_| {
        Error::evaluation(format!(
            "{name}() takes {N} argument{}, got {}",
            if N == 1 { "" } else { "s" },
            args.len()
        ))
    })
}

fn type_error(name: &str, value: &Value) -> Error {
    Error::evaluation(format!("{name}() does not accept {value} of type {}", value.type_of()))
}

/// First argument that is not missing, or missing
pub fn coalesce(args: &[Value]) -> Result<Value> {
    Ok(args
        .iter()
        .find(|v| !v.is_missing())
        .cloned()
        .unwrap_or(Value::Missing))
}

/// Whether the argument is missing
pub fn ismissing(args: &[Value]) -> Result<Value> {
    let [value] = expect_args::<1>("ismissing", args)?;
    Ok(Value::Bool(value.is_missing()))
}

fn map_text(name: &str, args: &[Value], f: impl Fn(&str) -> String) -> Result<Value> {
    let [value] = expect_args::<1>(name, args)?;
    match value {
        Value::Missing => Ok(Value::Missing),
        other => other
            .as_str()
            .map(|s| Value::String(f(s)))
            .ok_or_else(|| type_error(name, other)),
    }
}

/// Upper-case a string or symbol
pub fn uppercase(args: &[Value]) -> Result<Value> {
    map_text("uppercase", args, str::to_uppercase)
}

/// Lower-case a string or symbol
pub fn lowercase(args: &[Value]) -> Result<Value> {
    map_text("lowercase", args, str::to_lowercase)
}

/// Trim surrounding whitespace
pub fn strip(args: &[Value]) -> Result<Value> {
    map_text("strip", args, |s| s.trim().to_string())
}

/// Text form of any non-missing value
pub fn string(args: &[Value]) -> Result<Value> {
    let [value] = expect_args::<1>("string", args)?;
    Ok(match value {
        Value::Missing => Value::Missing,
        Value::String(s) | Value::Symbol(s) => Value::String(s.clone()),
        other => Value::String(other.to_string()),
    })
}

/// Character count of a string, or item count of a list
pub fn length(args: &[Value]) -> Result<Value> {
    let [value] = expect_args::<1>("length", args)?;
    let len = match value {
        Value::Missing => return Ok(Value::Missing),
        Value::List { items, .. } => items.len(),
        other => other
            .as_str()
            .map(|s| s.chars().count())
            .ok_or_else(|| type_error("length", other))?,
    };
    i64::try_from(len)
        .map(Value::Int64)
        .map_err(|_| Error::evaluation("length() overflowed Int64"))
}

/// Convert a string to a symbol
pub fn symbol(args: &[Value]) -> Result<Value> {
    let [value] = expect_args::<1>("symbol", args)?;
    match value {
        Value::Missing => Ok(Value::Missing),
        other => other
            .as_str()
            .map(|s| Value::Symbol(s.to_string()))
            .ok_or_else(|| type_error("symbol", other)),
    }
}

/// `uuid()` generates a random UUID; `uuid(x)` parses a string or converts a
/// raw `UInt128`.
pub fn uuid(args: &[Value]) -> Result<Value> {
    match args {
        [] => Ok(Value::Uuid(Uuid::new_v4())),
        [Value::Missing] => Ok(Value::Missing),
        [Value::Uuid(u)] => Ok(Value::Uuid(*u)),
        [Value::String(s)] => Uuid::parse_str(s)
            .map(Value::Uuid)
            .map_err(|e| Error::evaluation(format!("uuid(): invalid UUID {s:?}: {e}"))),
        [raw @ Value::UInt128(_)] => Ok(coerce(raw.clone(), &TypeExpr::Uuid)?),
        [other] => Err(type_error("uuid", other)),
        _ => Err(Error::evaluation(format!(
            "uuid() takes 0 or 1 arguments, got {}",
            args.len()
        ))),
    }
}

/// `schema_version("name@1")` or `schema_version("name", 1)`
pub fn schema_version(args: &[Value]) -> Result<Value> {
    match args {
        [Value::Missing] => Ok(Value::Missing),
        [Value::SchemaVersion(sv)] => Ok(Value::SchemaVersion(sv.clone())),
        [Value::String(s)] => Ok(Value::SchemaVersion(s.parse()?)),
        [name, version] => {
            let name = name.as_str().ok_or_else(|| type_error("schema_version", name))?;
            let version = version
                .as_i128()
                .and_then(|v| i64::try_from(v).ok())
                .ok_or_else(|| type_error("schema_version", version))?;
            Ok(Value::SchemaVersion(SchemaVersion::new(name, version)?))
        }
        [other] => Err(type_error("schema_version", other)),
        _ => Err(Error::evaluation(format!(
            "schema_version() takes 1 or 2 arguments, got {}",
            args.len()
        ))),
    }
}

/// Convert to `Int64`, parsing strings
pub fn int(args: &[Value]) -> Result<Value> {
    let [value] = expect_args::<1>("int", args)?;
    match value {
        Value::Missing => Ok(Value::Missing),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int64)
            .map_err(|e| Error::evaluation(format!("int(): cannot parse {s:?}: {e}"))),
        other => Ok(coerce(other.clone(), &TypeExpr::Int64)?),
    }
}

/// Convert to `Float64`, parsing strings
pub fn float(args: &[Value]) -> Result<Value> {
    let [value] = expect_args::<1>("float", args)?;
    match value {
        Value::Missing => Ok(Value::Missing),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float64)
            .map_err(|e| Error::evaluation(format!("float(): cannot parse {s:?}: {e}"))),
        other => other
            .as_f64()
            .map(Value::Float64)
            .ok_or_else(|| type_error("float", other)),
    }
}

/// `matches(text, pattern)`: whether the regular expression matches
pub fn matches(args: &[Value]) -> Result<Value> {
    let [text, pattern] = expect_args::<2>("matches", args)?;
    if text.is_missing() {
        return Ok(Value::Missing);
    }
    let text = text.as_str().ok_or_else(|| type_error("matches", text))?;
    let pattern = pattern.as_str().ok_or_else(|| type_error("matches", pattern))?;
    let regex = Regex::new(pattern)
        .map_err(|e| Error::evaluation(format!("matches(): invalid pattern {pattern:?}: {e}")))?;
    Ok(Value::Bool(regex.is_match(text)))
}
