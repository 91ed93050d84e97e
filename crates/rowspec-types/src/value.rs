//! Dynamic values held by records and produced by initializers

use crate::identity::SchemaVersion;
use crate::types::TypeExpr;
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A value of one of the builtin types, or a tagged custom value
///
/// Equality and hashing are total: floats compare by bit pattern, so `NaN`
/// equals itself and `0.0` differs from `-0.0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Absent value
    Missing,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    UInt128(u128),
    Float32(f32),
    Float64(f64),
    String(String),
    Symbol(String),
    Uuid(Uuid),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    SchemaVersion(SchemaVersion),
    List {
        element_type: TypeExpr,
        items: Vec<Value>,
    },
    /// Value of a custom named type
    Tagged {
        type_name: String,
        value: Box<Value>,
    },
}

impl Value {
    /// Build a list whose element type is the union of its items' types.
    pub fn list(items: Vec<Value>) -> Self {
        let element_type = if items.is_empty() {
            TypeExpr::Any
        } else {
            TypeExpr::union(items.iter().map(Value::type_of))
        };
        Self::List {
            element_type,
            items,
        }
    }

    /// Build a list with an explicit element type.
    pub fn typed_list(element_type: TypeExpr, items: Vec<Value>) -> Self {
        Self::List {
            element_type,
            items,
        }
    }

    /// Wrap a value as an instance of a custom named type.
    pub fn tagged(type_name: impl Into<String>, value: Value) -> Self {
        Self::Tagged {
            type_name: type_name.into(),
            value: Box::new(value),
        }
    }

    /// The concrete runtime type of this value.
    pub fn type_of(&self) -> TypeExpr {
        match self {
            Value::Missing => TypeExpr::Missing,
            Value::Bool(_) => TypeExpr::Bool,
            Value::Int8(_) => TypeExpr::Int8,
            Value::Int16(_) => TypeExpr::Int16,
            Value::Int32(_) => TypeExpr::Int32,
            Value::Int64(_) => TypeExpr::Int64,
            Value::UInt8(_) => TypeExpr::UInt8,
            Value::UInt16(_) => TypeExpr::UInt16,
            Value::UInt32(_) => TypeExpr::UInt32,
            Value::UInt64(_) => TypeExpr::UInt64,
            Value::UInt128(_) => TypeExpr::UInt128,
            Value::Float32(_) => TypeExpr::Float32,
            Value::Float64(_) => TypeExpr::Float64,
            Value::String(_) => TypeExpr::String,
            Value::Symbol(_) => TypeExpr::Symbol,
            Value::Uuid(_) => TypeExpr::Uuid,
            Value::Date(_) => TypeExpr::Date,
            Value::DateTime(_) => TypeExpr::DateTime,
            Value::SchemaVersion(_) => TypeExpr::SchemaVersion,
            Value::List { element_type, .. } => TypeExpr::list(element_type.clone()),
            Value::Tagged { type_name, .. } => TypeExpr::named(type_name.clone()),
        }
    }

    /// Check if value is missing
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// String contents of a `String` or `Symbol` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean contents, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer contents widened to `i128`, if this is an integer that fits.
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Int8(v) => Some(i128::from(*v)),
            Value::Int16(v) => Some(i128::from(*v)),
            Value::Int32(v) => Some(i128::from(*v)),
            Value::Int64(v) => Some(i128::from(*v)),
            Value::UInt8(v) => Some(i128::from(*v)),
            Value::UInt16(v) => Some(i128::from(*v)),
            Value::UInt32(v) => Some(i128::from(*v)),
            Value::UInt64(v) => Some(i128::from(*v)),
            Value::UInt128(v) => i128::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Numeric contents as `f64`, for integers and floats.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            Value::UInt128(v) => Some(*v as f64),
            other => other.as_i128().map(|v| v as f64),
        }
    }

    /// Whether this is an integer or float value.
    pub fn is_numeric(&self) -> bool {
        self.type_of().is_subtype(&TypeExpr::Real)
    }

    /// Convert a JSON value: integers become `Int64` (or `UInt64` when too
    /// large), other numbers `Float64`, `null` becomes `Missing`, arrays become
    /// lists, and objects are rejected.
    ///
    /// # Errors
    ///
    /// Returns a conversion error for JSON objects.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        Ok(match json {
            serde_json::Value::Null => Value::Missing,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt64(u)
                } else {
                    Value::Float64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::list(
                items
                    .iter()
                    .map(Value::from_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            serde_json::Value::Object(_) => {
                return Err(Error::Conversion {
                    expected: "a scalar or array".to_string(),
                    found: "object".to_string(),
                    value: json.to_string(),
                });
            }
        })
    }

    /// Render as plain JSON for external writers.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Missing => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Float32(v) => serde_json::Number::from_f64(f64::from(*v)).map_or(Json::Null, Json::Number),
            Value::Float64(v) => serde_json::Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Value::UInt128(v) => u64::try_from(*v).map_or_else(|_| Json::String(v.to_string()), Json::from),
            Value::String(s) | Value::Symbol(s) => Json::String(s.clone()),
            Value::Uuid(u) => Json::String(u.to_string()),
            Value::Date(d) => Json::String(d.to_string()),
            Value::DateTime(dt) => Json::String(dt.to_rfc3339()),
            Value::SchemaVersion(sv) => Json::String(sv.to_string()),
            Value::List { items, .. } => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Tagged { value, .. } => value.to_json(),
            other => other
                .as_i128()
                .and_then(|v| i64::try_from(v).ok().map(Json::from))
                .or_else(|| other.as_i128().and_then(|v| u64::try_from(v).ok()).map(Json::from))
                .unwrap_or(Json::Null),
        }
    }

    /// Typed access through [`FromValue`].
    ///
    /// # Errors
    ///
    /// Returns a conversion error when the value does not fit `T`.
    pub fn get<T: FromValue>(&self) -> Result<T> {
        T::from_value(self)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Missing, Value::Missing) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int8(a), Value::Int8(b)) => a == b,
            (Value::Int16(a), Value::Int16(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt8(a), Value::UInt8(b)) => a == b,
            (Value::UInt16(a), Value::UInt16(b)) => a == b,
            (Value::UInt32(a), Value::UInt32(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::UInt128(a), Value::UInt128(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a.to_bits() == b.to_bits(),
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) | (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::SchemaVersion(a), Value::SchemaVersion(b)) => a == b,
            (
                Value::List {
                    element_type: ta,
                    items: a,
                },
                Value::List {
                    element_type: tb,
                    items: b,
                },
            ) => ta == tb && a == b,
            (
                Value::Tagged {
                    type_name: ta,
                    value: a,
                },
                Value::Tagged {
                    type_name: tb,
                    value: b,
                },
            ) => ta == tb && a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Missing => {}
            Value::Bool(v) => v.hash(state),
            Value::Int8(v) => v.hash(state),
            Value::Int16(v) => v.hash(state),
            Value::Int32(v) => v.hash(state),
            Value::Int64(v) => v.hash(state),
            Value::UInt8(v) => v.hash(state),
            Value::UInt16(v) => v.hash(state),
            Value::UInt32(v) => v.hash(state),
            Value::UInt64(v) => v.hash(state),
            Value::UInt128(v) => v.hash(state),
            Value::Float32(v) => v.to_bits().hash(state),
            Value::Float64(v) => v.to_bits().hash(state),
            Value::String(v) | Value::Symbol(v) => v.hash(state),
            Value::Uuid(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
            Value::DateTime(v) => v.hash(state),
            Value::SchemaVersion(v) => v.hash(state),
            Value::List {
                element_type,
                items,
            } => {
                element_type.hash(state);
                items.hash(state);
            }
            Value::Tagged { type_name, value } => {
                type_name.hash(state);
                value.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => f.write_str("missing"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt8(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::UInt128(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v:?}"),
            Value::Float64(v) => write!(f, "{v:?}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Symbol(s) => write!(f, ":{s}"),
            Value::Uuid(u) => write!(f, "{u}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::SchemaVersion(sv) => write!(f, "{sv}"),
            Value::List { items, .. } => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Tagged { type_name, value } => write!(f, "{type_name}({value})"),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive!(
    bool => Bool,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    u128 => UInt128,
    f32 => Float32,
    f64 => Float64,
    String => String,
    Uuid => Uuid,
    NaiveDate => Date,
    DateTime<Utc> => DateTime,
    SchemaVersion => SchemaVersion,
);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Missing, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into).collect())
    }
}

/// Typed extraction from a [`Value`]
pub trait FromValue: Sized {
    /// Convert the value, failing when it does not represent `Self`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conversion`] on mismatch.
    fn from_value(value: &Value) -> Result<Self>;
}

macro_rules! impl_from_value_int {
    ($($ty:ty => $target:ident),* $(,)?) => {
        $(
            impl FromValue for $ty {
                fn from_value(value: &Value) -> Result<Self> {
                    value
                        .as_i128()
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .ok_or_else(|| Error::conversion(&TypeExpr::$target, value))
                }
            }
        )*
    };
}

impl_from_value_int!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
);

impl FromValue for u128 {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::UInt128(v) => Ok(*v),
            other => other
                .as_i128()
                .and_then(|v| u128::try_from(v).ok())
                .ok_or_else(|| Error::conversion(&TypeExpr::UInt128, value)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_f64()
            .ok_or_else(|| Error::conversion(&TypeExpr::Float64, value))
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_bool()
            .ok_or_else(|| Error::conversion(&TypeExpr::Bool, value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        value
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| Error::conversion(&TypeExpr::String, value))
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Uuid(u) => Ok(*u),
            Value::UInt128(v) => Ok(Uuid::from_u128(*v)),
            _ => Err(Error::conversion(&TypeExpr::Uuid, value)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Date(d) => Ok(*d),
            _ => Err(Error::conversion(&TypeExpr::Date, value)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            _ => Err(Error::conversion(&TypeExpr::DateTime, value)),
        }
    }
}

impl FromValue for SchemaVersion {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::SchemaVersion(sv) => Ok(sv.clone()),
            Value::String(s) => s.parse(),
            _ => Err(Error::conversion(&TypeExpr::SchemaVersion, value)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Missing => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::List { items, .. } => items.iter().map(T::from_value).collect(),
            _ => Err(Error::conversion(&TypeExpr::list(TypeExpr::Any), value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_type_of() {
        assert_eq!(Value::Int32(1).type_of(), TypeExpr::Int32);
        assert_eq!(Value::Missing.type_of(), TypeExpr::Missing);
        assert_eq!(
            Value::list(vec![Value::Int64(1), Value::Int64(2)]).type_of(),
            TypeExpr::list(TypeExpr::Int64)
        );
        assert_eq!(
            Value::list(vec![Value::Int64(1), Value::Missing]).type_of(),
            TypeExpr::list(TypeExpr::optional(TypeExpr::Int64))
        );
        assert_eq!(Value::list(vec![]).type_of(), TypeExpr::list(TypeExpr::Any));
        assert_eq!(
            Value::tagged("Acme.Id", Value::Int64(3)).type_of(),
            TypeExpr::named("Acme.Id")
        );
    }

    #[test]
    fn test_float_equality_is_total() {
        assert_eq!(Value::Float64(f64::NAN), Value::Float64(f64::NAN));
        assert_ne!(Value::Float64(0.0), Value::Float64(-0.0));
        assert_ne!(Value::Int64(1), Value::Float64(1.0));

        let mut set = HashSet::new();
        set.insert(Value::Float64(f64::NAN));
        assert!(set.contains(&Value::Float64(f64::NAN)));
    }

    #[test]
    fn test_string_and_symbol_differ() {
        assert_ne!(Value::String("a".into()), Value::Symbol("a".into()));
        assert_eq!(Value::Symbol("a".into()).as_str(), Some("a"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::String("hi".into()).to_string(), "\"hi\"");
        assert_eq!(Value::Symbol("hi".into()).to_string(), ":hi");
        assert_eq!(Value::Missing.to_string(), "missing");
        assert_eq!(Value::Float64(1.0).to_string(), "1.0");
        assert_eq!(
            Value::from(vec![1i64, 2, 3]).to_string(),
            "[1, 2, 3]"
        );
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!([1, 2.5, "x", null, true]);
        let value = Value::from_json(&json).unwrap();
        let Value::List { items, .. } = &value else {
            panic!("expected list, got {value:?}");
        };
        assert_eq!(items[0], Value::Int64(1));
        assert_eq!(items[1], Value::Float64(2.5));
        assert_eq!(items[2], Value::String("x".into()));
        assert_eq!(items[3], Value::Missing);
        assert_eq!(items[4], Value::Bool(true));
        assert!(Value::from_json(&serde_json::json!({"a": 1})).is_err());
    }

    #[test]
    fn test_to_json() {
        assert_eq!(Value::Int8(-3).to_json(), serde_json::json!(-3));
        assert_eq!(Value::UInt64(u64::MAX).to_json(), serde_json::json!(u64::MAX));
        assert_eq!(Value::Missing.to_json(), serde_json::Value::Null);
        assert_eq!(
            Value::from(vec!["a", "b"]).to_json(),
            serde_json::json!(["a", "b"])
        );
    }

    #[test]
    fn test_typed_access() {
        assert_eq!(Value::Int32(7).get::<i64>().unwrap(), 7);
        assert_eq!(Value::Int64(300).get::<u8>().ok(), None);
        assert_eq!(Value::Missing.get::<Option<i64>>().unwrap(), None);
        assert_eq!(Value::Int64(2).get::<Option<i64>>().unwrap(), Some(2));
        assert_eq!(Value::from(vec![1i64, 2]).get::<Vec<i64>>().unwrap(), vec![1, 2]);
        assert_eq!(
            Value::String("a@1".into()).get::<SchemaVersion>().unwrap(),
            SchemaVersion::new("a", 1).unwrap()
        );
        assert_eq!(
            Value::UInt128(5).get::<Uuid>().unwrap(),
            Uuid::from_u128(5)
        );
        assert!(Value::String("x".into()).get::<i64>().is_err());
    }
}
