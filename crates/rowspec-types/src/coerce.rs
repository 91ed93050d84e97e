//! Value coercion toward a declared type
//!
//! Coercion never changes a value that already conforms. Otherwise it tries a
//! fixed set of representation-preserving conversions: integer width changes
//! within range, integral floats to integers, numerics to floats, `String` and
//! `Symbol` to each other, raw `UInt128` to `UUID`, element-wise list
//! conversion, and the members of a union in order.

use crate::types::TypeExpr;
use crate::value::Value;
use crate::{Error, Result};
use uuid::Uuid;

/// Coerce `value` so that its runtime type is a subtype of `target`.
///
/// # Errors
///
/// Returns [`Error::Conversion`] when no conversion applies or a numeric
/// conversion would lose information.
pub fn coerce(value: Value, target: &TypeExpr) -> Result<Value> {
    if value.type_of().is_subtype(target) {
        return Ok(value);
    }

    match target {
        TypeExpr::Union(members) => members
            .iter()
            .find_map(|member| coerce(value.clone(), member).ok())
            .ok_or_else(|| Error::conversion(target, &value)),
        t if t.is_concrete_integer() => coerce_integer(&value, t),
        t if t.is_concrete_float() => coerce_float(&value, t),
        TypeExpr::Integer | TypeExpr::Signed => coerce_integer(&value, &TypeExpr::Int64),
        TypeExpr::Unsigned => coerce_integer(&value, &TypeExpr::UInt64),
        TypeExpr::AbstractFloat => coerce_float(&value, &TypeExpr::Float64),
        TypeExpr::String | TypeExpr::AbstractString => match value {
            Value::Symbol(s) => Ok(Value::String(s)),
            other => Err(Error::conversion(target, &other)),
        },
        TypeExpr::Symbol => match value {
            Value::String(s) => Ok(Value::Symbol(s)),
            other => Err(Error::conversion(target, &other)),
        },
        TypeExpr::Uuid => match value {
            Value::UInt128(raw) => Ok(Value::Uuid(Uuid::from_u128(raw))),
            other => Err(Error::conversion(target, &other)),
        },
        TypeExpr::List(element) => match &value {
            Value::List { items, .. } => {
                let items = items
                    .iter()
                    .map(|item| coerce(item.clone(), element))
                    .collect::<Result<Vec<_>>>()
                    .map_err(|_| Error::conversion(target, &value))?;
                Ok(Value::typed_list((**element).clone(), items))
            }
            _ => Err(Error::conversion(target, &value)),
        },
        _ => Err(Error::conversion(target, &value)),
    }
}

fn coerce_integer(value: &Value, target: &TypeExpr) -> Result<Value> {
    let raw = match value {
        Value::UInt128(v) => {
            if *target == TypeExpr::UInt128 {
                return Ok(Value::UInt128(*v));
            }
            i128::try_from(*v).ok()
        }
        Value::Float32(_) | Value::Float64(_) => value.as_f64().and_then(integral_f64),
        other => other.as_i128(),
    };

    let Some(raw) = raw else {
        return Err(Error::conversion(target, value));
    };

    let converted = match target {
        TypeExpr::Int8 => i8::try_from(raw).ok().map(Value::Int8),
        TypeExpr::Int16 => i16::try_from(raw).ok().map(Value::Int16),
        TypeExpr::Int32 => i32::try_from(raw).ok().map(Value::Int32),
        TypeExpr::Int64 => i64::try_from(raw).ok().map(Value::Int64),
        TypeExpr::UInt8 => u8::try_from(raw).ok().map(Value::UInt8),
        TypeExpr::UInt16 => u16::try_from(raw).ok().map(Value::UInt16),
        TypeExpr::UInt32 => u32::try_from(raw).ok().map(Value::UInt32),
        TypeExpr::UInt64 => u64::try_from(raw).ok().map(Value::UInt64),
        TypeExpr::UInt128 => u128::try_from(raw).ok().map(Value::UInt128),
        _ => None,
    };

    converted.ok_or_else(|| Error::conversion(target, value))
}

#[allow(clippy::cast_possible_truncation)]
fn integral_f64(v: f64) -> Option<i128> {
    // i128 covers every integral f64 below 2^127
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1.7e38 {
        Some(v as i128)
    } else {
        None
    }
}

#[allow(clippy::cast_possible_truncation)]
fn coerce_float(value: &Value, target: &TypeExpr) -> Result<Value> {
    let Some(raw) = value.as_f64() else {
        return Err(Error::conversion(target, value));
    };
    match target {
        TypeExpr::Float32 => Ok(Value::Float32(raw as f32)),
        _ => Ok(Value::Float64(raw)),
    }
}

impl Value {
    /// Method form of [`coerce`].
    ///
    /// # Errors
    ///
    /// See [`coerce`].
    pub fn coerce_to(self, target: &TypeExpr) -> Result<Value> {
        coerce(self, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(s: &str) -> TypeExpr {
        s.parse().unwrap()
    }

    #[test]
    fn test_conforming_values_pass_through() {
        assert_eq!(coerce(Value::Int8(3), &TypeExpr::Integer).unwrap(), Value::Int8(3));
        assert_eq!(coerce(Value::Missing, &ty("Optional{Int64}")).unwrap(), Value::Missing);
        assert_eq!(
            coerce(Value::String("x".into()), &TypeExpr::Any).unwrap(),
            Value::String("x".into())
        );
    }

    #[test]
    fn test_integer_width_conversion() {
        assert_eq!(coerce(Value::Int64(12), &TypeExpr::Int8).unwrap(), Value::Int8(12));
        assert_eq!(coerce(Value::Int32(12), &TypeExpr::UInt128).unwrap(), Value::UInt128(12));
        assert!(coerce(Value::Int64(300), &TypeExpr::Int8).is_err());
        assert!(coerce(Value::Int64(-1), &TypeExpr::UInt32).is_err());
    }

    #[test]
    fn test_float_integer_conversion() {
        assert_eq!(coerce(Value::Float64(4.0), &TypeExpr::Int64).unwrap(), Value::Int64(4));
        assert!(coerce(Value::Float64(4.5), &TypeExpr::Int64).is_err());
        assert!(coerce(Value::Float64(f64::NAN), &TypeExpr::Int64).is_err());
        assert_eq!(coerce(Value::Int64(2), &TypeExpr::Float64).unwrap(), Value::Float64(2.0));
        assert_eq!(coerce(Value::Int64(2), &TypeExpr::AbstractFloat).unwrap(), Value::Float64(2.0));
        assert_eq!(coerce(Value::Float64(1.5), &TypeExpr::Float32).unwrap(), Value::Float32(1.5));
    }

    #[test]
    fn test_string_is_not_coerced_to_integer() {
        let err = coerce(Value::String("12".into()), &TypeExpr::Int64).unwrap_err();
        match err {
            Error::Conversion { expected, found, value } => {
                assert_eq!(expected, "Int64");
                assert_eq!(found, "String");
                assert_eq!(value, "\"12\"");
            }
            other => panic!("expected Conversion error, got {other:?}"),
        }
    }

    #[test]
    fn test_symbol_string_and_uuid_conversion() {
        assert_eq!(
            coerce(Value::String("a".into()), &TypeExpr::Symbol).unwrap(),
            Value::Symbol("a".into())
        );
        assert_eq!(
            coerce(Value::Symbol("a".into()), &TypeExpr::String).unwrap(),
            Value::String("a".into())
        );
        assert_eq!(
            coerce(Value::UInt128(42), &TypeExpr::Uuid).unwrap(),
            Value::Uuid(Uuid::from_u128(42))
        );
    }

    #[test]
    fn test_union_tries_members_in_order() {
        assert_eq!(
            coerce(Value::Int32(5), &ty("Union{Int64, Missing}")).unwrap(),
            Value::Int64(5)
        );
        assert!(coerce(Value::String("x".into()), &ty("Union{Int64, Missing}")).is_err());
    }

    #[test]
    fn test_list_elementwise_conversion() {
        let value = Value::from(vec![1i64, 2]);
        let coerced = coerce(value, &ty("List{Float64}")).unwrap();
        assert_eq!(
            coerced,
            Value::typed_list(TypeExpr::Float64, vec![Value::Float64(1.0), Value::Float64(2.0)])
        );
        assert!(coerce(Value::from(vec!["a"]), &ty("List{Int64}")).is_err());
    }
}
