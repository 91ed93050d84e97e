//! Expression evaluation
//!
//! `missing` propagates through arithmetic, negation and comparisons. Boolean
//! contexts (`!`, `&&`, `||`, the condition of `?:`) require a `Bool` and
//! fail on anything else, including `missing`.

use crate::functions::FunctionRegistry;
use crate::{Error, Result};
use rowspec_schema::{BinaryOp, Expr, UnaryOp};
use rowspec_types::{FieldLookup, Value};
use std::cmp::Ordering;

/// Evaluate `expr` with field references resolved through `env`.
///
/// # Errors
///
/// Returns [`Error::Evaluation`] for unknown fields or functions, operand
/// type errors, overflow, and division by zero.
pub fn evaluate(expr: &Expr, env: &dyn FieldLookup, functions: &FunctionRegistry) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Field(name) => env
            .get_field(name)
            .cloned()
            .ok_or_else(|| Error::evaluation(format!("unknown field '{name}'"))),
        Expr::List(items) => Ok(Value::list(
            items
                .iter()
                .map(|item| evaluate(item, env, functions))
                .collect::<Result<Vec<_>>>()?,
        )),
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, env, functions)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!truth(&value, "!")?)),
                UnaryOp::Neg => negate(&value),
            }
        }
        Expr::Binary { op: BinaryOp::And, lhs, rhs } => {
            if !truth(&evaluate(lhs, env, functions)?, "&&")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(truth(&evaluate(rhs, env, functions)?, "&&")?))
        }
        Expr::Binary { op: BinaryOp::Or, lhs, rhs } => {
            if truth(&evaluate(lhs, env, functions)?, "||")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(truth(&evaluate(rhs, env, functions)?, "||")?))
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = evaluate(lhs, env, functions)?;
            let rhs = evaluate(rhs, env, functions)?;
            binary(*op, &lhs, &rhs)
        }
        Expr::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            if truth(&evaluate(condition, env, functions)?, "?:")? {
                evaluate(then_branch, env, functions)
            } else {
                evaluate(else_branch, env, functions)
            }
        }
        Expr::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, env, functions))
                .collect::<Result<Vec<_>>>()?;
            functions.call(function, &args)
        }
    }
}

fn truth(value: &Value, context: &str) -> Result<bool> {
    value.as_bool().ok_or_else(|| {
        Error::evaluation(format!(
            "'{context}' needs a Bool, got {value} of type {}",
            value.type_of()
        ))
    })
}

fn negate(value: &Value) -> Result<Value> {
    match value {
        Value::Missing => Ok(Value::Missing),
        Value::Float32(v) => Ok(Value::Float32(-v)),
        Value::Float64(v) => Ok(Value::Float64(-v)),
        other => {
            let v = other.as_i128().ok_or_else(|| operand_error("-", other, None))?;
            to_int64(-v, "-")
        }
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    if lhs.is_missing() || rhs.is_missing() {
        return Ok(Value::Missing);
    }
    match op {
        BinaryOp::Eq => Ok(Value::Bool(equals(lhs, rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!equals(lhs, rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(lhs, rhs)
                .ok_or_else(|| operand_error(op.symbol(), lhs, Some(rhs)))?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            }))
        }
        BinaryOp::Add => match (lhs, rhs) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
            _ => arithmetic(op, lhs, rhs),
        },
        _ => arithmetic(op, lhs, rhs),
    }
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    let symbol = op.symbol();
    if !lhs.is_numeric() || !rhs.is_numeric() {
        return Err(operand_error(symbol, lhs, Some(rhs)));
    }

    let both_integers = lhs.as_i128().is_some() && rhs.as_i128().is_some();
    if both_integers && op != BinaryOp::Div {
        let (a, b) = (lhs.as_i128().unwrap_or_default(), rhs.as_i128().unwrap_or_default());
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            _ => {
                if b == 0 {
                    return Err(Error::evaluation("integer remainder by zero"));
                }
                a.checked_rem(b)
            }
        };
        let result = result.ok_or_else(|| Error::evaluation(format!("integer overflow in '{symbol}'")))?;
        return to_int64(result, symbol);
    }

    let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
        return Err(operand_error(symbol, lhs, Some(rhs)));
    };
    Ok(Value::Float64(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a % b,
    }))
}

fn to_int64(v: i128, symbol: &str) -> Result<Value> {
    i64::try_from(v)
        .map(Value::Int64)
        .map_err(|_| Error::evaluation(format!("integer overflow in '{symbol}'")))
}

fn equals(lhs: &Value, rhs: &Value) -> bool {
    if lhs.is_numeric() && rhs.is_numeric() {
        return compare(lhs, rhs) == Some(Ordering::Equal);
    }
    lhs == rhs
}

fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (lhs.as_i128(), rhs.as_i128()) {
        return Some(a.cmp(&b));
    }
    if lhs.is_numeric() && rhs.is_numeric() {
        return lhs.as_f64()?.partial_cmp(&rhs.as_f64()?);
    }
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) | (Value::Symbol(a), Value::Symbol(b)) => Some(a.cmp(b)),
        (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::SchemaVersion(a), Value::SchemaVersion(b)) if a.name() == b.name() => {
            Some(a.version().cmp(&b.version()))
        }
        _ => None,
    }
}

fn operand_error(symbol: &str, lhs: &Value, rhs: Option<&Value>) -> Error {
    match rhs {
        Some(rhs) => Error::evaluation(format!(
            "'{symbol}' is not defined for {} and {}",
            lhs.type_of(),
            rhs.type_of()
        )),
        None => Error::evaluation(format!("'{symbol}' is not defined for {}", lhs.type_of())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowspec_schema::parse_expr;
    use std::collections::HashMap;

    fn eval_with(source: &str, env: &HashMap<String, Value>) -> Result<Value> {
        evaluate(&parse_expr(source).unwrap(), env, &FunctionRegistry::new())
    }

    fn eval(source: &str) -> Result<Value> {
        let mut env = HashMap::new();
        env.insert("a".to_string(), Value::Int64(3));
        env.insert("x".to_string(), Value::Float64(0.5));
        env.insert("s".to_string(), Value::String("ab".into()));
        env.insert("m".to_string(), Value::Missing);
        env.insert("small".to_string(), Value::Int8(2));
        eval_with(source, &env)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("a + 2 * 3").unwrap(), Value::Int64(9));
        assert_eq!(eval("a - 5").unwrap(), Value::Int64(-2));
        assert_eq!(eval("a % 2").unwrap(), Value::Int64(1));
        assert_eq!(eval("a / 2").unwrap(), Value::Float64(1.5));
        assert_eq!(eval("a * x").unwrap(), Value::Float64(1.5));
        assert_eq!(eval("small + small").unwrap(), Value::Int64(4));
        assert_eq!(eval("-a").unwrap(), Value::Int64(-3));
        assert_eq!(eval("s + \"c\"").unwrap(), Value::String("abc".into()));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert!(eval("a % 0").is_err());
        assert!(eval("9223372036854775807 + 1").is_err());
        assert!(eval("s * 2").is_err());
        assert!(eval("-s").is_err());
        assert!(eval("nope + 1").is_err());
    }

    #[test]
    fn test_missing_propagates() {
        assert_eq!(eval("m + 1").unwrap(), Value::Missing);
        assert_eq!(eval("-m").unwrap(), Value::Missing);
        assert_eq!(eval("m > 0").unwrap(), Value::Missing);
        assert_eq!(eval("m == m").unwrap(), Value::Missing);
        assert!(eval("!m").is_err());
        assert!(eval("m && true").is_err());
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval("a == 3.0").unwrap(), Value::Bool(true));
        assert_eq!(eval("small < a").unwrap(), Value::Bool(true));
        assert_eq!(eval("s >= \"aa\"").unwrap(), Value::Bool(true));
        assert_eq!(eval("s != \"ab\"").unwrap(), Value::Bool(false));
        assert_eq!(eval("[1, 2] == [1, 2]").unwrap(), Value::Bool(true));
        assert!(eval("s < 1").is_err());
    }

    #[test]
    fn test_logic_short_circuits() {
        assert_eq!(eval("a > 5 && nope").unwrap(), Value::Bool(false));
        assert_eq!(eval("a > 1 || nope").unwrap(), Value::Bool(true));
        assert_eq!(eval("!(a > 1)").unwrap(), Value::Bool(false));
        assert!(eval("a && true").is_err());
    }

    #[test]
    fn test_conditionals_and_calls() {
        assert_eq!(eval("ismissing(m) ? 0 : m").unwrap(), Value::Int64(0));
        assert_eq!(eval("coalesce(m, a)").unwrap(), Value::Int64(3));
        assert_eq!(eval("uppercase(s)").unwrap(), Value::String("AB".into()));
        assert!(eval("a ? 1 : 2").is_err());
        assert!(eval("no_such_function(a)").is_err());
    }

    #[test]
    fn test_list_literal() {
        assert_eq!(eval("[a, 1]").unwrap(), Value::from(vec![3i64, 1]));
        assert_eq!(eval("length([a, s])").unwrap(), Value::Int64(2));
    }
}
