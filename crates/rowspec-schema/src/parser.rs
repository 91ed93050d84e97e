//! Field and constraint statement parsing
//!
//! Field statements normalize to `name::Type = initializer`:
//!
//! | Form                  | Type  | Initializer |
//! |-----------------------|-------|-------------|
//! | `name`                | `Any` | `name`      |
//! | `name::T`             | `T`   | `name`      |
//! | `name = expr`         | `Any` | `expr`      |
//! | `name::T = expr`      | `T`   | `expr`      |
//! | `name::(<:T) [= expr]`| `T`, open | `expr` or `name` |
//!
//! Constraint statements are written `@check <expr>`.

use crate::expr::{Expr, is_identifier, parse_expr};
use crate::model::{Constraint, DeclaredFieldInfo, Statement};
use crate::{Error, Result};
use rowspec_types::TypeExpr;

const CHECK_MACRO: &str = "check";

/// Parse a field or `@check` statement.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the statement matches none of the accepted forms.
pub fn parse_statement(input: &str) -> Result<Statement> {
    let trimmed = input.trim();
    match trimmed.strip_prefix('@') {
        Some(rest) => parse_macro(input, rest).map(Statement::Check),
        None => parse_field(input).map(Statement::Field),
    }
}

fn parse_macro(input: &str, rest: &str) -> Result<Constraint> {
    let (word, body) = rest
        .split_once(char::is_whitespace)
        .unwrap_or((rest, ""));
    if word != CHECK_MACRO {
        return Err(Error::parse(input, format!("unknown statement '@{word}'")));
    }
    let source = body.trim();
    if source.is_empty() {
        return Err(Error::parse(input, "'@check' requires an expression"));
    }
    let expr = parse_expr(source)?;
    Ok(Constraint::Expr {
        source: source.to_string(),
        expr,
    })
}

/// Parse a single field statement into canonical form.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the statement matches none of the five field forms.
pub fn parse_field(input: &str) -> Result<DeclaredFieldInfo> {
    let (head, initializer) = match find_assignment(input) {
        Some(idx) => (&input[..idx], Some(&input[idx + 1..])),
        None => (input, None),
    };
    let (name, type_part) = match head.find("::") {
        Some(idx) => (&head[..idx], Some(&head[idx + 2..])),
        None => (head, None),
    };

    let name = name.trim();
    if !is_identifier(name) {
        return Err(Error::parse(input, format!("'{name}' is not a valid field name")));
    }

    let mut field = match type_part {
        Some(type_part) => parse_field_type(input, name, type_part.trim())?,
        None => DeclaredFieldInfo::new(name, TypeExpr::Any),
    };

    if let Some(source) = initializer {
        let source = source.trim();
        if source.is_empty() {
            return Err(Error::parse(input, "missing initializer after '='"));
        }
        field = field.with_initializer(parse_expr(source)?);
    }

    Ok(field)
}

fn parse_field_type(input: &str, name: &str, source: &str) -> Result<DeclaredFieldInfo> {
    if source.is_empty() {
        return Err(Error::parse(input, "missing type after '::'"));
    }
    if let Some(inner) = source.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        let Some(bound) = inner.trim().strip_prefix("<:") else {
            return Err(Error::parse(input, "open field types are written '(<:T)'"));
        };
        return Ok(DeclaredFieldInfo::open(name, parse_type(input, bound.trim())?));
    }
    Ok(DeclaredFieldInfo::new(name, parse_type(input, source)?))
}

fn parse_type(input: &str, source: &str) -> Result<TypeExpr> {
    source
        .parse()
        .map_err(|e: rowspec_types::Error| Error::parse(input, e.to_string()))
}

/// Byte offset of the top-level `=` separating a field head from its
/// initializer, skipping comparison operators, brackets and string literals.
fn find_assignment(input: &str) -> Option<usize> {
    let bytes = input.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => i += 1,
                b'"' => in_string = false,
                _ => {}
            }
        } else {
            match b {
                b'"' => in_string = true,
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth = depth.saturating_sub(1),
                b'=' if depth == 0 => {
                    let prev = i.checked_sub(1).map(|p| bytes[p]);
                    let next = bytes.get(i + 1).copied();
                    if next == Some(b'=') {
                        i += 1;
                    } else if !matches!(prev, Some(b'=' | b'!' | b'<' | b'>')) {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }

    None
}
