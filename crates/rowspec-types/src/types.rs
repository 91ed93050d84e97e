//! Type expressions for declared fields and runtime columns
//!
//! Builtin types form a small nominal hierarchy rooted at `Any`:
//!
//! ```text
//! Any
//! ├── Number ── Real ─┬─ Integer ─┬─ Signed ─── Int8 Int16 Int32 Int64
//! │                   │           └─ Unsigned ─ UInt8 UInt16 UInt32 UInt64 UInt128
//! │                   └─ AbstractFloat ── Float32 Float64
//! ├── AbstractString ── String
//! └── Missing Bool Symbol UUID Date DateTime SchemaVersion <custom>
//! ```
//!
//! Lists are covariant in their element type and unions follow the usual
//! set rules.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A type expression
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeExpr {
    Any,
    Missing,
    Bool,
    Number,
    Real,
    Integer,
    Signed,
    Unsigned,
    AbstractFloat,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    Float32,
    Float64,
    AbstractString,
    String,
    Symbol,
    Uuid,
    Date,
    DateTime,
    SchemaVersion,
    /// Ordered sequence whose elements are all subtypes of the element type
    List(Box<TypeExpr>),
    /// Normalized union: flat, deduplicated, at least two members
    Union(Vec<TypeExpr>),
    /// Opaque custom type declared outside this crate
    Named(std::string::String),
}

/// Builtin names without type parameters, in display form.
const SIMPLE_TYPES: &[(&str, TypeExpr)] = &[
    ("Any", TypeExpr::Any),
    ("Missing", TypeExpr::Missing),
    ("Bool", TypeExpr::Bool),
    ("Number", TypeExpr::Number),
    ("Real", TypeExpr::Real),
    ("Integer", TypeExpr::Integer),
    ("Signed", TypeExpr::Signed),
    ("Unsigned", TypeExpr::Unsigned),
    ("AbstractFloat", TypeExpr::AbstractFloat),
    ("Int8", TypeExpr::Int8),
    ("Int16", TypeExpr::Int16),
    ("Int32", TypeExpr::Int32),
    ("Int64", TypeExpr::Int64),
    ("UInt8", TypeExpr::UInt8),
    ("UInt16", TypeExpr::UInt16),
    ("UInt32", TypeExpr::UInt32),
    ("UInt64", TypeExpr::UInt64),
    ("UInt128", TypeExpr::UInt128),
    ("Float32", TypeExpr::Float32),
    ("Float64", TypeExpr::Float64),
    ("AbstractString", TypeExpr::AbstractString),
    ("String", TypeExpr::String),
    ("Symbol", TypeExpr::Symbol),
    ("UUID", TypeExpr::Uuid),
    ("Date", TypeExpr::Date),
    ("DateTime", TypeExpr::DateTime),
    ("SchemaVersion", TypeExpr::SchemaVersion),
];

impl TypeExpr {
    /// Build a list type.
    pub fn list(element: TypeExpr) -> Self {
        Self::List(Box::new(element))
    }

    /// Build a normalized union.
    ///
    /// Nested unions are flattened and duplicates removed, keeping first
    /// occurrence order. A union containing `Any` is `Any`; a single-member
    /// union is that member.
    pub fn union(members: impl IntoIterator<Item = TypeExpr>) -> Self {
        let mut flat: Vec<TypeExpr> = Vec::new();
        for member in members {
            match member {
                TypeExpr::Union(inner) => {
                    for m in inner {
                        if !flat.contains(&m) {
                            flat.push(m);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }

        if flat.contains(&TypeExpr::Any) {
            return TypeExpr::Any;
        }
        if flat.len() == 1 {
            return flat.remove(0);
        }
        TypeExpr::Union(flat)
    }

    /// `Union{inner, Missing}`.
    pub fn optional(inner: TypeExpr) -> Self {
        Self::union([inner, TypeExpr::Missing])
    }

    /// Build an opaque custom type.
    pub fn named(name: impl Into<std::string::String>) -> Self {
        Self::Named(name.into())
    }

    /// Immediate nominal supertype, `None` for types directly under `Any`.
    pub fn supertype(&self) -> Option<TypeExpr> {
        use TypeExpr::*;
        match self {
            Int8 | Int16 | Int32 | Int64 => Some(Signed),
            UInt8 | UInt16 | UInt32 | UInt64 | UInt128 => Some(Unsigned),
            Signed | Unsigned => Some(Integer),
            Float32 | Float64 => Some(AbstractFloat),
            Integer | AbstractFloat => Some(Real),
            Real => Some(Number),
            String => Some(AbstractString),
            _ => None,
        }
    }

    /// Whether `self <: other`.
    pub fn is_subtype(&self, other: &TypeExpr) -> bool {
        if *other == TypeExpr::Any || self == other {
            return true;
        }

        match (self, other) {
            (TypeExpr::Union(members), _) => members.iter().all(|m| m.is_subtype(other)),
            (_, TypeExpr::Union(members)) => members.iter().any(|m| self.is_subtype(m)),
            (TypeExpr::List(a), TypeExpr::List(b)) => a.is_subtype(b),
            _ => {
                let mut current = self.supertype();
                while let Some(ty) = current {
                    if ty == *other {
                        return true;
                    }
                    current = ty.supertype();
                }
                false
            }
        }
    }

    /// Whether a missing value conforms to this type.
    pub fn admits_missing(&self) -> bool {
        TypeExpr::Missing.is_subtype(self)
    }

    /// This type with `Missing` removed, if it was a union member.
    pub fn non_missing(&self) -> TypeExpr {
        match self {
            TypeExpr::Union(members) => {
                TypeExpr::union(members.iter().filter(|m| **m != TypeExpr::Missing).cloned())
            }
            other => other.clone(),
        }
    }

    /// Whether this is one of the concrete integer types.
    pub fn is_concrete_integer(&self) -> bool {
        use TypeExpr::*;
        matches!(
            self,
            Int8 | Int16 | Int32 | Int64 | UInt8 | UInt16 | UInt32 | UInt64 | UInt128
        )
    }

    /// Whether this is one of the concrete float types.
    pub fn is_concrete_float(&self) -> bool {
        matches!(self, TypeExpr::Float32 | TypeExpr::Float64)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::List(element) => write!(f, "List{{{element}}}"),
            TypeExpr::Union(members) => {
                f.write_str("Union{")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{member}")?;
                }
                f.write_str("}")
            }
            TypeExpr::Named(name) => f.write_str(name),
            simple => {
                let name = SIMPLE_TYPES
                    .iter()
                    .find(|(_, ty)| ty == simple)
                    .map_or("?", |(name, _)| *name);
                f.write_str(name)
            }
        }
    }
}

impl FromStr for TypeExpr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tokens = tokenize(s)?;
        let mut parser = TypeParser {
            input: s,
            tokens,
            pos: 0,
        };
        let ty = parser.parse_type()?;
        if parser.pos != parser.tokens.len() {
            return Err(Error::type_parse(s, "unexpected trailing input"));
        }
        Ok(ty)
    }
}

impl TryFrom<std::string::String> for TypeExpr {
    type Error = Error;

    fn try_from(value: std::string::String) -> Result<Self> {
        value.parse()
    }
}

impl From<TypeExpr> for std::string::String {
    fn from(ty: TypeExpr) -> Self {
        ty.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(std::string::String),
    Open,
    Close,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' => {
                chars.next();
                tokens.push(Token::Open);
            }
            '}' => {
                chars.next();
                tokens.push(Token::Close);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                let mut ident = std::string::String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            other => {
                return Err(Error::type_parse(
                    input,
                    format!("unexpected character '{other}'"),
                ));
            }
        }
    }

    if tokens.is_empty() {
        return Err(Error::type_parse(input, "type expression is empty"));
    }
    Ok(tokens)
}

struct TypeParser<'a> {
    input: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl TypeParser<'_> {
    fn parse_type(&mut self) -> Result<TypeExpr> {
        let name = match self.tokens.get(self.pos) {
            Some(Token::Ident(name)) => name.clone(),
            _ => return Err(Error::type_parse(self.input, "expected a type name")),
        };
        self.pos += 1;

        let mut params = Vec::new();
        let has_params = self.tokens.get(self.pos) == Some(&Token::Open);
        if has_params {
            self.pos += 1;
            loop {
                params.push(self.parse_type()?);
                match self.tokens.get(self.pos) {
                    Some(Token::Comma) => self.pos += 1,
                    Some(Token::Close) => {
                        self.pos += 1;
                        break;
                    }
                    _ => {
                        return Err(Error::type_parse(
                            self.input,
                            format!("unterminated parameter list for '{name}'"),
                        ));
                    }
                }
            }
        }

        self.resolve(&name, has_params, params)
    }

    fn resolve(&self, name: &str, has_params: bool, mut params: Vec<TypeExpr>) -> Result<TypeExpr> {
        match name {
            "List" | "Vector" | "AbstractVector" => match params.len() {
                0 => Ok(TypeExpr::list(TypeExpr::Any)),
                1 => Ok(TypeExpr::list(params.remove(0))),
                n => Err(Error::type_parse(
                    self.input,
                    format!("{name} takes one element type, got {n}"),
                )),
            },
            "Union" => {
                if params.is_empty() {
                    return Err(Error::type_parse(self.input, "Union needs at least one member"));
                }
                Ok(TypeExpr::union(params))
            }
            "Optional" => {
                if params.len() != 1 {
                    return Err(Error::type_parse(self.input, "Optional takes exactly one type"));
                }
                Ok(TypeExpr::optional(params.remove(0)))
            }
            _ => {
                if has_params {
                    return Err(Error::type_parse(
                        self.input,
                        format!("type '{name}' does not take parameters"),
                    ));
                }
                if let Some((_, ty)) = SIMPLE_TYPES.iter().find(|(n, _)| *n == name) {
                    return Ok(ty.clone());
                }
                if name.starts_with(|c: char| c.is_ascii_uppercase()) {
                    Ok(TypeExpr::named(name))
                } else {
                    Err(Error::type_parse(
                        self.input,
                        format!("'{name}' is not a type name; type names start with an uppercase letter"),
                    ))
                }
            }
        }
    }
}
