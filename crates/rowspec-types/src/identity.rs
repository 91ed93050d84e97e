//! Schema identity
//!
//! A [`SchemaVersion`] is the universal key for a declared schema: a validated
//! [`SchemaName`] plus a non-negative integer version. Qualified identifiers
//! chain versions from most specific to most general, e.g.
//! `example.child@2>example.parent@1`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between a schema name and its version.
pub const VERSION_SEPARATOR: char = '@';

/// Separator between entries of a qualified identifier.
pub const PARENT_SEPARATOR: char = '>';

/// A schema name restricted to lowercase ASCII letters, digits, `.` and `-`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaName(String);

impl SchemaName {
    /// Validate and wrap a schema name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSchemaName`] when the name is empty or contains
    /// a character outside `[a-z0-9.-]`.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::invalid_schema_name(name, "name is empty"));
        }
        if let Some(bad) = name.chars().find(|c| !is_schema_name_char(*c)) {
            return Err(Error::invalid_schema_name(
                name.clone(),
                format!("character '{bad}' is not a lowercase letter, digit, '.' or '-'"),
            ));
        }
        Ok(Self(name))
    }

    /// The validated name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_schema_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-'
}

impl fmt::Display for SchemaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SchemaName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for SchemaName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for SchemaName {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SchemaName> for String {
    fn from(name: SchemaName) -> Self {
        name.0
    }
}

impl FromStr for SchemaName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// An immutable `(name, version)` schema identity
///
/// The parent of a schema version is not part of its identity; it is recorded
/// once, when the version is declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaVersion {
    name: SchemaName,
    version: u64,
}

impl SchemaVersion {
    /// Construct a schema version from a raw name and version.
    ///
    /// # Errors
    ///
    /// Returns an error when the name is not a valid [`SchemaName`] or the
    /// version is negative.
    pub fn new(name: impl Into<String>, version: i64) -> Result<Self> {
        let name = SchemaName::new(name)?;
        let version = u64::try_from(version).map_err(|_| Error::InvalidVersion {
            name: name.to_string(),
            version,
        })?;
        Ok(Self { name, version })
    }

    /// Construct from an already validated name.
    pub fn from_parts(name: SchemaName, version: u64) -> Self {
        Self { name, version }
    }

    /// The schema name.
    pub fn name(&self) -> &SchemaName {
        &self.name
    }

    /// The schema version number.
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.name, VERSION_SEPARATOR, self.version)
    }
}

impl FromStr for SchemaVersion {
    type Err = Error;

    /// Parse a single `name@version` entry.
    fn from_str(s: &str) -> Result<Self> {
        let mut chain = parse_identifier(s)?;
        match (chain.pop(), chain.is_empty()) {
            (Some(sv), true) => Ok(sv),
            _ => Err(Error::malformed_identifier(
                s,
                "expected a single name@version entry",
            )),
        }
    }
}

impl TryFrom<String> for SchemaVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SchemaVersion> for String {
    fn from(sv: SchemaVersion) -> Self {
        sv.to_string()
    }
}

/// Parse a qualified identifier into schema versions, most specific first.
///
/// The grammar is `Entry ('>' Entry)*` with `Entry = Name '@' Integer`.
///
/// # Errors
///
/// Returns [`Error::MalformedIdentifier`] for empty input, an entry without
/// exactly one `@`, a non-integer or negative version, or an invalid name.
pub fn parse_identifier(input: &str) -> Result<Vec<SchemaVersion>> {
    if input.is_empty() {
        return Err(Error::malformed_identifier(input, "identifier is empty"));
    }

    input
        .split(PARENT_SEPARATOR)
        .map(|entry| parse_entry(input, entry))
        .collect()
}

fn parse_entry(input: &str, entry: &str) -> Result<SchemaVersion> {
    let parts: Vec<&str> = entry.split(VERSION_SEPARATOR).collect();
    let [name, version] = parts.as_slice() else {
        return Err(Error::malformed_identifier(
            input,
            format!("entry '{entry}' must have the form name@version"),
        ));
    };

    let version: i64 = version.parse().map_err(|_| {
        Error::malformed_identifier(
            input,
            format!("version '{version}' in entry '{entry}' is not an integer"),
        )
    })?;

    SchemaVersion::new(*name, version)
        .map_err(|e| Error::malformed_identifier(input, e.to_string()))
}

/// Render schema versions, most specific first, as a qualified identifier.
pub fn format_identifier(chain: &[SchemaVersion]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(&PARENT_SEPARATOR.to_string())
}
