//! SQL identifier quoting and table-name handling.
//!
//! Column and table names coming from mapping keys are interpolated into SQL,
//! so anything that is not a plain identifier gets double-quoted.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Schema assumed when a table name carries no schema prefix.
pub const DEFAULT_SCHEMA: &str = "public";

fn plain_identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").expect("static regex is valid"))
}

fn folded_identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_$]*$").expect("static regex is valid"))
}

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`).
///
/// # Examples
///
/// ```
/// use pgops_core::quote_ident;
///
/// assert_eq!(quote_ident("points"), "\"points\"");
/// assert_eq!(quote_ident("25_utm"), "\"25_utm\"");
/// assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Whether `name` can appear unquoted: a letter or underscore followed by
/// letters, digits, underscores or `$`.
pub fn is_plain_identifier(name: &str) -> bool {
    plain_identifier_re().is_match(name)
}

/// Render a column name for interpolation.
///
/// Plain identifiers pass through untouched (and fold to lower case on the
/// server, as unquoted names do); everything else is quoted. Names that are
/// already double-quoted are kept as given.
///
/// ```
/// use pgops_core::column_ident;
///
/// assert_eq!(column_ident("depth"), "depth");
/// assert_eq!(column_ident("25_utm"), "\"25_utm\"");
/// assert_eq!(column_ident("\"Name\""), "\"Name\"");
/// ```
pub fn column_ident(name: &str) -> String {
    if is_plain_identifier(name) || is_quoted(name) {
        name.to_string()
    } else {
        quote_ident(name)
    }
}

/// Render a name that must reach the server with its exact spelling.
///
/// Used for names read back from the catalogue and for database names.
/// Only lower-case plain identifiers survive case folding unquoted, so
/// anything else is quoted.
///
/// ```
/// use pgops_core::exact_ident;
///
/// assert_eq!(exact_ident("geom"), "geom");
/// assert_eq!(exact_ident("Shape"), "\"Shape\"");
/// assert_eq!(exact_ident("GisDb"), "\"GisDb\"");
/// ```
pub fn exact_ident(name: &str) -> String {
    if folded_identifier_re().is_match(name) {
        name.to_string()
    } else {
        quote_ident(name)
    }
}

fn is_quoted(name: &str) -> bool {
    name.len() >= 2 && name.starts_with('"') && name.ends_with('"')
}

/// Render a possibly schema-qualified table name for interpolation.
///
/// Each dot-separated part goes through [`column_ident`].
pub fn table_ident(name: &str) -> String {
    match name.split_once('.') {
        Some((schema, table)) => format!("{}.{}", column_ident(schema), column_ident(table)),
        None => column_ident(name),
    }
}

/// A table name split into schema and table parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedName {
    pub schema: String,
    pub table: String,
}

impl QualifiedName {
    /// Split `schema.table` at the first dot. A bare name lands in the
    /// `public` schema.
    ///
    /// ```
    /// use pgops_core::QualifiedName;
    ///
    /// let name = QualifiedName::parse("d.points");
    /// assert_eq!(name.schema, "d");
    /// assert_eq!(name.table, "points");
    /// assert_eq!(QualifiedName::parse("points").schema, "public");
    /// ```
    pub fn parse(name: &str) -> Self {
        match name.split_once('.') {
            Some((schema, table)) => Self {
                schema: schema.to_string(),
                table: table.to_string(),
            },
            None => Self {
                schema: DEFAULT_SCHEMA.to_string(),
                table: name.to_string(),
            },
        }
    }

    /// Render as `"schema"."table"`.
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.table))
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}
