//! Core types and traits for pgops.
//!
//! This crate provides the foundational pieces shared by the SQL assembly
//! layer and the driver binding:
//!
//! - [`Value`] for bind parameters and decoded columns
//! - [`Row`] and [`Record`] for results
//! - [`Connection`] trait for executing statements
//! - [`Error`] and [`Result`]
//! - identifier quoting helpers

pub mod connection;
pub mod error;
pub mod identifiers;
pub mod row;
pub mod value;

pub use connection::Connection;
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, QueryError, QueryErrorKind, Result,
    SchemaError, SchemaErrorKind, TypeError,
};
pub use identifiers::{
    DEFAULT_SCHEMA, QualifiedName, column_ident, exact_ident, is_plain_identifier, quote_ident,
    table_ident,
};
pub use row::{ColumnInfo, FromValue, Record, Row};
pub use value::Value;
