//! Insert, update, select and delete PostgreSQL/PostGIS rows from plain
//! key-value mappings.
//!
//! `pgops` turns ordered mappings of column name to value into
//! parameterized statements and runs them on a [`Connection`]. Values are
//! always bound, never interpolated. Geometry columns take WKT and can be
//! reprojected on the way in or out.
//!
//! # Quick Start
//!
//! ```ignore
//! use pgops::prelude::*;
//!
//! let conn = PgConnection::connect(PgConfig::from_env()?)?;
//! let mut ops = PgOperations::new(conn);
//!
//! // Insert
//! let fav = FieldsAndValues::builder([
//!     ("depth", Value::Double(12.15)),
//!     ("description", Value::from("water well")),
//!     ("geom", Value::from("POINT(100 200)")),
//! ])
//! .geometry(GeometryFieldOptions::new(25830))
//! .build()?;
//! let inserted = ops.insert("d.points", &fav, Some("gid"), false)?;
//!
//! // Select as records
//! let wc = WhereClause::new("depth > %s", vec![Value::Double(10.0)]);
//! let fields = ops
//!     .join_field_names("d.points", Some(&SelectGeometryFieldOptions::new()), &[], false)?
//!     .unwrap_or_else(|| "*".to_string());
//! let rows = ops.select_records(&SelectQuery::new("d.points").fields(fields).filter(wc), false)?;
//!
//! // Delete
//! ops.delete("d.points", Some(&WhereClause::column_equals("gid", 3)), false)?;
//! ```
//!
//! # Crates
//!
//! - `pgops-core`: values, rows, errors and the [`Connection`] trait
//! - `pgops-query`: SQL fragment and statement assembly
//! - `pgops-postgres`: the `postgres` driver binding

pub mod counters;
pub mod operations;

pub use pgops_core::{
    ColumnInfo, ConfigError, Connection, ConnectionError, ConnectionErrorKind, Error, FromValue,
    QualifiedName, QueryError, QueryErrorKind, Record, Result, Row, SchemaError,
    SchemaErrorKind, TypeError, Value, column_ident, exact_ident, quote_ident,
    table_ident,
};
pub use pgops_postgres::{PgConfig, PgConnection, PgDatabases, SslMode};
pub use pgops_query::{
    FieldsAndValues, FieldsAndValuesBuilder, GeometryFieldOptions, SelectGeometryFieldOptions,
    SelectGeometryFormat, SelectQuery, Statement, WhereClause, parse_epsg,
};

pub use counters::{COUNTER_SCHEMA, COUNTERS_TABLE, CounterInfo, PgCounters};
pub use operations::{DeletedFiles, OperationsConfig, PgOperations, delete_file_in_row};

/// Commonly used items.
///
/// ```ignore
/// use pgops::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Connection, CounterInfo, DeletedFiles, Error, FieldsAndValues, GeometryFieldOptions,
        OperationsConfig, PgConfig, PgConnection, PgCounters, PgDatabases, PgOperations, Record,
        Result, Row, SelectGeometryFieldOptions, SelectGeometryFormat, SelectQuery, Value,
        WhereClause,
    };
}
