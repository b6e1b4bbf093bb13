//! SQL assembly for pgops.
//!
//! Everything here is pure string and parameter assembly; nothing talks to a
//! database. Fragments are written with `%s` markers and numbered into `$n`
//! placeholders when a [`Statement`] is built.

pub mod clause;
pub mod fields;
pub mod geometry;
pub mod placeholder;
pub mod statement;

pub use clause::WhereClause;
pub use fields::{FieldsAndValues, FieldsAndValuesBuilder};
pub use geometry::{
    DEFAULT_GEOMETRY_FIELD, GeometryFieldOptions, SelectGeometryFieldOptions,
    SelectGeometryFormat, parse_epsg,
};
pub use placeholder::{count_placeholders, number_placeholders};
pub use statement::{DEFAULT_SELECT_LIMIT, SelectQuery, Statement, returning_fields};
