//! PostGIS geometry column options.
//!
//! Geometries travel as WKT text on the way in and come back as WKT, GeoJSON
//! or raw EWKB on the way out, optionally reprojected to another EPSG code.

use std::fmt;
use std::str::FromStr;

use pgops_core::{Error, Result, exact_ident};

/// Column name used when none is configured.
pub const DEFAULT_GEOMETRY_FIELD: &str = "geom";

/// Parse an EPSG code given as text (e.g. `"25830"`).
pub fn parse_epsg(code: &str) -> Result<u32> {
    code.trim()
        .parse::<u32>()
        .map_err(|_| Error::config(format!("invalid EPSG code '{code}'")))
}

/// Geometry handling for insert and update mappings.
///
/// The value stored under `field_name` in the mapping must be WKT; it is
/// wrapped in `st_geometryfromtext(%s,EPSG)` and, when a target code is set,
/// in `st_transform(...,EPSG_TO)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryFieldOptions {
    pub field_name: String,
    pub epsg: u32,
    pub epsg_to_reproject: Option<u32>,
}

impl GeometryFieldOptions {
    /// Options for a `geom` column whose WKT is in `epsg`.
    pub fn new(epsg: u32) -> Self {
        Self {
            field_name: DEFAULT_GEOMETRY_FIELD.to_string(),
            epsg,
            epsg_to_reproject: None,
        }
    }

    /// Use a different geometry column name.
    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    /// Reproject the geometry to `epsg` before storing it.
    pub fn reproject_to(mut self, epsg: u32) -> Self {
        self.epsg_to_reproject = Some(epsg);
        self
    }

    /// The value expression for the geometry column, with one `%s` marker.
    pub fn placeholder(&self) -> String {
        let from_text = format!("st_geometryfromtext(%s,{})", self.epsg);
        match self.epsg_to_reproject {
            Some(target) => format!("st_transform({from_text},{target})"),
            None => from_text,
        }
    }
}

/// Output encoding for geometry columns in a select list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectGeometryFormat {
    /// WKT via `st_astext`
    #[default]
    Text,
    /// GeoJSON via `st_asgeojson`
    GeoJson,
    /// The raw column (EWKB)
    Binary,
}

impl SelectGeometryFormat {
    pub const fn as_str(self) -> &'static str {
        match self {
            SelectGeometryFormat::Text => "text",
            SelectGeometryFormat::GeoJson => "geojson",
            SelectGeometryFormat::Binary => "binary",
        }
    }
}

impl FromStr for SelectGeometryFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(SelectGeometryFormat::Text),
            "geojson" => Ok(SelectGeometryFormat::GeoJson),
            "binary" => Ok(SelectGeometryFormat::Binary),
            other => Err(Error::config(format!(
                "select geometry format '{other}' not in ['binary', 'geojson', 'text']"
            ))),
        }
    }
}

impl fmt::Display for SelectGeometryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a geometry column should appear in a select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectGeometryFieldOptions {
    pub field_name: String,
    pub epsg_to_reproject: Option<u32>,
    pub format: SelectGeometryFormat,
}

impl Default for SelectGeometryFieldOptions {
    fn default() -> Self {
        Self {
            field_name: DEFAULT_GEOMETRY_FIELD.to_string(),
            epsg_to_reproject: None,
            format: SelectGeometryFormat::default(),
        }
    }
}

impl SelectGeometryFieldOptions {
    /// Text output for the `geom` column.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    pub fn format(mut self, format: SelectGeometryFormat) -> Self {
        self.format = format;
        self
    }

    pub fn reproject_to(mut self, epsg: u32) -> Self {
        self.epsg_to_reproject = Some(epsg);
        self
    }

    /// The select-list expression for the geometry column.
    ///
    /// The field name keeps its exact spelling, as it does in the catalogue,
    /// so a mixed-case name is quoted.
    ///
    /// ```
    /// use pgops_query::{SelectGeometryFieldOptions, SelectGeometryFormat};
    ///
    /// let opts = SelectGeometryFieldOptions::new()
    ///     .format(SelectGeometryFormat::GeoJson)
    ///     .reproject_to(25831);
    /// assert_eq!(opts.select_expression(), "st_asgeojson(st_transform(geom,25831))");
    /// ```
    pub fn select_expression(&self) -> String {
        let column = exact_ident(&self.field_name);
        let source = match self.epsg_to_reproject {
            Some(epsg) => format!("st_transform({column},{epsg})"),
            None => column,
        };
        match self.format {
            SelectGeometryFormat::Binary => source,
            SelectGeometryFormat::Text => format!("st_astext({source})"),
            SelectGeometryFormat::GeoJson => format!("st_asgeojson({source})"),
        }
    }
}
