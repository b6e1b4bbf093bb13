//! Turning a key-value mapping into column list, values and placeholders.

use std::fmt;

use pgops_core::{Error, Result, Value, column_ident};

use crate::geometry::GeometryFieldOptions;
use crate::placeholder::count_placeholders;

/// The three SQL fragments an insert or update needs.
///
/// - `field_names`: `depth,description,geom`
/// - `values`: one bind value per `%s` marker in `placeholders`
/// - `placeholders`: `%s,%s,st_geometryfromtext(%s,25830)`
#[derive(Debug, Clone, PartialEq)]
pub struct FieldsAndValues {
    pub field_names: String,
    pub values: Vec<Value>,
    pub placeholders: String,
}

impl FieldsAndValues {
    /// Use fragments written by hand.
    ///
    /// Nothing is checked here; a mismatch between markers and values is
    /// reported when the statement is built.
    pub fn from_parts(
        field_names: impl Into<String>,
        values: Vec<Value>,
        placeholders: impl Into<String>,
    ) -> Self {
        Self {
            field_names: field_names.into(),
            values,
            placeholders: placeholders.into(),
        }
    }

    /// Start from an ordered mapping of column name to value.
    pub fn builder<I, K, V>(pairs: I) -> FieldsAndValuesBuilder
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        FieldsAndValuesBuilder::new(pairs)
    }

    /// Build straight from a mapping, without removals or geometry handling.
    ///
    /// ```
    /// use pgops_core::Value;
    /// use pgops_query::FieldsAndValues;
    ///
    /// let fav = FieldsAndValues::new([
    ///     ("depth", Value::Double(12.15)),
    ///     ("description", Value::from("water well")),
    /// ])
    /// .unwrap();
    /// assert_eq!(fav.field_names, "depth,description");
    /// assert_eq!(fav.placeholders, "%s,%s");
    /// ```
    pub fn new<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::builder(pairs).build()
    }

    /// Build from a JSON object, keeping key order.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        FieldsAndValuesBuilder::from_json(json)?.build()
    }

    /// Number of `%s` markers in the placeholder fragment.
    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.placeholders)
    }

    /// The column names as a list, in mapping order.
    pub fn columns(&self) -> Vec<&str> {
        if self.field_names.is_empty() {
            return Vec::new();
        }
        self.field_names.split(',').map(str::trim).collect()
    }
}

impl fmt::Display for FieldsAndValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fields: {}; placeholders: {}; values: [",
            self.field_names, self.placeholders
        )?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

/// Builder for [`FieldsAndValues`].
#[derive(Debug, Clone, Default)]
pub struct FieldsAndValuesBuilder {
    entries: Vec<(String, Value)>,
    remove: Vec<String>,
    geometry: Option<GeometryFieldOptions>,
}

impl FieldsAndValuesBuilder {
    /// A repeated key keeps its first position and takes the later value.
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut builder = Self::default();
        for (key, value) in pairs {
            builder.insert(key.into(), value.into());
        }
        builder
    }

    /// Read the mapping from a JSON object.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let object = json.as_object().ok_or_else(|| {
            Error::Custom(format!("expected a JSON object of fields, got {json}"))
        })?;
        Ok(Self::new(
            object
                .iter()
                .map(|(key, value)| (key.clone(), Value::from_json(value.clone()))),
        ))
    }

    fn insert(&mut self, key: String, value: Value) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Add or replace one field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key.into(), value.into());
        self
    }

    /// Leave these keys out of the statement. Keys missing from the
    /// mapping are ignored.
    pub fn remove_fields<S: AsRef<str>>(mut self, keys: &[S]) -> Self {
        self.remove
            .extend(keys.iter().map(|k| k.as_ref().to_string()));
        self
    }

    /// Treat one key as a WKT geometry.
    pub fn geometry(mut self, options: GeometryFieldOptions) -> Self {
        self.geometry = Some(options);
        self
    }

    pub fn build(self) -> Result<FieldsAndValues> {
        let Self {
            entries,
            remove,
            geometry,
        } = self;

        let mut names = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        let mut placeholders = Vec::with_capacity(entries.len());

        for (key, value) in entries {
            if remove.iter().any(|r| *r == key) {
                continue;
            }
            let placeholder = match &geometry {
                Some(geom) if geom.field_name == key => geom.placeholder(),
                _ => "%s".to_string(),
            };
            names.push(column_ident(&key));
            values.push(if value.is_empty_text() {
                Value::Null
            } else {
                value
            });
            placeholders.push(placeholder);
        }

        if names.is_empty() {
            return Err(Error::Custom(
                "no fields left to write after removing excluded keys".to_string(),
            ));
        }

        Ok(FieldsAndValues {
            field_names: names.join(","),
            values,
            placeholders: placeholders.join(","),
        })
    }
}
