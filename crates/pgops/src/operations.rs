//! CRUD operations driven by key-value mappings.

use std::path::{Path, PathBuf};

use serde::Serialize;

use pgops_core::{
    Connection, Error, QualifiedName, Record, Result, Row, SchemaError, SchemaErrorKind, Value,
    exact_ident,
};
use pgops_query::statement::{self, Statement};
use pgops_query::{
    FieldsAndValues, SelectGeometryFieldOptions, SelectQuery, WhereClause, returning_fields,
};

/// Behaviour shared by every [`PgOperations`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationsConfig {
    /// Commit after each insert and update.
    pub auto_commit: bool,
    /// Log every statement at INFO instead of DEBUG.
    pub log_queries: bool,
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            auto_commit: true,
            log_queries: false,
        }
    }
}

impl OperationsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_commit(mut self, enabled: bool) -> Self {
        self.auto_commit = enabled;
        self
    }

    pub fn log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }
}

/// Outcome of [`PgOperations::delete_with_files`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletedFiles {
    pub rows_deleted: u64,
    /// File names removed from disk.
    pub deleted_files: Vec<String>,
    /// File names that were not regular files on disk.
    pub missing_files: Vec<String>,
    pub base_path: Option<PathBuf>,
}

/// Remove the file named by `record[file_field]`, resolved against
/// `base_path` when given.
///
/// Returns `false` when the field is missing or not a string, or when the
/// path is not a regular file.
pub fn delete_file_in_row(
    record: &Record,
    file_field: &str,
    base_path: Option<&Path>,
) -> Result<bool> {
    match record.get(file_field).and_then(serde_json::Value::as_str) {
        Some(name) => remove_file_under(name, base_path),
        None => Ok(false),
    }
}

fn remove_file_under(name: &str, base_path: Option<&Path>) -> Result<bool> {
    let path = match base_path {
        Some(base) => base.join(name.trim_start_matches('/')),
        None => PathBuf::from(name),
    };
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "file not found");
        return Ok(false);
    }
    std::fs::remove_file(&path)?;
    tracing::debug!(path = %path.display(), "file deleted");
    Ok(true)
}

/// Insert, update, select and delete rows described by key-value mappings.
///
/// Every method takes a `log_query` flag; when it or
/// [`OperationsConfig::log_queries`] is set the statement and its values are
/// logged at INFO.
///
/// ```rust,ignore
/// let mut ops = PgOperations::new(conn);
/// let fav = FieldsAndValues::builder([
///     ("description", Value::from("water well")),
///     ("geom", Value::from("POINT(100 200)")),
/// ])
/// .geometry(GeometryFieldOptions::new(25830))
/// .build()?;
/// let inserted = ops.insert("d.points", &fav, Some("gid"), false)?;
/// ```
#[derive(Debug)]
pub struct PgOperations<C: Connection> {
    conn: C,
    config: OperationsConfig,
    last_query: Option<String>,
}

impl<C: Connection> PgOperations<C> {
    pub fn new(conn: C) -> Self {
        Self::with_config(conn, OperationsConfig::default())
    }

    pub fn with_config(conn: C, config: OperationsConfig) -> Self {
        Self {
            conn,
            config,
            last_query: None,
        }
    }

    pub fn config(&self) -> &OperationsConfig {
        &self.config
    }

    /// SQL text of the most recent statement.
    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    pub fn connection(&mut self) -> &mut C {
        &mut self.conn
    }

    pub fn into_connection(self) -> C {
        self.conn
    }

    pub fn commit(&mut self) -> Result<()> {
        self.conn.commit()
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.conn.rollback()
    }

    pub(crate) fn commit_if_auto(&mut self) -> Result<()> {
        if self.config.auto_commit {
            self.conn.commit()?;
        }
        Ok(())
    }

    fn log_statement(&mut self, operation: &'static str, stmt: &Statement, log_query: bool) {
        if self.config.log_queries || log_query {
            tracing::info!(operation, sql = %stmt.sql, values = ?stmt.params, "query");
        } else {
            tracing::debug!(operation, sql = %stmt.sql, values = ?stmt.params, "query");
        }
        self.last_query = Some(stmt.sql.clone());
    }

    pub(crate) fn run_execute(
        &mut self,
        operation: &'static str,
        stmt: &Statement,
        log_query: bool,
    ) -> Result<u64> {
        self.log_statement(operation, stmt, log_query);
        let affected = self.conn.execute(&stmt.sql, &stmt.params)?;
        tracing::debug!(operation, rows = affected, "executed");
        Ok(affected)
    }

    pub(crate) fn run_query(
        &mut self,
        operation: &'static str,
        stmt: &Statement,
        log_query: bool,
    ) -> Result<Vec<Row>> {
        self.log_statement(operation, stmt, log_query);
        let rows = self.conn.query(&stmt.sql, &stmt.params)?;
        tracing::debug!(operation, rows = rows.len(), "queried");
        Ok(rows)
    }

    fn query_bool(&mut self, operation: &'static str, stmt: &Statement, log_query: bool) -> Result<bool> {
        let rows = self.run_query(operation, stmt, log_query)?;
        match rows.first() {
            Some(row) => row.get_as::<bool>(0),
            None => Ok(false),
        }
    }

    /// Insert one row.
    ///
    /// With `returning` (e.g. `"gid, description"`) the result holds one
    /// record keyed by the trimmed field names; otherwise it is empty.
    #[tracing::instrument(level = "debug", skip(self, fields))]
    pub fn insert(
        &mut self,
        table: &str,
        fields: &FieldsAndValues,
        returning: Option<&str>,
        log_query: bool,
    ) -> Result<Vec<Record>> {
        let stmt = statement::insert(table, fields, returning)?;
        let records = match returning {
            Some(returning) => {
                let rows = self.run_query("insert", &stmt, log_query)?;
                rows.first()
                    .map(|row| {
                        returning_fields(returning)
                            .into_iter()
                            .zip(row.values().map(Value::to_json))
                            .collect::<Record>()
                    })
                    .into_iter()
                    .collect()
            }
            None => {
                self.run_execute("insert", &stmt, log_query)?;
                Vec::new()
            }
        };
        self.commit_if_auto()?;
        Ok(records)
    }

    /// Update rows; without a where clause every row is updated.
    #[tracing::instrument(level = "debug", skip(self, fields, where_clause))]
    pub fn update(
        &mut self,
        table: &str,
        fields: &FieldsAndValues,
        where_clause: Option<&WhereClause>,
        log_query: bool,
    ) -> Result<u64> {
        let stmt = statement::update(table, fields, where_clause)?;
        let updated = self.run_execute("update", &stmt, log_query)?;
        self.commit_if_auto()?;
        Ok(updated)
    }

    /// Delete rows and commit, whatever the auto-commit setting.
    #[tracing::instrument(level = "debug", skip(self, where_clause))]
    pub fn delete(
        &mut self,
        table: &str,
        where_clause: Option<&WhereClause>,
        log_query: bool,
    ) -> Result<u64> {
        let stmt = statement::delete(table, where_clause)?;
        let deleted = self.run_execute("delete", &stmt, log_query)?;
        self.conn.commit()?;
        Ok(deleted)
    }

    /// Delete rows along with the files their `file_field` names.
    ///
    /// `file_field` is the column name with its exact spelling. Rows whose
    /// file field is NULL are deleted without touching disk. Every row is
    /// checked before any file is removed: when the rows do not carry
    /// `file_field`, or it holds something other than text, nothing is
    /// deleted and an error is returned.
    #[tracing::instrument(level = "debug", skip(self, where_clause))]
    pub fn delete_with_files(
        &mut self,
        table: &str,
        file_field: &str,
        where_clause: Option<&WhereClause>,
        base_path: Option<&Path>,
        log_query: bool,
    ) -> Result<DeletedFiles> {
        let mut query = SelectQuery::new(table)
            .fields(exact_ident(file_field))
            .no_limit();
        if let Some(wc) = where_clause {
            query = query.filter(wc.clone());
        }

        let records = self.select_records(&query, log_query)?;
        let mut names = Vec::with_capacity(records.len());
        for record in &records {
            match record.get(file_field) {
                Some(serde_json::Value::String(name)) => names.push(name.as_str()),
                Some(serde_json::Value::Null) => {}
                Some(other) => {
                    return Err(Error::Custom(format!(
                        "the file field {file_field} holds {other}, not a file name"
                    )));
                }
                None => {
                    return Err(Error::Schema(SchemaError {
                        kind: SchemaErrorKind::ColumnNotFound,
                        message: format!("the file field {file_field} is not a field of {table}"),
                    }));
                }
            }
        }

        let mut outcome = DeletedFiles {
            base_path: base_path.map(Path::to_path_buf),
            ..DeletedFiles::default()
        };
        for name in names {
            if remove_file_under(name, base_path)? {
                outcome.deleted_files.push(name.to_string());
            } else {
                outcome.missing_files.push(name.to_string());
            }
        }

        outcome.rows_deleted = self.delete(table, where_clause, log_query)?;
        Ok(outcome)
    }

    /// Rows as returned by the server.
    pub fn select(&mut self, query: &SelectQuery, log_query: bool) -> Result<Vec<Row>> {
        let stmt = query.build()?;
        self.run_query("select", &stmt, log_query)
    }

    /// Rows as JSON objects keyed by column name.
    pub fn select_records(&mut self, query: &SelectQuery, log_query: bool) -> Result<Vec<Record>> {
        let stmt = query.build_records()?;
        let rows = self.run_query("select", &stmt, log_query)?;
        let aggregated = match rows.first().and_then(|row| row.get(0)) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Json(json)) => json.clone(),
            Some(Value::Text(text)) => serde_json::from_str(text)?,
            Some(other) => {
                return Err(Error::Custom(format!(
                    "expected a JSON array of rows, got {}",
                    other.type_name()
                )));
            }
        };
        match aggregated {
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::Object(record) => Ok(record),
                    other => Err(Error::Custom(format!("expected a row object, got {other}"))),
                })
                .collect(),
            serde_json::Value::Null => Ok(Vec::new()),
            other => Err(Error::Custom(format!("expected a JSON array of rows, got {other}"))),
        }
    }

    /// Column names of `schema.table`, ready for a select list.
    ///
    /// Columns in `remove` are left out. The geometry column, when given, is
    /// replaced by its select expression and must exist. Returns `None`
    /// when the table has no columns (or does not exist).
    #[tracing::instrument(level = "debug", skip(self, geometry))]
    pub fn table_field_names(
        &mut self,
        table: &str,
        geometry: Option<&SelectGeometryFieldOptions>,
        remove: &[&str],
        log_query: bool,
    ) -> Result<Option<Vec<String>>> {
        let name = QualifiedName::parse(table);
        let stmt = statement::table_columns(&name);
        let rows = self.run_query("table_field_names", &stmt, log_query)?;
        if rows.is_empty() {
            return Ok(None);
        }
        let columns = rows
            .iter()
            .map(|row| row.get_as::<String>(0))
            .collect::<Result<Vec<_>>>()?;

        if let Some(geom) = geometry {
            if !columns.iter().any(|c| *c == geom.field_name) {
                return Err(Error::Schema(SchemaError {
                    kind: SchemaErrorKind::ColumnNotFound,
                    message: format!(
                        "the geometry field {} is not a field of the table {name}",
                        geom.field_name
                    ),
                }));
            }
        }

        let fields = columns
            .iter()
            .filter(|c| !remove.contains(&c.as_str()))
            .map(|c| match geometry {
                Some(geom) if *c == geom.field_name => geom.select_expression(),
                _ => exact_ident(c),
            })
            .collect();
        Ok(Some(fields))
    }

    /// [`table_field_names`](Self::table_field_names) joined with commas.
    pub fn join_field_names(
        &mut self,
        table: &str,
        geometry: Option<&SelectGeometryFieldOptions>,
        remove: &[&str],
        log_query: bool,
    ) -> Result<Option<String>> {
        Ok(self
            .table_field_names(table, geometry, remove, log_query)?
            .map(|fields| fields.join(",")))
    }

    /// Whether `schema.table` exists; a bare name is looked up in `public`.
    pub fn table_exists(&mut self, table: &str, log_query: bool) -> Result<bool> {
        let stmt = statement::table_exists(&QualifiedName::parse(table));
        self.query_bool("table_exists", &stmt, log_query)
    }

    /// Create `schema.table` from a column definition list.
    ///
    /// Returns `false`, leaving the table alone, when it already exists and
    /// `drop_if_exists` is not set.
    #[tracing::instrument(level = "debug", skip(self, definition))]
    pub fn create_table(
        &mut self,
        table: &str,
        definition: &str,
        drop_if_exists: bool,
        log_query: bool,
    ) -> Result<bool> {
        let name = QualifiedName::parse(table);
        if self.table_exists(table, log_query)? {
            if !drop_if_exists {
                return Ok(false);
            }
            self.run_execute("drop_table", &statement::drop_table(&name), log_query)?;
        }
        self.run_execute(
            "create_table",
            &statement::create_table(&name, definition),
            log_query,
        )?;
        self.conn.commit()?;
        Ok(true)
    }

    /// Whether some row has `field = value`.
    pub fn value_exists(
        &mut self,
        table: &str,
        field: &str,
        value: impl Into<Value>,
        log_query: bool,
    ) -> Result<bool> {
        let stmt = statement::value_exists(table, field, value.into())?;
        self.query_bool("value_exists", &stmt, log_query)
    }

    /// Delete every row whose `column` equals `value`.
    pub fn delete_rows_with_column_value(
        &mut self,
        table: &str,
        column: &str,
        value: impl Into<Value>,
        log_query: bool,
    ) -> Result<u64> {
        let wc = WhereClause::column_equals(column, value);
        self.delete(table, Some(&wc), log_query)
    }
}
