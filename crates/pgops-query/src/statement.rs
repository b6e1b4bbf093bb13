//! Statement builders.
//!
//! Each builder assembles a template with `%s` markers, then numbers the
//! markers and checks them against the parameter list. The resulting
//! [`Statement`] is ready for [`pgops_core::Connection`].

use std::fmt;

use pgops_core::{
    Error, QualifiedName, QueryError, QueryErrorKind, Result, Value, column_ident, table_ident,
};

use crate::clause::WhereClause;
use crate::fields::FieldsAndValues;
use crate::placeholder::{count_placeholders, number_placeholders};

/// Row limit applied by [`SelectQuery`] unless changed.
pub const DEFAULT_SELECT_LIMIT: u64 = 100;

/// A numbered SQL statement and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    /// Number the `%s` markers in `template` and pair them with `params`.
    ///
    /// Fails when the marker count differs from the number of values.
    pub fn new(template: &str, params: Vec<Value>) -> Result<Self> {
        let markers = count_placeholders(template);
        if markers != params.len() {
            let mut err = QueryError::new(
                QueryErrorKind::Parameter,
                format!(
                    "statement has {markers} placeholders but {} values were supplied",
                    params.len()
                ),
            );
            err.sql = Some(template.to_string());
            return Err(Error::Query(err));
        }
        let sql = number_placeholders(template, 0);
        tracing::trace!(sql = %sql, params = params.len(), "built statement");
        Ok(Self { sql, params })
    }

    /// A statement that already uses `$n` placeholders.
    pub fn raw(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Split a `returning` list such as `"gid, description"` into trimmed names.
pub fn returning_fields(returning: &str) -> Vec<String> {
    returning
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// `insert into T (fields) values (placeholders)[ returning ...]`
pub fn insert(
    table: &str,
    fields: &FieldsAndValues,
    returning: Option<&str>,
) -> Result<Statement> {
    let mut template = format!(
        "insert into {} ({}) values ({})",
        table_ident(table),
        fields.field_names,
        fields.placeholders
    );
    if let Some(returning) = returning {
        let names = returning_fields(returning);
        if names.is_empty() {
            return Err(Error::Custom("empty returning field list".to_string()));
        }
        let rendered: Vec<String> = names.iter().map(|n| column_ident(n)).collect();
        template.push_str(" returning ");
        template.push_str(&rendered.join(","));
    }
    Statement::new(&template, fields.values.clone())
}

/// `update T set (fields) = row(placeholders)[ where ...]`
///
/// Without a where clause every row is updated. Where values follow the
/// field values in the parameter list.
pub fn update(
    table: &str,
    fields: &FieldsAndValues,
    where_clause: Option<&WhereClause>,
) -> Result<Statement> {
    let mut template = format!(
        "update {} set ({}) = row({})",
        table_ident(table),
        fields.field_names,
        fields.placeholders
    );
    let mut params = fields.values.clone();
    if let Some(wc) = where_clause {
        template.push_str(" where ");
        template.push_str(&wc.condition);
        params.extend(wc.values.iter().cloned());
    }
    Statement::new(&template, params)
}

/// `delete from T[ where ...]`
pub fn delete(table: &str, where_clause: Option<&WhereClause>) -> Result<Statement> {
    let mut template = format!("delete from {}", table_ident(table));
    let mut params = Vec::new();
    if let Some(wc) = where_clause {
        template.push_str(" where ");
        template.push_str(&wc.condition);
        params.extend(wc.values.iter().cloned());
    }
    Statement::new(&template, params)
}

/// A SELECT over one table.
///
/// `fields`, `group_by` and `order_by` are SQL text and go into the
/// statement as written, so expressions such as `st_asgeojson(geom)` work.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub fields: String,
    pub where_clause: Option<WhereClause>,
    pub group_by: Option<String>,
    pub order_by: Option<String>,
    pub limit: Option<u64>,
}

impl SelectQuery {
    /// `select * from table limit 100`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: "*".to_string(),
            where_clause: None,
            group_by: None,
            order_by: None,
            limit: Some(DEFAULT_SELECT_LIMIT),
        }
    }

    /// Comma-separated select list.
    pub fn fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = fields.into();
        self
    }

    pub fn filter(mut self, where_clause: WhereClause) -> Self {
        self.where_clause = Some(where_clause);
        self
    }

    /// Group-by list, without the `group by` words.
    pub fn group_by(mut self, group_by: impl Into<String>) -> Self {
        self.group_by = Some(group_by.into());
        self
    }

    /// Order-by list, without the `order by` words (e.g. `depth desc`).
    pub fn order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Return every matching row.
    pub fn no_limit(mut self) -> Self {
        self.limit = None;
        self
    }

    fn template(&self) -> (String, Vec<Value>) {
        let mut sql = format!("select {} from {}", self.fields, table_ident(&self.table));
        let mut params = Vec::new();
        if let Some(wc) = &self.where_clause {
            sql.push_str(" where ");
            sql.push_str(&wc.condition);
            params.extend(wc.values.iter().cloned());
        }
        if let Some(group_by) = &self.group_by {
            sql.push_str(" group by ");
            sql.push_str(group_by);
        }
        if let Some(order_by) = &self.order_by {
            sql.push_str(" order by ");
            sql.push_str(order_by);
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" limit {limit}"));
        }
        (sql, params)
    }

    /// The plain select, one result row per table row.
    ///
    /// ```
    /// use pgops_core::Value;
    /// use pgops_query::{SelectQuery, WhereClause};
    ///
    /// let stmt = SelectQuery::new("d.points")
    ///     .fields("gid, st_astext(geom)")
    ///     .filter(WhereClause::new("depth > %s", vec![Value::Double(5.0)]))
    ///     .order_by("depth desc")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(
    ///     stmt.sql,
    ///     "select gid, st_astext(geom) from d.points where depth > $1 order by depth desc limit 100"
    /// );
    /// ```
    pub fn build(&self) -> Result<Statement> {
        let (sql, params) = self.template();
        Statement::new(&sql, params)
    }

    /// The select aggregated into a single JSON array of row objects.
    ///
    /// The result has one row and one column, NULL when nothing matched.
    pub fn build_records(&self) -> Result<Statement> {
        let (inner, params) = self.template();
        let sql = format!(
            "SELECT array_to_json(array_agg(registros)) FROM ({inner}) as registros"
        );
        Statement::new(&sql, params)
    }
}

/// Whether `schema.table` exists.
pub fn table_exists(name: &QualifiedName) -> Statement {
    Statement::raw(
        "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
         WHERE table_schema::text = $1 AND table_name::text = $2)",
        vec![
            Value::Text(name.schema.clone()),
            Value::Text(name.table.clone()),
        ],
    )
}

/// Column names of `schema.table` in table order.
pub fn table_columns(name: &QualifiedName) -> Statement {
    Statement::raw(
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_schema::text = $1 AND table_name::text = $2 \
         ORDER BY ordinal_position",
        vec![
            Value::Text(name.schema.clone()),
            Value::Text(name.table.clone()),
        ],
    )
}

/// Whether any row of `table` has `field = value`.
pub fn value_exists(table: &str, field: &str, value: Value) -> Result<Statement> {
    let field = column_ident(field);
    let template = format!(
        "SELECT exists (SELECT {field} FROM {} WHERE {field} = %s LIMIT 1)",
        table_ident(table)
    );
    Statement::new(&template, vec![value])
}

/// `create table "schema"."table" (definition)`
pub fn create_table(name: &QualifiedName, definition: &str) -> Statement {
    Statement::raw(
        format!("create table {} ({definition})", name.quoted()),
        Vec::new(),
    )
}

/// `drop table "schema"."table"`
pub fn drop_table(name: &QualifiedName) -> Statement {
    Statement::raw(format!("drop table {}", name.quoted()), Vec::new())
}

pub fn create_schema_if_not_exists(schema: &str) -> Statement {
    Statement::raw(
        format!("create schema if not exists {}", column_ident(schema)),
        Vec::new(),
    )
}

/// `create sequence S as integer start with N increment by M`
///
/// The server does not accept bind parameters in DDL, so the two numbers
/// are written into the statement.
pub fn create_sequence(sequence: &str, start: i64, increment_by: i64) -> Statement {
    Statement::raw(
        format!(
            "create sequence {} as integer start with {start} increment by {increment_by}",
            table_ident(sequence)
        ),
        Vec::new(),
    )
}

pub fn drop_sequence_if_exists(sequence: &str) -> Statement {
    Statement::raw(
        format!("drop sequence if exists {}", table_ident(sequence)),
        Vec::new(),
    )
}

/// Advance a sequence and return its new value.
pub fn nextval(sequence: &str) -> Statement {
    Statement::raw(
        "select nextval($1::text::regclass)",
        vec![Value::Text(table_ident(sequence))],
    )
}

/// The last value handed out by a sequence.
pub fn last_value(sequence: &str) -> Statement {
    Statement::raw(
        format!("select last_value from {}", table_ident(sequence)),
        Vec::new(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryFieldOptions;

    fn point_fields() -> FieldsAndValues {
        FieldsAndValues::builder([
            ("gid", Value::Int(1)),
            ("depth", Value::Double(12.15)),
            ("description", Value::from("water well")),
            ("geom", Value::from("POINT(100 200)")),
        ])
        .remove_fields(&["gid"])
        .geometry(GeometryFieldOptions::new(25830).reproject_to(25831))
        .build()
        .unwrap()
    }

    #[test]
    fn statement_checks_marker_count() {
        let err = Statement::new("gid = %s and depth = %s", vec![Value::Int(1)]).unwrap_err();
        match err {
            Error::Query(q) => {
                assert_eq!(q.kind, QueryErrorKind::Parameter);
                assert_eq!(q.sql.as_deref(), Some("gid = %s and depth = %s"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn insert_statement() {
        let stmt = insert("d.points", &point_fields(), None).unwrap();
        assert_eq!(
            stmt.sql,
            "insert into d.points (depth,description,geom) values \
             ($1,$2,st_transform(st_geometryfromtext($3,25830),25831))"
        );
        assert_eq!(stmt.params.len(), 3);
    }

    #[test]
    fn insert_with_returning() {
        let stmt = insert("d.points", &point_fields(), Some(" gid , description")).unwrap();
        assert!(stmt.sql.ends_with(" returning gid,description"));
        assert!(insert("d.points", &point_fields(), Some(" , ")).is_err());
    }

    #[test]
    fn returning_names_are_trimmed() {
        assert_eq!(returning_fields("gid, depth ,geom"), vec!["gid", "depth", "geom"]);
    }

    #[test]
    fn update_with_where() {
        let wc = WhereClause::new("gid = %s", vec![Value::Int(3)]);
        let stmt = update("d.points", &point_fields(), Some(&wc)).unwrap();
        assert_eq!(
            stmt.sql,
            "update d.points set (depth,description,geom) = \
             row($1,$2,st_transform(st_geometryfromtext($3,25830),25831)) where gid = $4"
        );
        assert_eq!(stmt.params.last(), Some(&Value::Int(3)));
    }

    #[test]
    fn update_without_where_touches_all_rows() {
        let fields = FieldsAndValues::new([("description", "x")]).unwrap();
        let stmt = update("d.points", &fields, None).unwrap();
        assert_eq!(stmt.sql, "update d.points set (description) = row($1)");
    }

    #[test]
    fn delete_statements() {
        assert_eq!(delete("d.points", None).unwrap().sql, "delete from d.points");
        let wc = WhereClause::new("depth > %s and description like %s", vec![
            Value::Double(1.0),
            Value::from("w%"),
        ]);
        assert_eq!(
            delete("d.points", Some(&wc)).unwrap().sql,
            "delete from d.points where depth > $1 and description like $2"
        );
    }

    #[test]
    fn select_defaults() {
        let stmt = SelectQuery::new("d.points").build().unwrap();
        assert_eq!(stmt.sql, "select * from d.points limit 100");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn select_with_every_clause() {
        let query = SelectQuery::new("d.points")
            .fields("description, count(*)")
            .filter(WhereClause::new("depth > %s", vec![Value::Double(1.0)]))
            .group_by("description")
            .order_by("description")
            .limit(5);
        assert_eq!(
            query.build().unwrap().sql,
            "select description, count(*) from d.points where depth > $1 \
             group by description order by description limit 5"
        );
        assert_eq!(
            query.no_limit().build().unwrap().sql,
            "select description, count(*) from d.points where depth > $1 \
             group by description order by description"
        );
    }

    #[test]
    fn select_records_wraps_inner_query() {
        let stmt = SelectQuery::new("d.points")
            .filter(WhereClause::column_equals("gid", 3_i32))
            .build_records()
            .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT array_to_json(array_agg(registros)) FROM \
             (select * from d.points where gid = $1 limit 100) as registros"
        );
    }

    #[test]
    fn introspection_statements() {
        let name = QualifiedName::parse("d.points");
        let exists = table_exists(&name);
        assert!(exists.sql.contains("information_schema.tables"));
        assert_eq!(exists.params, vec![Value::from("d"), Value::from("points")]);
        assert!(table_columns(&name).sql.contains("ORDER BY ordinal_position"));

        let stmt = value_exists("d.points", "description", Value::from("x")).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT exists (SELECT description FROM d.points WHERE description = $1 LIMIT 1)"
        );
    }

    #[test]
    fn ddl_statements() {
        let name = QualifiedName::parse("d.customers");
        assert_eq!(
            create_table(&name, "gid serial, name varchar").sql,
            "create table \"d\".\"customers\" (gid serial, name varchar)"
        );
        assert_eq!(drop_table(&name).sql, "drop table \"d\".\"customers\"");
        assert_eq!(
            create_schema_if_not_exists("counters").sql,
            "create schema if not exists counters"
        );
    }

    #[test]
    fn sequence_statements() {
        assert_eq!(
            create_sequence("counters.visits", 10, 2).sql,
            "create sequence counters.visits as integer start with 10 increment by 2"
        );
        assert_eq!(
            drop_sequence_if_exists("counters.visits").sql,
            "drop sequence if exists counters.visits"
        );
        let next = nextval("counters.visits");
        assert_eq!(next.sql, "select nextval($1::text::regclass)");
        assert_eq!(next.params, vec![Value::from("counters.visits")]);
        assert_eq!(
            last_value("counters.visits").sql,
            "select last_value from counters.visits"
        );
    }
}
