//! In-memory `Connection` that records statements and replays canned results.

#![allow(dead_code)]

use std::collections::VecDeque;

use pgops::{Connection, QueryError, QueryErrorKind, Result, Row, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub kind: &'static str,
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Default)]
pub struct RecordingConnection {
    pub statements: Vec<Recorded>,
    pub query_results: VecDeque<Vec<Row>>,
    pub execute_results: VecDeque<u64>,
    pub commits: usize,
    pub rollbacks: usize,
    pub autocommit: bool,
    /// Fail any statement whose SQL contains this text.
    pub fail_on: Option<String>,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_result(mut self, rows: Vec<Row>) -> Self {
        self.query_results.push_back(rows);
        self
    }

    pub fn with_execute_result(mut self, affected: u64) -> Self {
        self.execute_results.push_back(affected);
        self
    }

    pub fn sqls(&self) -> Vec<&str> {
        self.statements.iter().map(|s| s.sql.as_str()).collect()
    }

    fn record(&mut self, kind: &'static str, sql: &str, params: &[Value]) -> Result<()> {
        self.statements.push(Recorded {
            kind,
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        if let Some(pattern) = &self.fail_on {
            if sql.contains(pattern.as_str()) {
                let mut err = QueryError::new(QueryErrorKind::AlreadyExists, "relation already exists");
                err.sqlstate = Some("42P07".to_string());
                err.sql = Some(sql.to_string());
                return Err(err.into());
            }
        }
        Ok(())
    }
}

impl Connection for RecordingConnection {
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.record("query", sql, params)?;
        Ok(self.query_results.pop_front().unwrap_or_default())
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.record("execute", sql, params)?;
        Ok(self.execute_results.pop_front().unwrap_or(0))
    }

    fn batch_execute(&mut self, sql: &str) -> Result<()> {
        self.record("batch", sql, &[])
    }

    fn commit(&mut self) -> Result<()> {
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.rollbacks += 1;
        Ok(())
    }

    fn set_autocommit(&mut self, enabled: bool) -> Result<()> {
        self.autocommit = enabled;
        Ok(())
    }

    fn is_autocommit(&self) -> bool {
        self.autocommit
    }
}

/// A one-column, one-row result.
pub fn single(column: &str, value: Value) -> Vec<Row> {
    vec![Row::new(vec![column.to_string()], vec![value])]
}

/// The result shape of a records select: one JSON array cell.
pub fn records(json: serde_json::Value) -> Vec<Row> {
    single("array_to_json", Value::Json(json))
}

/// One row per column name, as returned by the columns lookup.
pub fn column_names(names: &[&str]) -> Vec<Row> {
    names
        .iter()
        .map(|n| Row::new(vec!["column_name".to_string()], vec![Value::from(*n)]))
        .collect()
}
