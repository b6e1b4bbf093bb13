//! Named counters backed by sequences.
//!
//! Each counter is a sequence in the `counters` schema. The catalogue table
//! `counters.counters` keeps one row per counter with its description.

use serde::{Deserialize, Serialize};

use pgops_core::{Connection, Error, Result};
use pgops_query::statement;
use pgops_query::{FieldsAndValues, SelectQuery, WhereClause};

use crate::operations::PgOperations;

/// Schema holding the counter sequences.
pub const COUNTER_SCHEMA: &str = "counters";
/// Catalogue of counters.
pub const COUNTERS_TABLE: &str = "counters.counters";

const COUNTERS_TABLE_DEFINITION: &str =
    "gid serial primary key, counter_name varchar unique, counter_description varchar";

/// One catalogue row plus the counter's current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterInfo {
    pub gid: i64,
    pub counter_name: String,
    pub counter_description: Option<String>,
    #[serde(default)]
    pub value: i64,
}

/// Counter management on top of [`PgOperations`].
///
/// ```rust,ignore
/// let mut counters = PgCounters::new(&mut ops);
/// counters.add_counter("visits", "page visits", 1, 1, false)?;
/// let n = counters.increment_counter("visits", false)?;
/// ```
#[derive(Debug)]
pub struct PgCounters<'a, C: Connection> {
    ops: &'a mut PgOperations<C>,
}

fn sequence_name(counter: &str) -> String {
    format!("{COUNTER_SCHEMA}.{counter}")
}

impl<'a, C: Connection> PgCounters<'a, C> {
    pub fn new(ops: &'a mut PgOperations<C>) -> Self {
        Self { ops }
    }

    /// Create a counter starting at `start` and stepping by `increment_by`.
    ///
    /// The schema and catalogue table are created on first use. Adding a
    /// counter that already exists fails with the server's error.
    #[tracing::instrument(level = "debug", skip(self, description))]
    pub fn add_counter(
        &mut self,
        name: &str,
        description: &str,
        start: i64,
        increment_by: i64,
        log_query: bool,
    ) -> Result<()> {
        if start < 1 {
            return Err(Error::Custom(format!(
                "counter start can not be less than 1, got {start}"
            )));
        }

        self.ops.run_execute(
            "add_counter",
            &statement::create_schema_if_not_exists(COUNTER_SCHEMA),
            log_query,
        )?;
        self.ops
            .create_table(COUNTERS_TABLE, COUNTERS_TABLE_DEFINITION, false, log_query)?;
        self.ops.run_execute(
            "add_counter",
            &statement::create_sequence(&sequence_name(name), start, increment_by),
            log_query,
        )?;
        self.ops.commit_if_auto()?;

        let fields = FieldsAndValues::new([
            ("counter_name", name),
            ("counter_description", description),
        ])?;
        self.ops.insert(COUNTERS_TABLE, &fields, None, log_query)?;
        tracing::info!(counter = name, start, increment_by, "counter added");
        Ok(())
    }

    /// Drop the counter's sequence and catalogue row.
    ///
    /// Returns the number of catalogue rows deleted; a missing counter
    /// yields 0.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn delete_counter(&mut self, name: &str, log_query: bool) -> Result<u64> {
        self.ops.run_execute(
            "delete_counter",
            &statement::drop_sequence_if_exists(&sequence_name(name)),
            log_query,
        )?;
        self.ops.commit_if_auto()?;
        if !self.ops.table_exists(COUNTERS_TABLE, log_query)? {
            return Ok(0);
        }
        let wc = WhereClause::column_equals("counter_name", name);
        self.ops.delete(COUNTERS_TABLE, Some(&wc), log_query)
    }

    /// Advance the counter and return its new value.
    ///
    /// The step is not undone if the surrounding transaction rolls back.
    pub fn increment_counter(&mut self, name: &str, log_query: bool) -> Result<i64> {
        let stmt = statement::nextval(&sequence_name(name));
        self.single_i64("increment_counter", &stmt, log_query)
    }

    /// The counter's last value.
    pub fn counter_value(&mut self, name: &str, log_query: bool) -> Result<i64> {
        let stmt = statement::last_value(&sequence_name(name));
        self.single_i64("counter_value", &stmt, log_query)
    }

    /// Every counter with its current value, in creation order.
    pub fn all_counters(&mut self, log_query: bool) -> Result<Vec<CounterInfo>> {
        let query = SelectQuery::new(COUNTERS_TABLE).order_by("gid").no_limit();
        let records = self.ops.select_records(&query, log_query)?;
        records
            .into_iter()
            .map(|record| {
                let mut info: CounterInfo =
                    serde_json::from_value(serde_json::Value::Object(record))?;
                info.value = self.counter_value(&info.counter_name, log_query)?;
                Ok(info)
            })
            .collect()
    }

    fn single_i64(
        &mut self,
        operation: &'static str,
        stmt: &statement::Statement,
        log_query: bool,
    ) -> Result<i64> {
        let rows = self.ops.run_query(operation, stmt, log_query)?;
        let row = rows
            .first()
            .ok_or_else(|| Error::Custom(format!("{operation} returned no rows")))?;
        row.get_as::<i64>(0)
    }
}
