mod common;

use std::fmt;
use std::sync::{Arc, Mutex};

use common::RecordingConnection;
use pgops::prelude::*;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// Level and SQL text of every statement event above TRACE.
#[derive(Clone, Default)]
struct StatementLog(Arc<Mutex<Vec<(Level, String)>>>);

impl StatementLog {
    fn entries(&self) -> Vec<(Level, String)> {
        self.0.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct SqlField(Option<String>);

impl Visit for SqlField {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "sql" {
            self.0 = Some(format!("{value:?}"));
        }
    }
}

impl<S: Subscriber> Layer<S> for StatementLog {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level == Level::TRACE {
            return;
        }
        let mut sql = SqlField::default();
        event.record(&mut sql);
        if let Some(sql) = sql.0 {
            self.0.lock().unwrap().push((level, sql));
        }
    }
}

fn capture(f: impl FnOnce()) -> Vec<(Level, String)> {
    let log = StatementLog::default();
    let subscriber = tracing_subscriber::registry().with(log.clone());
    tracing::subscriber::with_default(subscriber, f);
    log.entries()
}

fn description() -> FieldsAndValues {
    FieldsAndValues::new([("description", "water well")]).unwrap()
}

#[test]
fn statements_log_at_debug_by_default() {
    let entries = capture(|| {
        let mut ops = PgOperations::new(RecordingConnection::new());
        ops.insert("d.points", &description(), None, false).unwrap();
    });
    assert_eq!(
        entries,
        vec![(
            Level::DEBUG,
            "insert into d.points (description) values ($1)".to_string()
        )]
    );
}

#[test]
fn per_call_flag_logs_at_info() {
    let entries = capture(|| {
        let mut ops = PgOperations::new(RecordingConnection::new());
        ops.insert("d.points", &description(), None, true).unwrap();
        ops.delete("d.points", None, false).unwrap();
    });
    assert_eq!(
        entries,
        vec![
            (
                Level::INFO,
                "insert into d.points (description) values ($1)".to_string()
            ),
            (Level::DEBUG, "delete from d.points".to_string()),
        ]
    );
}

#[test]
fn configured_logging_applies_to_every_call() {
    let entries = capture(|| {
        let config = OperationsConfig::new().log_queries(true);
        let mut ops = PgOperations::with_config(RecordingConnection::new(), config);
        ops.update("d.points", &description(), None, false).unwrap();
        ops.select(&SelectQuery::new("d.points"), false).unwrap();
    });
    let levels: Vec<Level> = entries.iter().map(|(level, _)| *level).collect();
    assert_eq!(levels, vec![Level::INFO, Level::INFO]);
    assert_eq!(entries[1].1, "select * from d.points limit 100");
}
