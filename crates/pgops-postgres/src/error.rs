//! Mapping driver errors onto [`pgops_core::Error`].

use pgops_core::{ConnectionError, ConnectionErrorKind, Error, QueryError, QueryErrorKind};
use postgres::error::{DbError, ErrorPosition};

/// Convert a `postgres` error.
///
/// Server errors keep their SQLSTATE, detail, hint and position. Class 08
/// and 28 codes and closed connections become connection errors.
pub fn from_pg(err: postgres::Error) -> Error {
    if let Some(db) = err.as_db_error() {
        let connection_kind = match db.code().code().get(..2) {
            Some("08") => Some(ConnectionErrorKind::Connect),
            Some("28") => Some(ConnectionErrorKind::Authentication),
            _ => None,
        };
        let mut query = server_error(db);
        if let Some(kind) = connection_kind {
            return Error::Connection(ConnectionError {
                kind,
                message: query.message,
                source: Some(Box::new(err)),
            });
        }
        query.source = Some(Box::new(err));
        return Error::Query(query);
    }

    if err.is_closed() {
        return Error::Connection(ConnectionError {
            kind: ConnectionErrorKind::Disconnected,
            message: "connection closed".to_string(),
            source: Some(Box::new(err)),
        });
    }

    let message = full_message(&err);
    let kind = if message.starts_with("error serializing parameter") {
        QueryErrorKind::Parameter
    } else {
        QueryErrorKind::Database
    };
    let mut query = QueryError::new(kind, message);
    query.source = Some(Box::new(err));
    Error::Query(query)
}

fn server_error(db: &DbError) -> QueryError {
    let code = db.code().code();
    QueryError {
        kind: QueryErrorKind::from_sqlstate(code),
        sql: None,
        sqlstate: Some(code.to_string()),
        message: db.message().to_string(),
        detail: db.detail().map(str::to_string),
        hint: db.hint().map(str::to_string),
        position: db.position().map(|p| match p {
            ErrorPosition::Original(pos) => *pos as usize,
            ErrorPosition::Internal { position, .. } => *position as usize,
        }),
        source: None,
    }
}

// The driver's Display stops at the outer message; append the cause.
fn full_message(err: &postgres::Error) -> String {
    match std::error::Error::source(err) {
        Some(cause) => format!("{err}: {cause}"),
        None => err.to_string(),
    }
}
