//! Synchronous PostgreSQL connection.

use pgops_core::{Connection, ConnectionError, ConnectionErrorKind, Error, Result, Row, Value};
use postgres::types::ToSql;
use postgres::{Client, NoTls};

use crate::config::PgConfig;
use crate::error::from_pg;
use crate::types::{PgParam, decode_rows};

/// A connection to one PostgreSQL database.
///
/// Outside autocommit mode the first statement opens a transaction, which
/// stays open until [`Connection::commit`] or [`Connection::rollback`].
/// After a failed statement the transaction must be rolled back before the
/// connection accepts more work.
pub struct PgConnection {
    client: Client,
    config: Option<PgConfig>,
    autocommit: bool,
    in_transaction: bool,
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("PgConnection");
        if let Some(config) = &self.config {
            s.field("host", &config.host)
                .field("port", &config.port)
                .field("database", &config.database);
        }
        s.field("autocommit", &self.autocommit)
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}

impl PgConnection {
    /// Open a connection.
    #[tracing::instrument(level = "debug", skip(config), fields(host = %config.host, port = config.port, database = %config.database))]
    pub fn connect(config: PgConfig) -> Result<Self> {
        let pg_config = config.to_pg_config()?;
        let client = pg_config.connect(NoTls).map_err(|e| {
            if e.as_db_error().is_some() {
                from_pg(e)
            } else {
                Error::Connection(ConnectionError {
                    kind: ConnectionErrorKind::Connect,
                    message: format!("failed to connect to {}: {e}", config.socket_addr()),
                    source: Some(Box::new(e)),
                })
            }
        })?;
        tracing::debug!("connected");
        Ok(Self {
            client,
            config: Some(config),
            autocommit: false,
            in_transaction: false,
        })
    }

    /// Wrap a client opened elsewhere.
    ///
    /// The client must not be inside a transaction.
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            config: None,
            autocommit: false,
            in_transaction: false,
        }
    }

    /// The configuration used by [`PgConnection::connect`], if any.
    pub fn config(&self) -> Option<&PgConfig> {
        self.config.as_ref()
    }

    /// The underlying driver client.
    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    /// Whether a transaction is open on this connection.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Roll back any open transaction and close the connection.
    pub fn disconnect(mut self) -> Result<()> {
        if self.in_transaction && !self.client.is_closed() {
            self.rollback()?;
        }
        self.client.close().map_err(from_pg)?;
        tracing::debug!("disconnected");
        Ok(())
    }

    fn begin_if_needed(&mut self) -> Result<()> {
        if !self.autocommit && !self.in_transaction {
            self.client.batch_execute("BEGIN").map_err(from_pg)?;
            self.in_transaction = true;
            tracing::trace!("transaction opened");
        }
        Ok(())
    }

    fn finish(&mut self, sql: &str) -> Result<()> {
        if self.in_transaction {
            // The server ends the transaction even when COMMIT fails.
            self.in_transaction = false;
            self.client.batch_execute(sql).map_err(from_pg)?;
            tracing::trace!(statement = sql, "transaction closed");
        }
        Ok(())
    }
}

fn bind(params: &[Value]) -> Vec<PgParam<'_>> {
    params.iter().map(PgParam).collect()
}

fn as_refs<'a>(bound: &'a [PgParam<'a>]) -> Vec<&'a (dyn ToSql + Sync)> {
    bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

impl Connection for PgConnection {
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.begin_if_needed()?;
        tracing::trace!(sql = %sql, params = params.len(), "query");
        let bound = bind(params);
        let rows = self
            .client
            .query(sql, &as_refs(&bound))
            .map_err(|e| from_pg(e).with_sql(sql))?;
        decode_rows(&rows).map_err(|e| e.with_sql(sql))
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.begin_if_needed()?;
        tracing::trace!(sql = %sql, params = params.len(), "execute");
        let bound = bind(params);
        self.client
            .execute(sql, &as_refs(&bound))
            .map_err(|e| from_pg(e).with_sql(sql))
    }

    fn batch_execute(&mut self, sql: &str) -> Result<()> {
        self.begin_if_needed()?;
        tracing::trace!(sql = %sql, "batch execute");
        self.client
            .batch_execute(sql)
            .map_err(|e| from_pg(e).with_sql(sql))
    }

    fn commit(&mut self) -> Result<()> {
        self.finish("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.finish("ROLLBACK")
    }

    fn set_autocommit(&mut self, enabled: bool) -> Result<()> {
        if enabled {
            self.commit()?;
        }
        self.autocommit = enabled;
        Ok(())
    }

    fn is_autocommit(&self) -> bool {
        self.autocommit
    }
}
