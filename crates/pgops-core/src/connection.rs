//! Database connection trait.
//!
//! [`Connection`] is the seam between SQL assembly and the driver. Statements
//! reaching it are final: placeholders are numbered `$1`, `$2`, ... and the
//! parameter slice holds one value per placeholder.
//!
//! Transactions follow the implicit model of classic database clients: unless
//! the connection is in autocommit mode, the first statement opens a
//! transaction that stays open until [`Connection::commit`] or
//! [`Connection::rollback`].

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// A synchronous database connection capable of executing statements.
///
/// # Example
///
/// ```rust,ignore
/// let rows = conn.query("select gid from d.points where depth > $1", &[Value::Double(10.0)])?;
/// conn.execute("delete from d.points where gid = $1", &[Value::Int(3)])?;
/// conn.commit()?;
/// ```
pub trait Connection {
    /// Execute a statement and return all rows.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a statement and return the first row, if any.
    fn query_one(&mut self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Execute a statement (INSERT, UPDATE, DELETE, DDL) and return rows affected.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute one or more parameterless statements separated by `;`.
    fn batch_execute(&mut self, sql: &str) -> Result<()>;

    /// Commit the open transaction. A no-op when none is open.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction. A no-op when none is open.
    fn rollback(&mut self) -> Result<()>;

    /// Switch autocommit mode. Enabling it commits any open transaction.
    fn set_autocommit(&mut self, enabled: bool) -> Result<()>;

    /// Whether every statement is committed on its own.
    fn is_autocommit(&self) -> bool;
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn query_one(&mut self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        (**self).query_one(sql, params)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn batch_execute(&mut self, sql: &str) -> Result<()> {
        (**self).batch_execute(sql)
    }

    fn commit(&mut self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<()> {
        (**self).rollback()
    }

    fn set_autocommit(&mut self, enabled: bool) -> Result<()> {
        (**self).set_autocommit(enabled)
    }

    fn is_autocommit(&self) -> bool {
        (**self).is_autocommit()
    }
}
