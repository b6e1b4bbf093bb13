//! Creating and dropping databases.

use pgops_core::{Connection, Error, Result, Value, exact_ident};

use crate::connection::PgConnection;

/// Database names keep their exact spelling, so the new connection finds
/// the database that was created.
fn create_database_sql(name: &str) -> String {
    format!("create database {}", exact_ident(name))
}

fn drop_database_sql(name: &str) -> String {
    format!("drop database {}", exact_ident(name))
}

/// Database administration through an existing connection.
///
/// `CREATE DATABASE` and `DROP DATABASE` cannot run inside a transaction,
/// so the admin connection is switched to autocommit and left that way.
///
/// ```rust,ignore
/// let mut admin = PgConnection::connect(PgConfig::new("localhost", "postgres", "postgres"))?;
/// let mut dbs = PgDatabases::new(&mut admin);
/// let gis = dbs.create_database("pgoperationstest", true, false)?;
/// ```
#[derive(Debug)]
pub struct PgDatabases<'a> {
    admin: &'a mut PgConnection,
}

impl<'a> PgDatabases<'a> {
    pub fn new(admin: &'a mut PgConnection) -> Self {
        Self { admin }
    }

    /// Create `name` and connect to it with the admin credentials.
    ///
    /// With `add_postgis` the PostGIS extension is created in the new
    /// database. Returns the new connection, or `None` when
    /// `close_new_connection` asks for it to be closed.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn create_database(
        &mut self,
        name: &str,
        add_postgis: bool,
        close_new_connection: bool,
    ) -> Result<Option<PgConnection>> {
        let config = self
            .admin
            .config()
            .ok_or_else(|| {
                Error::config("creating a database needs a connection opened from a PgConfig")
            })?
            .with_database(name);

        self.admin.set_autocommit(true)?;
        self.admin
            .execute(&create_database_sql(name), &[])?;
        tracing::info!(database = name, "database created");

        let mut conn = PgConnection::connect(config)?;
        if add_postgis {
            conn.execute("create extension postgis", &[])?;
            conn.commit()?;
            tracing::debug!(database = name, "postgis extension created");
        }

        if close_new_connection {
            conn.disconnect()?;
            return Ok(None);
        }
        Ok(Some(conn))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn drop_database(&mut self, name: &str) -> Result<()> {
        self.admin.set_autocommit(true)?;
        self.admin
            .execute(&drop_database_sql(name), &[])?;
        tracing::info!(database = name, "database dropped");
        Ok(())
    }

    pub fn database_exists(&mut self, name: &str) -> Result<bool> {
        let row = self.admin.query_one(
            "SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)",
            &[Value::Text(name.to_string())],
        )?;
        Ok(row.and_then(|r| r.get(0).and_then(Value::as_bool)).unwrap_or(false))
    }
}
