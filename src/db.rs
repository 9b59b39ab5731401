//! Database layer - connection, transaction session, schema.
//!
//! Every pass talks to SQLite through [`Store`], implemented by [`Session`].
//! A session owns the single transaction of a run: nothing is visible to other
//! connections until [`Session::commit`], and dropping it rolls everything back.

use std::path::Path;

use rusqlite::types::FromSql;
use rusqlite::{Connection, OptionalExtension, Row, ToSql, Transaction};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{FactorizeError, Result};

pub trait Store {
    /// Execute one statement and return the number of rows it changed.
    fn run(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize>;

    /// Collect every row of a query, in the order SQLite yields them.
    fn all<T, F>(&self, sql: &str, params: &[&dyn ToSql], map: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>;

    /// First column of the first row, or `None` when the query yields nothing.
    fn one<T: FromSql>(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Option<T>>;
}

pub fn connect(path: &Path) -> Result<Connection> {
    let open = || -> rusqlite::Result<Connection> {
        let conn = Connection::open(path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(conn)
    };
    open().map_err(|source| FactorizeError::StoreUnavailable {
        path: path.to_path_buf(),
        source,
    })
}

pub struct Session<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> Session<'conn> {
    pub fn begin(conn: &'conn mut Connection) -> Result<Self> {
        Ok(Session {
            tx: conn.transaction()?,
        })
    }

    pub fn commit(self) -> Result<()> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> Result<()> {
        self.tx.rollback()?;
        Ok(())
    }

    #[cfg(test)]
    pub fn conn(&self) -> &Connection {
        &self.tx
    }
}

impl Store for Session<'_> {
    fn run(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize> {
        Ok(self.tx.execute(sql, params)?)
    }

    fn all<T, F>(&self, sql: &str, params: &[&dyn ToSql], map: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let mut stmt = self.tx.prepare(sql)?;
        let rows = stmt
            .query_map(params, map)?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(rows)
    }

    fn one<T: FromSql>(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Option<T>> {
        Ok(self
            .tx
            .query_row(sql, params, |row| row.get(0))
            .optional()?)
    }
}

/// Drops a `temp` lookup table when it goes out of scope, error paths included.
pub struct TempTable<'s, S: Store> {
    store: &'s S,
    name: &'static str,
    drop_sql: &'static str,
}

impl<'s, S: Store> TempTable<'s, S> {
    /// Runs `create_sql` after clearing any leftover table of the same name.
    pub fn create(
        store: &'s S,
        name: &'static str,
        create_sql: &'static str,
        drop_sql: &'static str,
    ) -> Result<Self> {
        store.run(drop_sql, &[])?;
        store.run(create_sql, &[])?;
        debug!(table = name, "created temp table");
        Ok(TempTable {
            store,
            name,
            drop_sql,
        })
    }
}

impl<S: Store> Drop for TempTable<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.store.run(self.drop_sql, &[]) {
            warn!(table = self.name, error = %e, "failed to drop temp table");
        }
    }
}

// ── Schema ──

const CREATE_TEXTES: &str = "
    CREATE TABLE IF NOT EXISTS textes
    ( id          INTEGER PRIMARY KEY NOT NULL
    , nature      TEXT NOT NULL
    , num         TEXT
    , nor         CHAR(12) UNIQUE
    , titrefull_s TEXT UNIQUE
    , UNIQUE (nature, num)
    )";

const HAS_TEXTE_ID: &str =
    "SELECT count(*) FROM pragma_table_info('textes_versions') WHERE name = 'texte_id'";

const ADD_TEXTE_ID: &str =
    "ALTER TABLE textes_versions ADD COLUMN texte_id INTEGER REFERENCES textes";

const INDEX_TEXTE_ID: &str =
    "CREATE INDEX IF NOT EXISTS textes_versions_texte_id ON textes_versions (texte_id)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaOutcome {
    Added,
    AlreadyPresent,
}

/// Create `textes` and the `textes_versions.texte_id` link if missing.
pub fn ensure_schema<S: Store>(store: &S) -> Result<SchemaOutcome> {
    store.run(CREATE_TEXTES, &[])?;
    let present = store.one::<i64>(HAS_TEXTE_ID, &[])?.unwrap_or(0) > 0;
    let outcome = if present {
        debug!("textes_versions.texte_id already present");
        SchemaOutcome::AlreadyPresent
    } else {
        store.run(ADD_TEXTE_ID, &[])?;
        SchemaOutcome::Added
    };
    store.run(INDEX_TEXTE_ID, &[])?;
    Ok(outcome)
}

pub fn count_unlinked<S: Store>(store: &S) -> Result<usize> {
    let n = store
        .one::<i64>(
            "SELECT count(*) FROM textes_versions WHERE texte_id IS NULL",
            &[],
        )?
        .unwrap_or(0);
    Ok(n as usize)
}
