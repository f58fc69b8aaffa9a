//! SQLite-backed local store for appointments, customers and performance records.
//!
//! The database lives at `~/.agent-crm/agent-crm.db` unless the config points
//! elsewhere. Every multi-record mutation in the core runs inside
//! [`CrmDb::with_transaction`], so a failed write never leaves half a wizard
//! result behind.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

pub mod appointments;
pub mod customers;
pub mod performance;
pub mod types;
pub use types::*;

pub struct CrmDb {
    conn: Connection,
}

impl CrmDb {
    /// Raw connection, for backups and tests.
    pub fn conn_ref(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` as one SQLite transaction: `COMMIT` when it returns `Ok`,
    /// `ROLLBACK` otherwise.
    ///
    /// Store methods never open transactions themselves, so any number of
    /// them can be composed inside one closure.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| E::from(DbError::Sqlite(e)))?;
        match f(self) {
            Ok(val) => {
                if let Err(e) = self.conn.execute_batch("COMMIT") {
                    let _ = self.conn.execute_batch("ROLLBACK");
                    return Err(E::from(DbError::Sqlite(e)));
                }
                Ok(val)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Open (or create) the database under the configured data directory.
    pub fn open(data_dir: Option<&Path>) -> Result<Self, DbError> {
        let path = match data_dir {
            Some(dir) => dir.join("agent-crm.db"),
            None => Self::default_path()?,
        };
        Self::open_at(path)
    }

    /// Open the store file at `path`, creating its directory and schema.
    pub fn open_at(path: PathBuf) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        crate::migrations::run_migrations(&conn)?;

        log::debug!("Opened CRM database at {}", path.display());
        Ok(Self { conn })
    }

    /// Resolve the default database path: `~/.agent-crm/agent-crm.db`.
    pub fn default_path() -> Result<PathBuf, DbError> {
        let home = dirs::home_dir().ok_or(DbError::HomeDirNotFound)?;
        Ok(home.join(".agent-crm").join("agent-crm.db"))
    }

    /// Remove every row from the data tables. Only used by backup import,
    /// inside its transaction.
    pub(crate) fn clear_all(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "DELETE FROM appointments;
             DELETE FROM performance_records;
             DELETE FROM customers;",
        )?;
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::test_utils::test_db;
    use super::*;

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = test_db();
        let result: Result<(), DbError> = db.with_transaction(|tx| {
            tx.conn_ref().execute(
                "INSERT INTO customers (id, name, created_at, updated_at)
                 VALUES ('c1', '김민준', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                [],
            )?;
            Err(DbError::Migration("forced".into()))
        });
        assert!(result.is_err());

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let db = test_db();
        db.with_transaction(|tx| -> Result<(), DbError> {
            tx.conn_ref().execute(
                "INSERT INTO customers (id, name, created_at, updated_at)
                 VALUES ('c1', '김민준', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let count: i64 = db
            .conn_ref()
            .query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
