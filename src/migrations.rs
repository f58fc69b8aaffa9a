//! Schema versioning for the CRM store.
//!
//! Each step is a SQL script compiled into the binary and recorded in
//! `schema_version` once applied. A step and its version row commit together.

use rusqlite::{params, Connection};

use crate::db::DbError;

/// `(version, script)` pairs, ascending.
const STEPS: &[(i32, &str)] = &[(1, include_str!("migrations/001_baseline.sql"))];

/// Highest schema version this build understands.
pub fn latest_version() -> i32 {
    STEPS.last().map(|(version, _)| *version).unwrap_or(0)
}

fn schema_version(conn: &Connection) -> Result<i32, DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;
    let version = conn.query_row(
        "SELECT IFNULL(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Copy an existing store to `<db>.v<from>.bak` before upgrading it.
fn snapshot_before_upgrade(conn: &Connection, from: i32) -> Result<(), DbError> {
    let Some(db_path) = conn.path().filter(|p| !p.is_empty()) else {
        return Ok(());
    };
    let snapshot = format!("{}.v{}.bak", db_path, from);

    let mut target = Connection::open(&snapshot)?;
    rusqlite::backup::Backup::new(conn, &mut target)?
        .step(-1)
        .map_err(|e| DbError::Migration(format!("snapshot to {} failed: {}", snapshot, e)))?;

    log::info!("Saved schema v{} snapshot to {}", from, snapshot);
    Ok(())
}

/// Bring the schema up to [`latest_version`]. Returns how many steps ran.
///
/// A store stamped with a version newer than this build is left untouched.
pub fn run_migrations(conn: &Connection) -> Result<usize, DbError> {
    let current = schema_version(conn)?;
    let latest = latest_version();
    if current > latest {
        return Err(DbError::Migration(format!(
            "store is at schema v{current} but this build only knows v{latest}; update agent-crm"
        )));
    }

    let due: Vec<_> = STEPS.iter().filter(|(version, _)| *version > current).collect();
    if due.is_empty() {
        return Ok(0);
    }
    if current > 0 {
        snapshot_before_upgrade(conn, current)?;
    }

    for (version, script) in &due {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(script)
            .map_err(|e| DbError::Migration(format!("step v{version}: {e}")))?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", params![version])?;
        tx.commit()?;
        log::info!("Schema upgraded to v{}", version);
    }
    Ok(due.len())
}
