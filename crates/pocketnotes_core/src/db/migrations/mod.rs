//! SQLite migration registry and executor.
//!
//! # Invariants
//! - `version` values must remain monotonic.
//! - Applied migration version is mirrored to `PRAGMA user_version`.
//! - The notes schema is fixed at a single table; there is no data
//!   migration between versions.

use crate::db::{DbError, DbLocation, DbResult};
use log::info;
use rusqlite::Connection;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("0001_notes.sql"),
}];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Applies all pending migrations on the provided connection in one
/// transaction. `location` only labels errors.
pub fn apply_migrations(conn: &mut Connection, location: &DbLocation) -> DbResult<()> {
    let sqlite_err = DbError::sqlite(location);
    let current_version = current_user_version(conn).map_err(&sqlite_err)?;
    let latest = latest_version();

    if current_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            location: location.clone(),
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction().map_err(&sqlite_err)?;
    for migration in MIGRATIONS
        .iter()
        .filter(|migration| migration.version > current_version)
    {
        tx.execute_batch(migration.sql).map_err(&sqlite_err)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            .map_err(&sqlite_err)?;
    }
    tx.commit().map_err(&sqlite_err)?;

    info!(
        "event=db_migrate module=db status=ok location={} from_version={current_version} to_version={latest}",
        location.kind()
    );
    Ok(())
}

fn current_user_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))
}
