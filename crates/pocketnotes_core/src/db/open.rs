//! Connection bootstrap utilities for SQLite.
//!
//! # Invariants
//! - Returned connections have a busy timeout configured.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::{DbError, DbLocation, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (or creates) a notes database file and applies pending migrations.
///
/// # Side effects
/// - Creates the file when it does not exist yet.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    open_with(DbLocation::File(path.to_path_buf()), || Connection::open(path))
}

/// Opens an in-memory notes database and applies all migrations.
///
/// Every call returns an independent, empty database.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with(DbLocation::Memory, Connection::open_in_memory)
}

fn open_with(
    location: DbLocation,
    connect: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = location.kind();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = connect().map_err(|err| {
        error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={err}",
            started_at.elapsed().as_millis()
        );
        DbError::sqlite(&location)(err)
    })?;

    if let Err(err) = bootstrap_connection(&mut conn, &location) {
        error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={err}",
            started_at.elapsed().as_millis()
        );
        return Err(err);
    }

    info!(
        "event=db_open module=db status=ok mode={mode} duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

fn bootstrap_connection(conn: &mut Connection, location: &DbLocation) -> DbResult<()> {
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(DbError::sqlite(location))?;
    apply_migrations(conn, location)
}
