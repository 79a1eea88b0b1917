//! SQLite-backed `NoteStore`.
//!
//! # Invariants
//! - The store owns its connection; access is serialized by a mutex.
//! - Construction fails unless the `notes` table has every required column.
//! - `important` is stored as 0/1; any other value is rejected on read.

use super::{NoteStore, StoreError, StoreResult};
use crate::model::note::Note;
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::sync::{Mutex, MutexGuard};

const NOTES_TABLE: &str = "notes";
const NOTE_COLUMNS: [&str; 4] = ["id", "title", "body", "important"];

/// Note store over a migrated SQLite connection.
pub struct SqliteNoteStore {
    conn: Mutex<Connection>,
}

impl SqliteNoteStore {
    /// Wraps a connection returned by `db::open_db` / `db::open_db_in_memory`.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        ensure_connection_ready(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of stored rows.
    pub fn count(&self) -> StoreResult<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM notes;", [], |row| row.get(0))?;
        usize::try_from(count)
            .map_err(|_| StoreError::InvalidData(format!("negative row count {count}")))
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl NoteStore for SqliteNoteStore {
    fn fetch_all(&self) -> StoreResult<Vec<Note>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT id, title, body, important FROM notes;")?;
        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        Ok(notes)
    }

    fn upsert(&self, note: &Note) -> StoreResult<()> {
        let conn = self.lock()?;
        upsert_on(&conn, note)
    }

    fn delete(&self, note: &Note) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM notes WHERE id = ?1;", [note.id])?;
        Ok(())
    }

    fn upsert_all(&self, notes: &[Note]) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for note in notes {
            upsert_on(&tx, note)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn upsert_on(conn: &Connection, note: &Note) -> StoreResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO notes (id, title, body, important)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            note.id,
            note.title.as_str(),
            note.body.as_str(),
            bool_to_int(note.important),
        ],
    )?;
    Ok(())
}

fn parse_note_row(row: &Row<'_>) -> StoreResult<Note> {
    let id: i64 = row.get("id")?;
    let important: i64 = row.get("important")?;
    Ok(Note {
        id,
        title: row.get("title")?,
        body: row.get("body")?,
        important: int_to_bool(id, important)?,
    })
}

fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

fn int_to_bool(id: i64, value: i64) -> StoreResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(StoreError::InvalidData(format!(
            "notes.important must be 0 or 1, got {other} for id {id}"
        ))),
    }
}

fn ensure_connection_ready(conn: &Connection) -> StoreResult<()> {
    if !table_exists(conn, NOTES_TABLE)? {
        return Err(StoreError::MissingRequiredTable(NOTES_TABLE));
    }
    for column in NOTE_COLUMNS {
        if !table_has_column(conn, NOTES_TABLE, column)? {
            return Err(StoreError::MissingRequiredColumn {
                table: NOTES_TABLE,
                column,
            });
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
