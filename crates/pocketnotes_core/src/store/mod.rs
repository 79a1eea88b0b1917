//! Durable note storage contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the leaf persistence boundary consumed by `NoteRepository`.
//! - Keep SQL details inside the storage layer.
//!
//! # Invariants
//! - `upsert` is insert-or-replace keyed by note id.
//! - `delete` of an absent id is a no-op, not an error.
//! - Every operation is durable when it returns `Ok`.

use crate::model::note::Note;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod sqlite_store;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage failure reading or writing the persistent note store.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    InvalidData(String),
    /// A previous holder of the connection panicked mid-operation.
    Poisoned,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "note store sqlite error: {err}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
            Self::Poisoned => write!(f, "note store connection is poisoned"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Table storage for notes.
///
/// Implementations must be shareable across background tasks.
pub trait NoteStore: Send + Sync {
    /// Returns every stored note, in unspecified order.
    fn fetch_all(&self) -> StoreResult<Vec<Note>>;

    /// Inserts the note, or replaces the row with the same id.
    fn upsert(&self, note: &Note) -> StoreResult<()>;

    /// Removes the row with the note's id; absent rows are ignored.
    fn delete(&self, note: &Note) -> StoreResult<()>;

    /// Upserts every note. Stops at the first failure.
    ///
    /// Implementations may override this to write all rows atomically.
    fn upsert_all(&self, notes: &[Note]) -> StoreResult<()> {
        for note in notes {
            self.upsert(note)?;
        }
        Ok(())
    }
}
