//! Note domain model and derived list status.
//!
//! # Responsibility
//! - Define the single persisted entity of the notes screen.
//! - Derive the loading/empty/non-empty status that drives UI branching.
//!
//! # Invariants
//! - `id` is immutable once a note is created and is the storage key.
//! - `id` doubles as the creation timestamp (epoch milliseconds) and is the
//!   recency ordering key.
//! - Two notes created within the same millisecond get the same id; the
//!   later upsert replaces the earlier row. This collision is known and not
//!   guarded against here.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Primary key of a note; epoch milliseconds at creation time.
pub type NoteId = i64;

/// A short text note.
///
/// Equality compares every field, so a note that was edited after being
/// captured is no longer equal to the captured copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub body: String,
    pub important: bool,
}

impl Note {
    /// Creates an empty note whose id is the current time in milliseconds.
    pub fn new() -> Self {
        Self::with_id(now_epoch_ms())
    }

    /// Creates an empty note with a caller-provided id.
    pub fn with_id(id: NoteId) -> Self {
        Self {
            id,
            title: String::new(),
            body: String::new(),
            important: false,
        }
    }
}

impl Default for Note {
    fn default() -> Self {
        Self::new()
    }
}

/// In-place edit applied to a note held by the view-model.
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteEdit {
    pub title: Option<String>,
    pub body: Option<String>,
    pub important: Option<bool>,
}

impl NoteEdit {
    /// Applies the edit and returns whether any field actually changed.
    pub fn apply_to(self, note: &mut Note) -> bool {
        let mut changed = false;
        if let Some(title) = self.title {
            changed |= note.title != title;
            note.title = title;
        }
        if let Some(body) = self.body {
            changed |= note.body != body;
            note.body = body;
        }
        if let Some(important) = self.important {
            changed |= note.important != important;
            note.important = important;
        }
        changed
    }
}

/// Derived UI state of the notes list. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotesStatus {
    /// Initial load has not completed yet.
    Loading,
    /// Loaded, and the list is empty.
    Empty,
    /// Loaded, and at least one note is present.
    NotEmpty,
}

impl NotesStatus {
    /// Computes the status from the loading flag and list emptiness.
    pub fn derive(loading: bool, is_empty: bool) -> Self {
        if loading {
            Self::Loading
        } else if is_empty {
            Self::Empty
        } else {
            Self::NotEmpty
        }
    }

    /// Stable lowercase label, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Empty => "empty",
            Self::NotEmpty => "not_empty",
        }
    }
}

/// Current time in epoch milliseconds; clamps to 0 for clocks before 1970.
pub fn now_epoch_ms() -> NoteId {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
