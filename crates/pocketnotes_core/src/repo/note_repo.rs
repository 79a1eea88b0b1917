//! Note repository: recency ordering and bulk checkpoints over `NoteStore`.
//!
//! # Invariants
//! - `load_all` returns notes ordered by descending id (newest first).
//! - `add` is also the undo-delete path; upsert makes it idempotent.
//! - In-place edits are persisted only through `save_all`.

use crate::model::note::Note;
use crate::store::{NoteStore, StoreResult};
use log::{debug, info};
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Instant;

/// Thin adapter over a shared `NoteStore`.
///
/// Cloning is cheap; clones share the same store.
pub struct NoteRepository<S: NoteStore> {
    store: Arc<S>,
}

impl<S: NoteStore> Clone for NoteRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: NoteStore> NoteRepository<S> {
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Builds a repository over a store that the caller also keeps a handle to.
    pub fn from_shared(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Reads every note, newest first.
    pub fn load_all(&self) -> StoreResult<Vec<Note>> {
        let started_at = Instant::now();
        let mut notes = self.store.fetch_all()?;
        notes.sort_by_key(|note| Reverse(note.id));
        info!(
            "event=notes_load module=repo status=ok count={} duration_ms={}",
            notes.len(),
            started_at.elapsed().as_millis()
        );
        Ok(notes)
    }

    pub fn add(&self, note: &Note) -> StoreResult<()> {
        self.store.upsert(note)?;
        debug!("event=note_add module=repo status=ok note_id={}", note.id);
        Ok(())
    }

    pub fn remove(&self, note: &Note) -> StoreResult<()> {
        self.store.delete(note)?;
        debug!("event=note_remove module=repo status=ok note_id={}", note.id);
        Ok(())
    }

    /// Upserts every given note as one checkpoint.
    pub fn save_all(&self, notes: &[Note]) -> StoreResult<()> {
        let started_at = Instant::now();
        self.store.upsert_all(notes)?;
        info!(
            "event=notes_save module=repo status=ok count={} duration_ms={}",
            notes.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }
}
