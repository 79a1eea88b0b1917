//! Per-note write generations used to drop stale persistence retries.
//!
//! # Invariants
//! - Every `add_note`/`remove_note` bumps the generation of its note id.
//! - A retry may only write a note whose generation is unchanged since the
//!   task was scheduled. First attempts are not checked.

use crate::model::note::{Note, NoteId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub(crate) struct NoteGenerations {
    by_id: Mutex<HashMap<NoteId, u64>>,
}

impl NoteGenerations {
    /// Marks a new add/remove of `id` and returns its generation.
    pub(crate) fn bump(&self, id: NoteId) -> u64 {
        let mut by_id = self.lock();
        let generation = by_id.entry(id).or_insert(0);
        *generation += 1;
        *generation
    }

    pub(crate) fn is_current(&self, id: NoteId, generation: u64) -> bool {
        self.lock().get(&id).copied().unwrap_or(0) == generation
    }

    /// Generations of `notes`, index-aligned, without bumping them.
    pub(crate) fn capture(&self, notes: &[Note]) -> Vec<u64> {
        let by_id = self.lock();
        notes
            .iter()
            .map(|note| by_id.get(&note.id).copied().unwrap_or(0))
            .collect()
    }

    /// Notes from a `capture`d snapshot that nothing has added or removed
    /// since.
    pub(crate) fn retain_current(&self, notes: &[Note], captured: &[u64]) -> Vec<Note> {
        let by_id = self.lock();
        notes
            .iter()
            .zip(captured)
            .filter(|(note, generation)| by_id.get(&note.id).copied().unwrap_or(0) == **generation)
            .map(|(note, _)| note.clone())
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<NoteId, u64>> {
        self.by_id.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
