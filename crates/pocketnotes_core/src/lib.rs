//! Core domain logic for PocketNotes.
//! This crate owns the note list, its persistence and the status shown by
//! the notes screen.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod store;
pub mod viewmodel;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::note::{now_epoch_ms, Note, NoteEdit, NoteId, NotesStatus};
pub use repo::note_repo::NoteRepository;
pub use store::sqlite_store::SqliteNoteStore;
pub use store::{NoteStore, StoreError, StoreResult};
pub use viewmodel::notes_view_model::{NotesState, NotesViewModel, PersistenceHealth};
pub use viewmodel::retry::{PersistError, RetryPolicy};
pub use viewmodel::task_scope::TaskScope;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
