//! Repository layer over the note store.
//!
//! # Responsibility
//! - Offer use-case oriented persistence calls to the view-model.
//! - Be the only layer that talks to `NoteStore`.

pub mod note_repo;
