//! Notes domain model.
//!
//! # Invariants
//! - Every note is identified by its creation-time `NoteId`.
//! - Deletion is a hard delete of the stored row.

pub mod note;
