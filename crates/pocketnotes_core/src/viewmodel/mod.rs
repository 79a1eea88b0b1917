//! Notes screen state and background persistence orchestration.
//!
//! # Responsibility
//! - Hold the authoritative in-memory note list for the running app.
//! - Dispatch repository calls as fire-and-forget tasks on an owned scope.
//!
//! # Invariants
//! - In-memory mutations are visible before any persistence task runs.
//! - Persistence failures never reach the caller of a mutation.

mod generations;
pub mod notes_view_model;
pub mod retry;
pub mod task_scope;
