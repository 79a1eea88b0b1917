//! Flutter-facing bindings for the PocketNotes core.

pub mod api;
mod config;
