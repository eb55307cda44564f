//! SQLite persistence for the orchestration engine.
//!
//! Implements [`orchestrator_core::EntityStore`] over a pooled SQLite
//! connection with embedded migrations. Row mapping and enum conversions
//! live in [`common`]; everything else is the store implementation.

pub mod common;
pub mod sqlite;

pub use sqlite::SqliteEntityStore;
