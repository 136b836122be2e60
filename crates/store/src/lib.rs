//! Store backends for Hearthmind.
//!
//! Implements the `KnowledgeStore` and `SessionStore` traits from
//! `hearthmind-core`: an in-memory backend for tests and ephemeral runs,
//! and a SQLite backend for durable single-node deployments.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
