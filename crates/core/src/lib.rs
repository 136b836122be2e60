//! # Hearthmind Core
//!
//! Domain types, traits, and error definitions for the Hearthmind assistant
//! servers. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator is defined as a trait here. Implementations live in
//! their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod domain;
pub mod error;
pub mod knowledge;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use domain::{KNOWN_DOMAINS, server_name};
pub use error::{Error, Result, SessionError, StoreError, ToolError};
pub use knowledge::{KnowledgeQuery, KnowledgeRecord, KnowledgeStore};
pub use session::{SessionRecord, SessionStore};
pub use tool::{Tool, ToolCall, ToolDefinition, ToolOutput, ToolRegistry};
