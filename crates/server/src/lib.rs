//! The Hearthmind server core — a transport-agnostic tool dispatch pipeline.
//!
//! Every tool invocation, regardless of which tool is called, flows through
//! the same sequence: usage metering, pattern analysis of free-text
//! arguments, the domain handler itself, result caching, and a knowledge
//! write-back for substantial results. Only the handler's own failure is
//! visible to the caller; the auxiliary steps are best-effort and log
//! instead of failing the call.

pub mod pipeline;
mod standard;

pub use pipeline::{ServerCore, ServerStatus};
