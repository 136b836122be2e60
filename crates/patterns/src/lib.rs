//! Cross-domain behavioral pattern detection for Hearthmind.
//!
//! Conversation text flowing through the tool pipeline is matched against a
//! fixed catalog of pattern templates (financial planning, home improvement,
//! family activities, career development, health changes). Matches across
//! enough distinct domains inside a template's time window become
//! confidence-scored detections, persisted for later suggestion queries.

pub mod detector;
pub mod suggestions;
pub mod templates;

pub use detector::{DetectedPattern, PatternAnalytics, PatternDetector, TriggerEntry};
pub use suggestions::{suggestion_for, PatternSuggestion};
pub use templates::{builtin_templates, PatternTemplate};

/// Errors from the pattern-detection subsystem.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("pattern persistence failed: {0}")]
    Persistence(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
