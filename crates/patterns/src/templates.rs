//! The static pattern template catalog.
//!
//! Five built-in templates, loaded at startup and immutable afterwards.
//! Each names its trigger keywords, the domains eligible to contribute
//! evidence, how far back evidence counts, how many distinct domains must
//! contribute, and the confidence needed for a detection to be returned.

use chrono::Duration;

/// A static pattern definition.
#[derive(Debug, Clone)]
pub struct PatternTemplate {
    pub name: String,
    pub triggers: Vec<String>,
    pub domains: Vec<String>,
    pub time_window: Duration,
    pub min_domains: usize,
    pub confidence_threshold: f64,
}

impl PatternTemplate {
    fn new(
        name: &str,
        triggers: &[&str],
        domains: &[&str],
        time_window: Duration,
        min_domains: usize,
        confidence_threshold: f64,
    ) -> Self {
        Self {
            name: name.to_string(),
            triggers: triggers.iter().map(|s| s.to_string()).collect(),
            domains: domains.iter().map(|s| s.to_string()).collect(),
            time_window,
            min_domains,
            confidence_threshold,
        }
    }
}

/// The built-in template catalog.
pub fn builtin_templates() -> Vec<PatternTemplate> {
    vec![
        PatternTemplate::new(
            "financial_planning_event",
            &["budget", "expense", "investment", "savings", "financial goal"],
            &["financial", "family", "lifestyle"],
            Duration::hours(24),
            2,
            0.7,
        ),
        PatternTemplate::new(
            "home_improvement_project",
            &["renovation", "repair", "improvement", "maintenance", "contractor"],
            &["home", "financial", "family"],
            Duration::days(7),
            2,
            0.6,
        ),
        PatternTemplate::new(
            "family_activity_planning",
            &["vacation", "trip", "event", "celebration", "activity"],
            &["family", "financial", "lifestyle"],
            Duration::days(3),
            2,
            0.8,
        ),
        PatternTemplate::new(
            "career_development",
            &["promotion", "job", "career", "skill", "training", "certification"],
            &["professional", "financial", "lifestyle"],
            Duration::days(14),
            2,
            0.7,
        ),
        PatternTemplate::new(
            "health_lifestyle_change",
            &["health", "fitness", "diet", "exercise", "wellness"],
            &["lifestyle", "family", "financial"],
            Duration::days(5),
            2,
            0.6,
        ),
    ]
}
