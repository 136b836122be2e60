//! Static suggestion table for detected patterns.
//!
//! Deliberately a hand-authored lookup keyed by `(pattern, domain)` rather
//! than inferred logic, so suggestion behavior stays auditable. Every
//! built-in pattern has an entry for each of its eligible domains.

use serde::Serialize;

/// A suggestion surfaced to the caller of `get_pattern_insights`.
#[derive(Debug, Clone, Serialize)]
pub struct PatternSuggestion {
    /// Suggestion kind (e.g. "cross_domain_insight", "budget_check").
    pub kind: String,
    /// The suggestion text.
    pub message: String,
    /// Domains the caller may want to consult next.
    pub related_domains: Vec<String>,
    /// How strongly this suggestion applies.
    pub confidence: f64,
}

fn suggestion(kind: &str, message: &str, related: &[&str], confidence: f64) -> PatternSuggestion {
    PatternSuggestion {
        kind: kind.to_string(),
        message: message.to_string(),
        related_domains: related.iter().map(|s| s.to_string()).collect(),
        confidence,
    }
}

/// Look up the suggestion for a pattern seen from a given domain.
///
/// Returns None for domains a pattern is not eligible for.
pub fn suggestion_for(pattern_name: &str, current_domain: &str) -> Option<PatternSuggestion> {
    let s = match (pattern_name, current_domain) {
        // ── financial_planning_event ───────────────────────────────
        ("financial_planning_event", "financial") => suggestion(
            "cross_domain_insight",
            "Consider how this financial decision affects family plans and lifestyle goals",
            &["family", "lifestyle"],
            0.8,
        ),
        ("financial_planning_event", "family") => suggestion(
            "budget_check",
            "Review budget impact of family activities and events",
            &["financial"],
            0.7,
        ),
        ("financial_planning_event", "lifestyle") => suggestion(
            "budget_check",
            "Align lifestyle spending with the current financial plan",
            &["financial"],
            0.7,
        ),

        // ── home_improvement_project ───────────────────────────────
        ("home_improvement_project", "home") => suggestion(
            "financial_planning",
            "Create budget and timeline for home improvement project",
            &["financial"],
            0.9,
        ),
        ("home_improvement_project", "financial") => suggestion(
            "project_coordination",
            "Coordinate home project costs with family schedule",
            &["home", "family"],
            0.8,
        ),
        ("home_improvement_project", "family") => suggestion(
            "schedule_planning",
            "Plan family logistics around the upcoming home work",
            &["home"],
            0.7,
        ),

        // ── family_activity_planning ───────────────────────────────
        ("family_activity_planning", "family") => suggestion(
            "budget_planning",
            "Plan budget for upcoming family activities and events",
            &["financial"],
            0.8,
        ),
        ("family_activity_planning", "lifestyle") => suggestion(
            "schedule_integration",
            "Integrate family activities with personal lifestyle goals",
            &["family"],
            0.7,
        ),
        ("family_activity_planning", "financial") => suggestion(
            "expense_forecast",
            "Set aside funds for the planned family activities",
            &["family"],
            0.7,
        ),

        // ── career_development ─────────────────────────────────────
        ("career_development", "professional") => suggestion(
            "skill_investment",
            "Map out training and certification steps for the career goal",
            &["financial", "lifestyle"],
            0.8,
        ),
        ("career_development", "financial") => suggestion(
            "income_planning",
            "Review how career changes affect income and savings plans",
            &["professional"],
            0.8,
        ),
        ("career_development", "lifestyle") => suggestion(
            "time_budgeting",
            "Balance career development time against lifestyle commitments",
            &["professional"],
            0.7,
        ),

        // ── health_lifestyle_change ────────────────────────────────
        ("health_lifestyle_change", "lifestyle") => suggestion(
            "habit_planning",
            "Build a routine that supports the new health goals",
            &["family"],
            0.8,
        ),
        ("health_lifestyle_change", "family") => suggestion(
            "shared_activity",
            "Involve the family in the health and fitness changes",
            &["lifestyle"],
            0.7,
        ),
        ("health_lifestyle_change", "financial") => suggestion(
            "wellness_budget",
            "Budget for fitness, nutrition, and wellness costs",
            &["lifestyle"],
            0.7,
        ),

        _ => return None,
    };
    Some(s)
}
