//! Data model for usage events, aggregated summaries, and budget alerts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Budget alert thresholds as percentages of the daily limit, ascending,
/// with the message attached to each.
pub const ALERT_THRESHOLDS: [(u8, &str); 4] = [
    (50, "50% of daily budget used"),
    (80, "80% of daily budget used"),
    (90, "90% of daily budget used"),
    (100, "Daily budget limit exceeded!"),
];

/// A single metered usage event. Immutable once appended to the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    /// The server that performed the call (e.g. "hearthmind-financial").
    pub server_name: String,

    /// API provider ("openai", "anthropic", ..., or "internal").
    pub provider: String,

    /// Model or call class within the provider.
    pub model: String,

    /// The endpoint or tool name invoked.
    pub endpoint: String,

    /// Input tokens consumed (estimated for internal calls).
    pub input_tokens: u64,

    /// Output tokens produced (estimated for internal calls).
    pub output_tokens: u64,

    /// Estimated cost in USD.
    pub estimated_cost: f64,

    /// When the call happened.
    pub timestamp: DateTime<Utc>,

    /// Arbitrary metadata (tool name, domain, ...).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Cost and request count for one bucket of a breakdown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WindowUsage {
    pub cost: f64,
    pub requests: u64,
}

/// Aggregated usage over a trailing window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSummary {
    /// Total cost across the window in USD.
    pub total_cost: f64,

    /// Total number of metered calls.
    pub total_requests: u64,

    /// Per-day breakdown, keyed by `YYYY-MM-DD`.
    pub daily_breakdown: BTreeMap<String, WindowUsage>,

    /// Per-server breakdown, keyed by server name.
    pub server_breakdown: BTreeMap<String, WindowUsage>,
}

impl UsageSummary {
    /// Aggregate a set of events into a summary.
    pub fn from_events(events: &[UsageEvent]) -> Self {
        let mut summary = Self::default();
        for event in events {
            summary.total_cost += event.estimated_cost;
            summary.total_requests += 1;

            let day = event.timestamp.format("%Y-%m-%d").to_string();
            let daily = summary.daily_breakdown.entry(day).or_default();
            daily.cost += event.estimated_cost;
            daily.requests += 1;

            let server = summary
                .server_breakdown
                .entry(event.server_name.clone())
                .or_default();
            server.cost += event.estimated_cost;
            server.requests += 1;
        }
        summary
    }
}

/// A comprehensive cost report across all domain servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostReport {
    pub period_days: i64,
    pub generated_at: DateTime<Utc>,
    pub total: UsageSummary,
    pub per_server: BTreeMap<String, UsageSummary>,
}
