//! Usage metering, cost tracking, and budget alerting for Hearthmind.
//!
//! Every tool invocation is metered as a `UsageEvent` with an estimated
//! cost computed from a per-provider/model rate table. Cumulative spend is
//! checked against a daily budget at fixed thresholds, and each crossing
//! raises a structured alert exactly once per day.

pub mod log;
pub mod model;
pub mod rates;
pub mod tracker;

pub use log::{InMemoryUsageLog, UsageLog};
pub use model::{CostReport, UsageEvent, UsageSummary, WindowUsage, ALERT_THRESHOLDS};
pub use rates::{CostRates, RateTable};
pub use tracker::CostTracker;

/// Errors from the cost-tracking subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("usage log error: {0}")]
    Log(String),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
