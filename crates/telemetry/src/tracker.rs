//! The cost tracker — meters usage, enforces the daily budget, and raises
//! threshold alerts exactly once per threshold per day.

use crate::log::UsageLog;
use crate::model::{CostReport, UsageEvent, UsageSummary, ALERT_THRESHOLDS};
use crate::rates::{RateTable, DEFAULT_RATES};
use crate::TrackingError;
use chrono::Utc;
use hearthmind_core::domain::{server_name, KNOWN_DOMAINS};
use hearthmind_core::knowledge::{KnowledgeRecord, KnowledgeStore};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{info, warn};

/// Tracks API and tool usage against a sliding daily budget.
///
/// Thread-safe: the fired-alert set uses a mutexed `HashSet` whose `insert`
/// return value is the atomic check-and-set, so concurrent events crossing
/// the same threshold raise exactly one alert.
pub struct CostTracker {
    rates: RateTable,
    log: Arc<dyn UsageLog>,
    knowledge: Arc<dyn KnowledgeStore>,
    default_daily_limit: f64,
    server_limits: RwLock<HashMap<String, f64>>,
    alerts_fired: Mutex<HashSet<(String, u8)>>,
}

impl CostTracker {
    pub fn new(
        knowledge: Arc<dyn KnowledgeStore>,
        log: Arc<dyn UsageLog>,
        daily_budget_limit: f64,
    ) -> Self {
        Self {
            rates: RateTable::with_defaults(),
            log,
            knowledge,
            default_daily_limit: daily_budget_limit,
            server_limits: RwLock::new(HashMap::new()),
            alerts_fired: Mutex::new(HashSet::new()),
        }
    }

    /// Replace the rate table (for custom pricing).
    pub fn with_rates(mut self, rates: RateTable) -> Self {
        self.rates = rates;
        self
    }

    /// The daily budget limit for a server (custom override or default).
    pub fn daily_limit(&self, server: &str) -> f64 {
        self.server_limits
            .read()
            .unwrap()
            .get(server)
            .copied()
            .unwrap_or(self.default_daily_limit)
    }

    /// Track a single usage event.
    ///
    /// Unknown provider/model pairs never fail the call — they fall back to
    /// default rates with a warning. Log persistence failures propagate.
    pub async fn track_usage(
        &self,
        server: &str,
        provider: &str,
        model: &str,
        endpoint: &str,
        input_tokens: u64,
        output_tokens: u64,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<UsageEvent, TrackingError> {
        let rates = match self.rates.get(provider, model) {
            Some(rates) => rates,
            None => {
                warn!("Unknown rates for {provider}/{model}, using defaults");
                DEFAULT_RATES
            }
        };

        let event = UsageEvent {
            server_name: server.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            endpoint: endpoint.to_string(),
            input_tokens,
            output_tokens,
            estimated_cost: rates.cost(input_tokens, output_tokens),
            timestamp: Utc::now(),
            metadata,
        };

        self.log.append(&event).await?;
        self.check_budget(server).await?;

        Ok(event)
    }

    /// Check the server's trailing-day spend against its alert thresholds,
    /// raising each crossed threshold's alert at most once per day.
    async fn check_budget(&self, server: &str) -> Result<(), TrackingError> {
        let usage = self.daily_usage(Some(server)).await?;
        let limit = self.daily_limit(server);

        for (percent, message) in ALERT_THRESHOLDS {
            if usage.total_cost < limit * (percent as f64 / 100.0) {
                continue;
            }

            // insert() is the atomic check-and-set: only the first event to
            // cross this threshold today sends the alert.
            let newly_fired = self
                .alerts_fired
                .lock()
                .unwrap()
                .insert((server.to_string(), percent));
            if newly_fired {
                self.send_alert(server, percent, message, &usage, limit).await;
            }
        }

        Ok(())
    }

    /// Persist a budget alert to the knowledge store.
    ///
    /// Persistence failure is logged but the threshold stays marked as
    /// fired — re-raising the same alert every event would be noisier than
    /// losing one record.
    async fn send_alert(
        &self,
        server: &str,
        percent: u8,
        message: &str,
        usage: &UsageSummary,
        limit: f64,
    ) {
        warn!("BUDGET ALERT: {message} for {server}");

        let payload = serde_json::json!({
            "server_name": server,
            "message": message,
            "threshold_percent": percent,
            "current_cost": usage.total_cost,
            "daily_limit": limit,
            "timestamp": Utc::now().to_rfc3339(),
            "usage_breakdown": usage,
        });

        let mut metadata = serde_json::Map::new();
        metadata.insert("type".into(), serde_json::json!("budget_alert"));
        metadata.insert("severity".into(), serde_json::json!("warning"));
        metadata.insert("threshold_percent".into(), serde_json::json!(percent));

        let record = KnowledgeRecord::new(
            "system",
            format!("Budget Alert: {server}"),
            payload.to_string(),
            metadata,
            vec![
                "budget".into(),
                "alert".into(),
                "cost".into(),
                server.to_string(),
            ],
        );

        if let Err(e) = self.knowledge.store(record).await {
            warn!("Failed to persist budget alert for {server}: {e}");
        }
    }

    /// Usage over the trailing day.
    pub async fn daily_usage(&self, server: Option<&str>) -> Result<UsageSummary, TrackingError> {
        self.usage_summary(server, 1).await
    }

    /// Usage over the trailing week.
    pub async fn weekly_usage(&self, server: Option<&str>) -> Result<UsageSummary, TrackingError> {
        self.usage_summary(server, 7).await
    }

    /// Usage over the trailing month.
    pub async fn monthly_usage(&self, server: Option<&str>) -> Result<UsageSummary, TrackingError> {
        self.usage_summary(server, 30).await
    }

    async fn usage_summary(
        &self,
        server: Option<&str>,
        days: i64,
    ) -> Result<UsageSummary, TrackingError> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        let events = self.log.since(cutoff, server).await?;
        Ok(UsageSummary::from_events(&events))
    }

    /// Set a custom daily budget limit for one server, recording the change.
    pub async fn set_budget_limit(&self, server: &str, daily_limit: f64) {
        self.server_limits
            .write()
            .unwrap()
            .insert(server.to_string(), daily_limit);

        let mut metadata = serde_json::Map::new();
        metadata.insert("type".into(), serde_json::json!("budget_config"));
        metadata.insert("server".into(), serde_json::json!(server));
        metadata.insert("limit".into(), serde_json::json!(daily_limit));

        let record = KnowledgeRecord::new(
            "system",
            format!("Budget Limit: {server}"),
            format!("Daily budget limit set to ${daily_limit}"),
            metadata,
            vec!["budget".into(), "limit".into(), "config".into(), server.to_string()],
        );
        if let Err(e) = self.knowledge.store(record).await {
            warn!("Failed to persist budget limit for {server}: {e}");
        }

        info!("Budget limit for {server} set to ${daily_limit}");
    }

    /// Generate a cost report across all known domain servers.
    pub async fn cost_report(&self, days: i64) -> Result<CostReport, TrackingError> {
        let total = self.usage_summary(None, days).await?;

        let mut per_server = BTreeMap::new();
        for domain in KNOWN_DOMAINS {
            let server = server_name(domain);
            let summary = self.usage_summary(Some(&server), days).await?;
            per_server.insert(server, summary);
        }

        Ok(CostReport {
            period_days: days,
            generated_at: Utc::now(),
            total,
            per_server,
        })
    }

    /// Reset daily alert tracking (call at the daily rollover).
    pub fn reset_daily_alerts(&self) {
        self.alerts_fired.lock().unwrap().clear();
        info!("Daily alert tracking reset");
    }
}
