//! The pattern detector — rolling trigger history and template matching.

use crate::suggestions::{suggestion_for, PatternSuggestion};
use crate::templates::{builtin_templates, PatternTemplate};
use crate::PatternError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hearthmind_core::knowledge::{KnowledgeQuery, KnowledgeRecord, KnowledgeStore};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Regex patterns that emit a synthetic `financial_amount` trigger.
const AMOUNT_PATTERNS: [&str; 6] = [
    r"\$[\d,]+",
    r"budget.*\d+",
    r"cost.*\d+",
    r"expense.*\d+",
    r"invest.*\d+",
    r"save.*\d+",
];

/// How much conversation text is kept per history entry.
const CONTENT_SUMMARY_LEN: usize = 200;

/// One analyzed conversation turn in a session's rolling history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerEntry {
    pub domain: String,
    pub triggers: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub content_summary: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A pattern detection derived from recent history. Never stored directly —
/// recomputed per analysis call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub name: String,
    pub domains: Vec<String>,
    pub triggers: Vec<String>,
    pub confidence: f64,
    pub frequency: usize,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Aggregate statistics over the detector's history.
#[derive(Debug, Clone, Serialize)]
pub struct PatternAnalytics {
    pub total_sessions: usize,
    pub total_entries: usize,
    pub most_common_triggers: Vec<(String, usize)>,
    pub templates: Vec<String>,
}

/// Detects cross-domain patterns from per-session trigger history.
///
/// History appends from concurrent invocations of the same session are safe:
/// the map is sharded per key and no lock is held across awaits.
pub struct PatternDetector {
    knowledge: Arc<dyn KnowledgeStore>,
    templates: Vec<PatternTemplate>,
    history: DashMap<String, Vec<TriggerEntry>>,
    amount_regexes: Vec<Regex>,
}

impl PatternDetector {
    pub fn new(knowledge: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            knowledge,
            templates: builtin_templates(),
            history: DashMap::new(),
            amount_regexes: AMOUNT_PATTERNS
                .iter()
                .map(|p| Regex::new(p).expect("built-in trigger pattern compiles"))
                .collect(),
        }
    }

    /// Analyze one conversation turn.
    ///
    /// Records a trigger history entry for the session, evaluates every
    /// template against the session's recent history, persists detections
    /// with confidence ≥ 0.6, and returns those meeting their own template's
    /// threshold.
    pub async fn analyze_conversation(
        &self,
        content: &str,
        domain: &str,
        session_id: &str,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Vec<DetectedPattern>, PatternError> {
        let triggers = self.extract_triggers(content);

        let mut summary: String = content.chars().take(CONTENT_SUMMARY_LEN).collect();
        if content.chars().count() > CONTENT_SUMMARY_LEN {
            summary.push_str("...");
        }

        self.push_entry(
            session_id,
            TriggerEntry {
                domain: domain.to_string(),
                triggers,
                timestamp: Utc::now(),
                content_summary: summary,
                metadata,
            },
        );

        let detections = self.detect(session_id);

        // Persistence bar is fixed at 0.6, independent of the per-template
        // threshold used for *returning* a detection. The original system
        // behaves this way; preserved as specified.
        for pattern in &detections {
            if pattern.confidence >= 0.6 {
                self.persist_pattern(pattern, session_id).await?;
            }
        }

        Ok(detections
            .into_iter()
            .filter(|p| {
                self.templates
                    .iter()
                    .find(|t| t.name == p.name)
                    .is_some_and(|t| p.confidence >= t.confidence_threshold)
            })
            .collect())
    }

    /// Extract trigger keywords from content: case-insensitive containment
    /// against every template's keyword list, plus the financial-amount
    /// regexes. Deduplicated.
    fn extract_triggers(&self, content: &str) -> Vec<String> {
        let content_lower = content.to_lowercase();
        let mut triggers = BTreeSet::new();

        for template in &self.templates {
            for trigger in &template.triggers {
                if content_lower.contains(trigger.as_str()) {
                    triggers.insert(trigger.clone());
                }
            }
        }

        if self
            .amount_regexes
            .iter()
            .any(|re| re.is_match(&content_lower))
        {
            triggers.insert("financial_amount".to_string());
        }

        triggers.into_iter().collect()
    }

    fn push_entry(&self, session_id: &str, entry: TriggerEntry) {
        self.history
            .entry(session_id.to_string())
            .or_default()
            .push(entry);
    }

    /// Evaluate every template against the session's history.
    fn detect(&self, session_id: &str) -> Vec<DetectedPattern> {
        let entries = match self.history.get(session_id) {
            Some(entries) => entries.clone(),
            None => return Vec::new(),
        };

        self.templates
            .iter()
            .filter_map(|template| check_template(template, &entries))
            .collect()
    }

    async fn persist_pattern(
        &self,
        pattern: &DetectedPattern,
        session_id: &str,
    ) -> Result<(), PatternError> {
        let payload = serde_json::json!({
            "triggers": pattern.triggers,
            "session_id": session_id,
            "frequency": pattern.frequency,
            "last_seen": pattern.last_seen.to_rfc3339(),
            "metadata": pattern.metadata,
        });

        let mut metadata = serde_json::Map::new();
        metadata.insert("type".into(), serde_json::json!("cross_domain_pattern"));
        metadata.insert("pattern_name".into(), serde_json::json!(pattern.name));
        metadata.insert("confidence".into(), serde_json::json!(pattern.confidence));
        metadata.insert("domains".into(), serde_json::json!(pattern.domains));

        let mut keywords = vec!["pattern".to_string(), pattern.name.clone()];
        keywords.extend(pattern.domains.iter().cloned());

        let record = KnowledgeRecord::new(
            "system",
            format!("Pattern: {}", pattern.name),
            payload.to_string(),
            metadata,
            keywords,
        );

        self.knowledge
            .store(record)
            .await
            .map_err(|e| PatternError::Persistence(e.to_string()))?;

        debug!(
            "Persisted pattern {} (confidence {:.2})",
            pattern.name, pattern.confidence
        );
        Ok(())
    }

    /// Suggest follow-ups for the current domain from persisted patterns.
    ///
    /// Suggestions are a fixed, hand-authored lookup keyed by
    /// `(pattern, domain)` — see [`crate::suggestions`] — so behavior stays
    /// auditable. One suggestion per distinct pattern name.
    pub async fn get_pattern_suggestions(
        &self,
        current_domain: &str,
        _session_context: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Vec<PatternSuggestion>, PatternError> {
        let records = self
            .knowledge
            .search(KnowledgeQuery::new().keywords(vec!["pattern".into()]))
            .await
            .map_err(|e| PatternError::Persistence(e.to_string()))?;

        let mut seen = BTreeSet::new();
        let mut suggestions = Vec::new();

        for record in records {
            if record.metadata.get("type") != Some(&serde_json::json!("cross_domain_pattern")) {
                continue;
            }
            let confidence = record
                .metadata
                .get("confidence")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            if confidence < 0.6 {
                continue;
            }
            let involves_domain = record
                .metadata
                .get("domains")
                .and_then(|v| v.as_array())
                .is_some_and(|domains| domains.iter().any(|d| d == current_domain));
            if !involves_domain {
                continue;
            }

            let Some(name) = record
                .metadata
                .get("pattern_name")
                .and_then(|v| v.as_str())
            else {
                continue;
            };
            if !seen.insert(name.to_string()) {
                continue;
            }

            if let Some(suggestion) = suggestion_for(name, current_domain) {
                suggestions.push(suggestion);
            }
        }

        Ok(suggestions)
    }

    /// Drop history entries (and empty sessions) older than the cutoff.
    /// Returns how many entries were removed.
    pub fn cleanup_old_patterns(&self, days_old: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::days(days_old);
        let mut removed = 0;

        self.history.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|e| e.timestamp >= cutoff);
            removed += before - entries.len();
            !entries.is_empty()
        });

        info!("Cleaned up pattern data older than {days_old} days ({removed} entries)");
        removed
    }

    /// Aggregate statistics about trigger history and detection.
    pub fn analytics(&self) -> PatternAnalytics {
        let total_sessions = self.history.len();
        let mut total_entries = 0;
        let mut counts: HashMap<String, usize> = HashMap::new();

        for session in self.history.iter() {
            total_entries += session.value().len();
            for entry in session.value() {
                for trigger in &entry.triggers {
                    *counts.entry(trigger.clone()).or_default() += 1;
                }
            }
        }

        let mut most_common: Vec<(String, usize)> = counts.into_iter().collect();
        most_common.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        most_common.truncate(10);

        PatternAnalytics {
            total_sessions,
            total_entries,
            most_common_triggers: most_common,
            templates: self.templates.iter().map(|t| t.name.clone()).collect(),
        }
    }
}

/// Match one template against a session's history.
///
/// Entries inside the template's time window contribute their domain and
/// matched triggers; the match requires `min_domains` distinct domains and
/// `confidence = 0.6 * domain_score + 0.4 * trigger_score` at or above the
/// template's threshold is required for a detection to be *returned* (the
/// caller persists anything ≥ 0.6 regardless).
fn check_template(template: &PatternTemplate, entries: &[TriggerEntry]) -> Option<DetectedPattern> {
    let cutoff = Utc::now() - template.time_window;
    let recent: Vec<&TriggerEntry> = entries.iter().filter(|e| e.timestamp >= cutoff).collect();
    if recent.is_empty() {
        return None;
    }

    let mut triggered_domains = BTreeSet::new();
    let mut matched_triggers: Vec<String> = Vec::new();
    let mut last_seen: Option<DateTime<Utc>> = None;

    for entry in &recent {
        let hits: Vec<String> = entry
            .triggers
            .iter()
            .filter(|t| template.triggers.contains(t))
            .cloned()
            .collect();
        if !hits.is_empty() {
            triggered_domains.insert(entry.domain.clone());
            matched_triggers.extend(hits);
            last_seen = Some(match last_seen {
                Some(seen) => seen.max(entry.timestamp),
                None => entry.timestamp,
            });
        }
    }

    if triggered_domains.len() < template.min_domains {
        return None;
    }

    let domain_score = (triggered_domains.len() as f64 / template.domains.len() as f64).min(1.0);
    let trigger_score = (matched_triggers.len() as f64 / template.triggers.len() as f64).min(1.0);
    let confidence = 0.6 * domain_score + 0.4 * trigger_score;

    // frequency counts occurrences; the returned trigger list is deduplicated
    let frequency = matched_triggers.len();
    let distinct: BTreeSet<String> = matched_triggers.into_iter().collect();

    let mut metadata = serde_json::Map::new();
    metadata.insert("template".into(), serde_json::json!(template.name));
    metadata.insert("recent_entries".into(), serde_json::json!(recent.len()));
    metadata.insert(
        "time_window_hours".into(),
        serde_json::json!(template.time_window.num_hours()),
    );

    Some(DetectedPattern {
        name: template.name.clone(),
        domains: triggered_domains.into_iter().collect(),
        triggers: distinct.into_iter().collect(),
        confidence,
        frequency,
        last_seen: last_seen?,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearthmind_store::InMemoryStore;

    fn make_detector() -> (PatternDetector, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (PatternDetector::new(store.clone()), store)
    }

    async fn pattern_records(store: &InMemoryStore) -> Vec<KnowledgeRecord> {
        store
            .search(KnowledgeQuery::new().keywords(vec!["pattern".into()]))
            .await
            .unwrap()
    }

    #[test]
    fn extracts_template_keywords() {
        let (detector, _) = make_detector();
        let triggers = detector.extract_triggers("We should set a Budget for the VACATION");
        assert!(triggers.contains(&"budget".to_string()));
        assert!(triggers.contains(&"vacation".to_string()));
    }

    #[test]
    fn extracts_financial_amount_from_dollar_sign() {
        let (detector, _) = make_detector();
        let triggers = detector.extract_triggers("we spent $1,200 on it");
        assert!(triggers.contains(&"financial_amount".to_string()));
    }

    #[test]
    fn extracts_financial_amount_from_budget_number() {
        let (detector, _) = make_detector();
        let triggers = detector.extract_triggers("budget around 500 for this");
        assert!(triggers.contains(&"financial_amount".to_string()));
    }

    #[test]
    fn triggers_are_deduplicated() {
        let (detector, _) = make_detector();
        let triggers = detector.extract_triggers("budget budget budget");
        assert_eq!(
            triggers.iter().filter(|t| *t == "budget").count(),
            1
        );
    }

    #[tokio::test]
    async fn single_domain_never_matches() {
        let (detector, _) = make_detector();

        // Plenty of triggers, all from one domain.
        for _ in 0..5 {
            detector
                .analyze_conversation(
                    "renovation repair maintenance contractor improvement",
                    "home",
                    "sess-1",
                    serde_json::Map::new(),
                )
                .await
                .unwrap();
        }

        let analytics = detector.analytics();
        assert_eq!(analytics.total_sessions, 1);

        let detections = detector
            .analyze_conversation(
                "more renovation repair work",
                "home",
                "sess-1",
                serde_json::Map::new(),
            )
            .await
            .unwrap();
        assert!(detections.is_empty());
    }

    #[tokio::test]
    async fn confidence_formula_two_domains_three_triggers() {
        let (detector, _) = make_detector();

        // home_improvement_project: 5 triggers, 3 domains, threshold 0.6.
        // Two matched domains + three matched occurrences:
        //   0.6 * (2/3) + 0.4 * (3/5) = 0.64
        detector
            .analyze_conversation(
                "planning a renovation and roof repair",
                "home",
                "sess-1",
                serde_json::Map::new(),
            )
            .await
            .unwrap();
        let detections = detector
            .analyze_conversation(
                "getting quotes from a contractor",
                "financial",
                "sess-1",
                serde_json::Map::new(),
            )
            .await
            .unwrap();

        let pattern = detections
            .iter()
            .find(|p| p.name == "home_improvement_project")
            .expect("pattern should be detected");
        assert!((pattern.confidence - 0.64).abs() < 1e-9);
        assert_eq!(pattern.frequency, 3);
        assert_eq!(pattern.domains.len(), 2);
    }

    #[tokio::test]
    async fn detection_below_template_threshold_is_persisted_not_returned() {
        let (detector, store) = make_detector();

        // financial_planning_event: 5 triggers, 3 domains, threshold 0.7.
        // Two domains + three occurrences → 0.64: persisted (≥ 0.6) but
        // below the template's own return threshold.
        detector
            .analyze_conversation(
                "our budget and expense review",
                "financial",
                "sess-1",
                serde_json::Map::new(),
            )
            .await
            .unwrap();
        let detections = detector
            .analyze_conversation(
                "transfer to savings",
                "family",
                "sess-1",
                serde_json::Map::new(),
            )
            .await
            .unwrap();

        assert!(detections
            .iter()
            .all(|p| p.name != "financial_planning_event"));

        let records = pattern_records(&store).await;
        assert!(records
            .iter()
            .any(|r| r.metadata["pattern_name"] == "financial_planning_event"));
    }

    #[tokio::test]
    async fn old_entries_fall_outside_time_window() {
        let (detector, _) = make_detector();

        // Backdate a home-domain entry beyond the 24h financial window.
        detector.push_entry(
            "sess-1",
            TriggerEntry {
                domain: "family".to_string(),
                triggers: vec!["savings".into()],
                timestamp: Utc::now() - chrono::Duration::days(2),
                content_summary: "old savings talk".into(),
                metadata: serde_json::Map::new(),
            },
        );

        let detections = detector
            .analyze_conversation(
                "budget and expense planning",
                "financial",
                "sess-1",
                serde_json::Map::new(),
            )
            .await
            .unwrap();

        // Only one domain inside the window → no financial_planning_event.
        assert!(detections
            .iter()
            .all(|p| p.name != "financial_planning_event"));
    }

    #[tokio::test]
    async fn long_content_is_truncated_in_history() {
        let (detector, _) = make_detector();
        let long_content = "budget ".repeat(100);
        detector
            .analyze_conversation(&long_content, "financial", "sess-1", serde_json::Map::new())
            .await
            .unwrap();

        let entries = detector.history.get("sess-1").unwrap();
        assert!(entries[0].content_summary.ends_with("..."));
        assert_eq!(entries[0].content_summary.chars().count(), 203);
    }

    #[tokio::test]
    async fn suggestions_come_from_persisted_patterns() {
        let (detector, _) = make_detector();

        detector
            .analyze_conversation(
                "kitchen renovation and repair plans",
                "home",
                "sess-1",
                serde_json::Map::new(),
            )
            .await
            .unwrap();
        detector
            .analyze_conversation(
                "contractor quotes and maintenance costs",
                "financial",
                "sess-1",
                serde_json::Map::new(),
            )
            .await
            .unwrap();

        let suggestions = detector
            .get_pattern_suggestions("home", &serde_json::Map::new())
            .await
            .unwrap();
        assert!(!suggestions.is_empty());
        assert!(suggestions[0].related_domains.contains(&"financial".to_string()));

        // A domain not involved in any persisted pattern gets nothing.
        let none = detector
            .get_pattern_suggestions("professional", &serde_json::Map::new())
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn cleanup_drops_old_entries_and_empty_sessions() {
        let (detector, _) = make_detector();

        detector.push_entry(
            "old-sess",
            TriggerEntry {
                domain: "financial".into(),
                triggers: vec!["budget".into()],
                timestamp: Utc::now() - chrono::Duration::days(45),
                content_summary: "ancient".into(),
                metadata: serde_json::Map::new(),
            },
        );
        detector
            .analyze_conversation("budget talk", "financial", "fresh-sess", serde_json::Map::new())
            .await
            .unwrap();

        let removed = detector.cleanup_old_patterns(30);
        assert_eq!(removed, 1);

        let analytics = detector.analytics();
        assert_eq!(analytics.total_sessions, 1);
    }

    #[tokio::test]
    async fn analytics_count_triggers() {
        let (detector, _) = make_detector();
        detector
            .analyze_conversation("budget for the trip", "financial", "s1", serde_json::Map::new())
            .await
            .unwrap();
        detector
            .analyze_conversation("budget again", "family", "s2", serde_json::Map::new())
            .await
            .unwrap();

        let analytics = detector.analytics();
        assert_eq!(analytics.total_sessions, 2);
        assert_eq!(analytics.total_entries, 2);
        assert_eq!(analytics.most_common_triggers[0].0, "budget");
        assert_eq!(analytics.most_common_triggers[0].1, 2);
        assert_eq!(analytics.templates.len(), 5);
    }
}
