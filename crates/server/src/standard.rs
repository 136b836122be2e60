//! Standard tools registered on every domain server.
//!
//! These expose the shared services over the same tool surface as the
//! domain-specific tools: knowledge search, pattern-based insights, session
//! context updates, and usage statistics.

use crate::pipeline::ServerContext;
use async_trait::async_trait;
use chrono::Utc;
use hearthmind_core::error::ToolError;
use hearthmind_core::knowledge::KnowledgeQuery;
use hearthmind_core::tool::Tool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::warn;

/// The standard tool set for a server context.
pub(crate) fn standard_tools(ctx: Arc<ServerContext>) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(SearchKnowledgeTool { ctx: ctx.clone() }),
        Box::new(PatternInsightsTool { ctx: ctx.clone() }),
        Box::new(SessionUpdateTool { ctx: ctx.clone() }),
        Box::new(UsageStatsTool { ctx }),
    ]
}

fn required_str<'a>(arguments: &'a serde_json::Value, field: &str) -> Result<&'a str, ToolError> {
    arguments
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{field}' argument")))
}

// ── search_knowledge ──────────────────────────────────────────────────────

struct SearchKnowledgeTool {
    ctx: Arc<ServerContext>,
}

#[async_trait]
impl Tool for SearchKnowledgeTool {
    fn name(&self) -> &str {
        "search_knowledge"
    }

    fn description(&self) -> &str {
        "Search the knowledge base across domains"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Search query" },
                "domains": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Domains to search (optional)"
                },
                "limit": { "type": "integer", "default": 10, "description": "Max results" }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let query = required_str(&arguments, "query")?;

        let domains: Vec<String> = arguments
            .get("domains")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|d| d.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_else(|| vec![self.ctx.domain.clone()]);

        let limit = arguments
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(10) as usize;

        let keywords: Vec<String> = query.to_lowercase().split_whitespace().map(String::from).collect();

        let results = self
            .ctx
            .knowledge
            .search(
                KnowledgeQuery::new()
                    .domains(domains.clone())
                    .keywords(keywords)
                    .limit(limit),
            )
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().to_string(),
                reason: e.to_string(),
            })?;

        // Reading a record counts as usage for future ranking.
        for record in &results {
            if let Err(e) = self.ctx.knowledge.touch(&record.id).await {
                warn!("Failed to bump usage frequency for {}: {e}", record.id);
            }
        }

        Ok(serde_json::json!({
            "query": query,
            "domains_searched": domains,
            "results_count": results.len(),
            "results": results,
        }))
    }
}

// ── get_pattern_insights ──────────────────────────────────────────────────

struct PatternInsightsTool {
    ctx: Arc<ServerContext>,
}

#[async_trait]
impl Tool for PatternInsightsTool {
    fn name(&self) -> &str {
        "get_pattern_insights"
    }

    fn description(&self) -> &str {
        "Get intelligent pattern-based suggestions"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "context": { "type": "string", "description": "Current context or query" }
            },
            "required": ["context"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let context = required_str(&arguments, "context")?;

        let session_context = self.ctx.session_context.read().unwrap().clone();
        let suggestions = self
            .ctx
            .patterns
            .get_pattern_suggestions(&self.ctx.domain, &session_context)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().to_string(),
                reason: e.to_string(),
            })?;

        let cache_suggestions = self.ctx.cache.cross_domain_suggestions(&self.ctx.domain);

        Ok(serde_json::json!({
            "context": context,
            "pattern_suggestions": suggestions,
            "cross_domain_insights": cache_suggestions,
            "generated_at": Utc::now().to_rfc3339(),
        }))
    }
}

// ── update_session_context ────────────────────────────────────────────────

struct SessionUpdateTool {
    ctx: Arc<ServerContext>,
}

#[async_trait]
impl Tool for SessionUpdateTool {
    fn name(&self) -> &str {
        "update_session_context"
    }

    fn description(&self) -> &str {
        "Update session context with new information"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "context_update": {
                    "type": "object",
                    "description": "Context data to add or update"
                },
                "conversation_entry": {
                    "type": "object",
                    "description": "Conversation entry to log"
                }
            },
            "required": ["context_update"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let update = arguments
            .get("context_update")
            .and_then(|v| v.as_object())
            .cloned()
            .ok_or_else(|| {
                ToolError::InvalidArguments("Missing 'context_update' argument".into())
            })?;
        let conversation_entry = arguments.get("conversation_entry").cloned();

        // Merge into the server-local context first.
        let merged = {
            let mut local = self.ctx.session_context.write().unwrap();
            for (key, value) in &update {
                local.insert(key.clone(), value.clone());
            }
            local.clone()
        };

        let current = self.ctx.current_session.read().unwrap().clone();
        let session_id = match current {
            Some(session_id) => {
                self.ctx
                    .sessions
                    .update_context(&session_id, update, conversation_entry)
                    .await
                    .map_err(|e| ToolError::ExecutionFailed {
                        tool_name: self.name().to_string(),
                        reason: e.to_string(),
                    })?;
                session_id
            }
            None => {
                let session_id = self
                    .ctx
                    .sessions
                    .start("hearthmind_user", merged.clone())
                    .await
                    .map_err(|e| ToolError::ExecutionFailed {
                        tool_name: self.name().to_string(),
                        reason: e.to_string(),
                    })?;
                *self.ctx.current_session.write().unwrap() = Some(session_id.clone());
                session_id
            }
        };

        let active_domains = merged
            .get("active_domains")
            .cloned()
            .unwrap_or_else(|| serde_json::json!([self.ctx.domain]));

        Ok(serde_json::json!({
            "session_id": session_id,
            "context_updated": true,
            "active_domains": active_domains,
        }))
    }
}

// ── get_usage_stats ───────────────────────────────────────────────────────

struct UsageStatsTool {
    ctx: Arc<ServerContext>,
}

#[async_trait]
impl Tool for UsageStatsTool {
    fn name(&self) -> &str {
        "get_usage_stats"
    }

    fn description(&self) -> &str {
        "Get API usage and cost statistics"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "period": {
                    "type": "string",
                    "enum": ["daily", "weekly", "monthly"],
                    "default": "daily"
                }
            }
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let period = arguments
            .get("period")
            .and_then(|v| v.as_str())
            .unwrap_or("daily");

        let server = Some(self.ctx.server_name.as_str());
        let usage = match period {
            "weekly" => self.ctx.costs.weekly_usage(server).await,
            "monthly" => self.ctx.costs.monthly_usage(server).await,
            _ => self.ctx.costs.daily_usage(server).await,
        }
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().to_string(),
            reason: e.to_string(),
        })?;

        Ok(serde_json::json!({
            "period": period,
            "server_name": self.ctx.server_name,
            "domain": self.ctx.domain,
            "usage": usage,
            "requests_handled": self.ctx.counters.requests.load(Ordering::Relaxed),
            "errors": self.ctx.counters.errors.load(Ordering::Relaxed),
            "uptime_hours": (Utc::now() - self.ctx.started_at).num_seconds() as f64 / 3600.0,
            "cache_stats": self.ctx.cache.stats(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ServerCore;
    use hearthmind_cache::CacheService;
    use hearthmind_core::knowledge::{KnowledgeRecord, KnowledgeStore};
    use hearthmind_patterns::PatternDetector;
    use hearthmind_store::InMemoryStore;
    use hearthmind_telemetry::{CostTracker, InMemoryUsageLog};
    use std::time::Duration;

    fn make_server() -> (ServerCore, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let log = Arc::new(InMemoryUsageLog::new());
        let costs = Arc::new(CostTracker::new(store.clone(), log, 50.0));
        let patterns = Arc::new(PatternDetector::new(store.clone()));
        let cache = Arc::new(CacheService::new(1000, Duration::from_secs(60)));
        let server =
            ServerCore::new("financial", store.clone(), store.clone(), costs, cache, patterns)
                .unwrap();
        (server, store)
    }

    #[tokio::test]
    async fn search_knowledge_returns_and_touches_results() {
        let (server, store) = make_server();

        let id = store
            .store(KnowledgeRecord::new(
                "financial",
                "Vacation budget notes",
                "Planned $2500 for the summer trip",
                serde_json::Map::new(),
                vec!["vacation".into(), "budget".into()],
            ))
            .await
            .unwrap();

        let result = server
            .call_tool(
                "search_knowledge",
                serde_json::json!({"query": "vacation budget"}),
            )
            .await
            .unwrap();

        assert_eq!(result["results_count"], 1);
        assert_eq!(result["domains_searched"], serde_json::json!(["financial"]));
        assert_eq!(result["results"][0]["title"], "Vacation budget notes");

        // The read bumped the record's usage frequency.
        let record = KnowledgeStore::get(store.as_ref(), &id).await.unwrap().unwrap();
        assert_eq!(record.usage_frequency, 1);
    }

    #[tokio::test]
    async fn search_knowledge_requires_query() {
        let (server, _) = make_server();
        let err = server
            .call_tool("search_knowledge", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("query"));
    }

    #[tokio::test]
    async fn pattern_insights_surface_detected_patterns() {
        let (server, _) = make_server();

        // Build a two-domain home-improvement pattern in the default session.
        server
            .ctx
            .patterns
            .analyze_conversation(
                "kitchen renovation and repair estimates",
                "home",
                "default",
                serde_json::Map::new(),
            )
            .await
            .unwrap();
        server
            .ctx
            .patterns
            .analyze_conversation(
                "contractor budget discussion",
                "financial",
                "default",
                serde_json::Map::new(),
            )
            .await
            .unwrap();

        let result = server
            .call_tool(
                "get_pattern_insights",
                serde_json::json!({"context": "what should I plan next"}),
            )
            .await
            .unwrap();

        let suggestions = result["pattern_suggestions"].as_array().unwrap();
        assert!(!suggestions.is_empty());
        assert!(result["generated_at"].is_string());
    }

    #[tokio::test]
    async fn update_session_context_starts_then_updates() {
        let (server, store) = make_server();

        let result = server
            .call_tool(
                "update_session_context",
                serde_json::json!({"context_update": {"goal": "retirement"}}),
            )
            .await
            .unwrap();

        assert_eq!(result["context_updated"], true);
        let session_id = result["session_id"].as_str().unwrap().to_string();
        assert_eq!(result["active_domains"], serde_json::json!(["financial"]));

        // A second update goes to the same session.
        let result = server
            .call_tool(
                "update_session_context",
                serde_json::json!({
                    "context_update": {"timeline": "10 years"},
                    "conversation_entry": {"text": "thinking about retirement"}
                }),
            )
            .await
            .unwrap();
        assert_eq!(result["session_id"], session_id.as_str());

        let session = hearthmind_core::session::SessionStore::get(store.as_ref(), &session_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.context["timeline"], "10 years");
        assert_eq!(session.conversation.len(), 1);
    }

    #[tokio::test]
    async fn usage_stats_report_metering() {
        let (server, _) = make_server();

        server
            .call_tool("get_usage_stats", serde_json::json!({}))
            .await
            .unwrap();
        let result = server
            .call_tool("get_usage_stats", serde_json::json!({"period": "weekly"}))
            .await
            .unwrap();

        assert_eq!(result["period"], "weekly");
        assert_eq!(result["server_name"], "hearthmind-financial");
        // The first stats call itself was metered before the second ran.
        assert!(result["usage"]["total_requests"].as_u64().unwrap() >= 1);
        assert!(result["requests_handled"].as_u64().unwrap() >= 2);
    }
}
