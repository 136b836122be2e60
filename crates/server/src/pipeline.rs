//! The tool dispatch pipeline.
//!
//! `ServerCore` owns the tool registry and the shared services, and wraps
//! every invocation with metering, pattern analysis, caching, and knowledge
//! write-back in a fixed order. The primary tool result always wins over
//! telemetry completeness: auxiliary failures are logged and swallowed.

use crate::standard;
use chrono::{DateTime, Utc};
use hearthmind_cache::{hashed_key, CacheService, CacheStats};
use hearthmind_core::domain::{server_name, KNOWN_DOMAINS};
use hearthmind_core::error::ToolError;
use hearthmind_core::knowledge::{KnowledgeRecord, KnowledgeStore};
use hearthmind_core::session::SessionStore;
use hearthmind_core::tool::{Tool, ToolDefinition, ToolRegistry};
use hearthmind_patterns::{PatternAnalytics, PatternDetector};
use hearthmind_telemetry::CostTracker;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Fixed output-token estimate for internal tool calls.
const OUTPUT_TOKEN_ESTIMATE: u64 = 100;

/// TTL for cached tool results.
const RESULT_CACHE_TTL: Duration = Duration::from_secs(1800);

/// Serialized results shorter than this are not worth a knowledge record.
const MIN_KNOWLEDGE_LEN: usize = 50;

/// Upper bound on how long a best-effort side effect may stall a call.
const SIDE_EFFECT_BUDGET: Duration = Duration::from_secs(2);

/// Request/error counters, shared with the usage-stats tool.
#[derive(Default)]
pub(crate) struct ServerCounters {
    pub requests: AtomicU64,
    pub errors: AtomicU64,
}

/// State shared between the pipeline and the standard tools.
pub(crate) struct ServerContext {
    pub domain: String,
    pub server_name: String,
    pub knowledge: Arc<dyn KnowledgeStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub patterns: Arc<PatternDetector>,
    pub costs: Arc<CostTracker>,
    pub cache: Arc<CacheService>,
    pub counters: ServerCounters,
    pub current_session: RwLock<Option<String>>,
    pub session_context: RwLock<serde_json::Map<String, serde_json::Value>>,
    pub started_at: DateTime<Utc>,
}

impl ServerContext {
    /// The session ID pattern analysis is keyed by ("default" before any
    /// session has been started).
    pub fn session_id(&self) -> String {
        self.current_session
            .read()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "default".to_string())
    }
}

/// A point-in-time server status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub server_name: String,
    pub domain: String,
    pub status: String,
    pub uptime_hours: f64,
    pub requests_handled: u64,
    pub errors: u64,
    pub error_rate: f64,
    pub registered_tools: Vec<String>,
    pub current_session: Option<String>,
    pub cache_stats: CacheStats,
    pub pattern_analytics: PatternAnalytics,
}

/// A domain server: tool registry plus the shared request pipeline.
pub struct ServerCore {
    pub(crate) ctx: Arc<ServerContext>,
    registry: ToolRegistry,
}

impl ServerCore {
    /// Create a server for a domain and register the standard tools every
    /// domain exposes (knowledge search, pattern insights, session updates,
    /// usage stats).
    pub fn new(
        domain: &str,
        knowledge: Arc<dyn KnowledgeStore>,
        sessions: Arc<dyn SessionStore>,
        costs: Arc<CostTracker>,
        cache: Arc<CacheService>,
        patterns: Arc<PatternDetector>,
    ) -> Result<Self, ToolError> {
        let ctx = Arc::new(ServerContext {
            domain: domain.to_string(),
            server_name: server_name(domain),
            knowledge,
            sessions,
            patterns,
            costs,
            cache,
            counters: ServerCounters::default(),
            current_session: RwLock::new(None),
            session_context: RwLock::new(serde_json::Map::new()),
            started_at: Utc::now(),
        });

        let mut registry = ToolRegistry::new();
        for tool in standard::standard_tools(ctx.clone()) {
            registry.register(tool)?;
        }

        info!(
            "Initialized {} with {} standard tools",
            ctx.server_name,
            registry.len()
        );

        Ok(Self { ctx, registry })
    }

    /// Register a domain-specific tool. Fails on a name collision.
    pub fn register_tool(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        self.registry.register(tool)
    }

    /// The server's domain.
    pub fn domain(&self) -> &str {
        &self.ctx.domain
    }

    /// The cache service, for maintenance sweeps.
    pub fn cache(&self) -> &CacheService {
        &self.ctx.cache
    }

    /// The cost tracker, for daily alert resets and reports.
    pub fn costs(&self) -> &CostTracker {
        &self.ctx.costs
    }

    /// The pattern detector, for history pruning.
    pub fn patterns(&self) -> &PatternDetector {
        &self.ctx.patterns
    }

    /// List tool definitions for the transport layer.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// Invoke a tool through the full pipeline.
    ///
    /// Exactly this sequence runs: counter increment, usage metering,
    /// pattern analysis of free-text arguments, the domain handler, result
    /// caching, knowledge write-back, duration logging. Steps other than
    /// the handler are best-effort; handler errors propagate as
    /// `ToolError::ExecutionFailed`.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, ToolError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        self.ctx.counters.requests.fetch_add(1, Ordering::Relaxed);
        let start = Instant::now();

        self.track_usage(name, &arguments).await;
        self.analyze_arguments(&arguments).await;

        let result = match tool.execute(arguments.clone()).await {
            Ok(result) => result,
            Err(e) => {
                self.ctx.counters.errors.fetch_add(1, Ordering::Relaxed);
                error!("Tool call error in {}: {e}", self.ctx.server_name);
                return Err(ToolError::ExecutionFailed {
                    tool_name: name.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        self.cache_result(name, &arguments, &result);
        self.write_back(name, &arguments, &result).await;

        debug!("Tool {name} completed in {:?}", start.elapsed());
        Ok(result)
    }

    /// Step 2: meter the call against the budget. Best-effort.
    async fn track_usage(&self, name: &str, arguments: &serde_json::Value) {
        let input_estimate = serde_json::to_string(arguments)
            .map(|s| s.len() as u64 / 4)
            .unwrap_or(0);

        let mut metadata = serde_json::Map::new();
        metadata.insert("tool_name".into(), serde_json::json!(name));
        metadata.insert("domain".into(), serde_json::json!(self.ctx.domain));

        let tracked = tokio::time::timeout(
            SIDE_EFFECT_BUDGET,
            self.ctx.costs.track_usage(
                &self.ctx.server_name,
                "internal",
                "tool-call",
                name,
                input_estimate,
                OUTPUT_TOKEN_ESTIMATE,
                metadata,
            ),
        )
        .await;

        match tracked {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Usage tracking failed for {name}: {e}"),
            Err(_) => warn!("Usage tracking timed out for {name}"),
        }
    }

    /// Step 3: feed free-text arguments to the pattern detector. Best-effort.
    async fn analyze_arguments(&self, arguments: &serde_json::Value) {
        let Some(content) = arguments
            .get("query")
            .or_else(|| arguments.get("context"))
            .and_then(|v| v.as_str())
        else {
            return;
        };

        let session_id = self.ctx.session_id();
        let analyzed = tokio::time::timeout(
            SIDE_EFFECT_BUDGET,
            self.ctx.patterns.analyze_conversation(
                content,
                &self.ctx.domain,
                &session_id,
                serde_json::Map::new(),
            ),
        )
        .await;

        match analyzed {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Pattern analysis failed: {e}"),
            Err(_) => warn!("Pattern analysis timed out"),
        }
    }

    /// Step 5: cache the result under a deterministic key. Best-effort —
    /// the cache service swallows backend errors internally.
    fn cache_result(&self, name: &str, arguments: &serde_json::Value, result: &serde_json::Value) {
        let cache_key = format!("{name}:{}", hashed_key(arguments));

        // Search-shaped tools produce results other domains may want.
        let relevance = if name.contains("search") || name.contains("knowledge") {
            KNOWN_DOMAINS.iter().map(|d| d.to_string()).collect()
        } else {
            Vec::new()
        };

        self.ctx.cache.set(
            &cache_key,
            result.clone(),
            &self.ctx.domain,
            Some(RESULT_CACHE_TTL),
            relevance,
        );
    }

    /// Step 6: summarize substantial results into the knowledge store.
    /// Best-effort.
    async fn write_back(
        &self,
        name: &str,
        arguments: &serde_json::Value,
        result: &serde_json::Value,
    ) {
        let content = match result {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if content.len() < MIN_KNOWLEDGE_LEN {
            return;
        }

        let mut keywords: Vec<String> = Vec::new();
        if let Some(args) = arguments.as_object() {
            for value in args.values() {
                if let Some(text) = value.as_str() {
                    keywords.extend(text.to_lowercase().split_whitespace().map(String::from));
                }
            }
        }
        keywords.push(name.to_string());
        keywords.push(self.ctx.domain.clone());
        keywords.sort();
        keywords.dedup();

        let mut metadata = serde_json::Map::new();
        metadata.insert("tool_name".into(), serde_json::json!(name));
        metadata.insert("arguments".into(), arguments.clone());
        metadata.insert("timestamp".into(), serde_json::json!(Utc::now().to_rfc3339()));
        metadata.insert("source".into(), serde_json::json!("tool_result"));

        let record = KnowledgeRecord::new(
            &self.ctx.domain,
            format!("Tool Result: {name}"),
            content,
            metadata,
            keywords,
        );

        let stored = tokio::time::timeout(SIDE_EFFECT_BUDGET, self.ctx.knowledge.store(record)).await;
        match stored {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Knowledge write-back failed for {name}: {e}"),
            Err(_) => warn!("Knowledge write-back timed out for {name}"),
        }
    }

    /// Start a new user session. Subsequent pattern analysis is keyed by it.
    pub async fn start_session(
        &self,
        mut user_context: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, hearthmind_core::error::SessionError> {
        user_context.insert("domain".into(), serde_json::json!(self.ctx.domain));
        user_context.insert("server_name".into(), serde_json::json!(self.ctx.server_name));

        let user_id = user_context
            .get("user_id")
            .and_then(|v| v.as_str())
            .unwrap_or("hearthmind_user")
            .to_string();

        let session_id = self.ctx.sessions.start(&user_id, user_context.clone()).await?;
        *self.ctx.current_session.write().unwrap() = Some(session_id.clone());
        *self.ctx.session_context.write().unwrap() = user_context;

        info!("Started session {session_id} for {}", self.ctx.server_name);
        Ok(session_id)
    }

    /// End the current session, if any.
    pub async fn end_session(&self) -> Result<(), hearthmind_core::error::SessionError> {
        let session_id = self.ctx.current_session.write().unwrap().take();
        if let Some(session_id) = session_id {
            self.ctx.sessions.end(&session_id).await?;
            self.ctx.session_context.write().unwrap().clear();
            info!("Ended session {session_id} for {}", self.ctx.server_name);
        }
        Ok(())
    }

    /// A comprehensive status snapshot for observability endpoints.
    pub fn status(&self) -> ServerStatus {
        let requests = self.ctx.counters.requests.load(Ordering::Relaxed);
        let errors = self.ctx.counters.errors.load(Ordering::Relaxed);

        ServerStatus {
            server_name: self.ctx.server_name.clone(),
            domain: self.ctx.domain.clone(),
            status: "running".to_string(),
            uptime_hours: (Utc::now() - self.ctx.started_at).num_seconds() as f64 / 3600.0,
            requests_handled: requests,
            errors,
            error_rate: errors as f64 / requests.max(1) as f64,
            registered_tools: self.registry.names().iter().map(|s| s.to_string()).collect(),
            current_session: self.ctx.current_session.read().unwrap().clone(),
            cache_stats: self.ctx.cache.stats(),
            pattern_analytics: self.ctx.patterns.analytics(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hearthmind_cache::{CacheBackend, CacheError};
    use hearthmind_core::knowledge::KnowledgeQuery;
    use hearthmind_store::InMemoryStore;
    use hearthmind_telemetry::InMemoryUsageLog;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": { "query": { "type": "string" } }
            })
        }
        async fn execute(
            &self,
            arguments: serde_json::Value,
        ) -> Result<serde_json::Value, ToolError> {
            Ok(arguments)
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(
            &self,
            _arguments: serde_json::Value,
        ) -> Result<serde_json::Value, ToolError> {
            Err(ToolError::InvalidArguments("intentional failure".into()))
        }
    }

    /// A cache backend that fails every operation.
    struct BrokenCacheBackend;

    impl CacheBackend for BrokenCacheBackend {
        fn name(&self) -> &str {
            "broken"
        }
        fn get(&self, _key: &str) -> Result<Option<serde_json::Value>, CacheError> {
            Err(CacheError::Backend("down".into()))
        }
        fn set(&self, _key: &str, _value: serde_json::Value) -> Result<(), CacheError> {
            Err(CacheError::Backend("down".into()))
        }
        fn delete(&self, _key: &str) -> Result<bool, CacheError> {
            Err(CacheError::Backend("down".into()))
        }
    }

    fn make_server_with_cache(cache: Arc<CacheService>) -> (ServerCore, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let log = Arc::new(InMemoryUsageLog::new());
        let costs = Arc::new(CostTracker::new(store.clone(), log, 50.0));
        let patterns = Arc::new(PatternDetector::new(store.clone()));
        let server = ServerCore::new(
            "financial",
            store.clone(),
            store.clone(),
            costs,
            cache,
            patterns,
        )
        .unwrap();
        (server, store)
    }

    fn make_server() -> (ServerCore, Arc<InMemoryStore>) {
        make_server_with_cache(Arc::new(CacheService::new(1000, Duration::from_secs(60))))
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let (server, _) = make_server();
        let err = server
            .call_tool("no_such_tool", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
        // Caller errors don't count as handled requests.
        assert_eq!(server.status().requests_handled, 0);
    }

    #[tokio::test]
    async fn standard_tools_are_registered() {
        let (server, _) = make_server();
        let names: Vec<String> = server
            .list_tools()
            .into_iter()
            .map(|d| d.name)
            .collect();
        for expected in [
            "search_knowledge",
            "get_pattern_insights",
            "update_session_context",
            "get_usage_stats",
        ] {
            assert!(names.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let (mut server, _) = make_server();
        server.register_tool(Box::new(EchoTool)).unwrap();
        assert!(server.register_tool(Box::new(EchoTool)).is_err());
    }

    #[tokio::test]
    async fn echo_pipeline_end_to_end() {
        let (mut server, store) = make_server();
        server.register_tool(Box::new(EchoTool)).unwrap();

        let args = serde_json::json!({"query": "budget $500 for vacation"});
        let result = server.call_tool("echo", args.clone()).await.unwrap();

        // The handler's result comes back unchanged.
        assert_eq!(result, args);

        // A trigger history entry was recorded with the extracted triggers.
        let analytics = server.ctx.patterns.analytics();
        assert_eq!(analytics.total_entries, 1);
        let triggers: Vec<String> = analytics
            .most_common_triggers
            .iter()
            .map(|(t, _)| t.clone())
            .collect();
        assert!(triggers.contains(&"financial_amount".to_string()));
        assert!(triggers.contains(&"budget".to_string()));
        assert!(triggers.contains(&"vacation".to_string()));

        // The call was metered.
        let usage = server
            .ctx
            .costs
            .daily_usage(Some("hearthmind-financial"))
            .await
            .unwrap();
        assert_eq!(usage.total_requests, 1);

        // A longer result crosses the knowledge write-back bar.
        let args = serde_json::json!({
            "query": "planning a family vacation budget with flights, hotels and activities"
        });
        server.call_tool("echo", args).await.unwrap();

        let records = store
            .search(KnowledgeQuery::new().keywords(vec!["echo".into()]))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "Tool Result: echo");
        assert_eq!(records[0].metadata["source"], "tool_result");
    }

    #[tokio::test]
    async fn handler_error_counts_and_propagates() {
        let (mut server, _) = make_server();
        server.register_tool(Box::new(FailingTool)).unwrap();

        let err = server
            .call_tool("failing", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
        assert!(err.to_string().contains("intentional failure"));

        let status = server.status();
        assert_eq!(status.requests_handled, 1);
        assert_eq!(status.errors, 1);
        assert!((status.error_rate - 1.0).abs() < 1e-10);
    }

    #[tokio::test]
    async fn cache_outage_does_not_fail_the_call() {
        let cache = Arc::new(CacheService::with_backend(
            Ok(Box::new(BrokenCacheBackend)),
            Duration::from_secs(60),
        ));
        let (mut server, _) = make_server_with_cache(cache);
        server.register_tool(Box::new(EchoTool)).unwrap();

        let args = serde_json::json!({"query": "budget $500 for vacation"});
        let result = server.call_tool("echo", args.clone()).await.unwrap();
        assert_eq!(result, args);
        assert_eq!(server.status().errors, 0);
        assert!(server.status().cache_stats.errors >= 1);
    }

    #[tokio::test]
    async fn results_are_cached_under_deterministic_key() {
        let (mut server, _) = make_server();
        server.register_tool(Box::new(EchoTool)).unwrap();

        let args = serde_json::json!({"query": "test caching"});
        server.call_tool("echo", args.clone()).await.unwrap();

        let cache_key = format!("echo:{}", hashed_key(&args));
        let cached = server.ctx.cache.get(&cache_key, "financial").unwrap();
        assert_eq!(cached, args);
    }

    #[tokio::test]
    async fn search_tools_are_tagged_cross_domain() {
        let (server, _) = make_server();

        let args = serde_json::json!({"query": "vacation plans and budget"});
        server.call_tool("search_knowledge", args.clone()).await.unwrap();

        // The cached search result is visible from every other domain.
        let suggestions = server.ctx.cache.cross_domain_suggestions("home");
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].domain, "financial");
    }

    #[tokio::test]
    async fn session_lifecycle_flows_into_analysis() {
        let (mut server, _) = make_server();
        server.register_tool(Box::new(EchoTool)).unwrap();

        assert_eq!(server.ctx.session_id(), "default");

        let session_id = server
            .start_session(serde_json::Map::new())
            .await
            .unwrap();
        assert_eq!(server.ctx.session_id(), session_id);
        assert_eq!(server.status().current_session, Some(session_id.clone()));

        server
            .call_tool("echo", serde_json::json!({"query": "budget talk"}))
            .await
            .unwrap();

        server.end_session().await.unwrap();
        assert_eq!(server.ctx.session_id(), "default");
        assert!(server.status().current_session.is_none());
    }

    #[tokio::test]
    async fn status_snapshot() {
        let (server, _) = make_server();
        let status = server.status();
        assert_eq!(status.server_name, "hearthmind-financial");
        assert_eq!(status.domain, "financial");
        assert_eq!(status.status, "running");
        assert_eq!(status.registered_tools.len(), 4);
    }
}
