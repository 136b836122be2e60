//! End-to-end integration tests for the Hearthmind domain servers.
//!
//! These tests exercise the full pipeline from tool call to knowledge
//! write-back, including cross-server pattern detection, budget alerting,
//! and result caching — everything a transport would sit in front of.

use std::sync::Arc;
use std::time::Duration;

use hearthmind_cache::{hashed_key, CacheService};
use hearthmind_core::knowledge::{KnowledgeQuery, KnowledgeStore};
use hearthmind_core::session::SessionStore;
use hearthmind_patterns::PatternDetector;
use hearthmind_server::ServerCore;
use hearthmind_store::{InMemoryStore, SqliteStore};
use hearthmind_telemetry::{CostTracker, InMemoryUsageLog};

/// Shared services plus one server per domain, the way a deployment wires
/// multiple domain servers over one knowledge store.
struct Deployment {
    store: Arc<InMemoryStore>,
    financial: ServerCore,
    home: ServerCore,
}

fn make_deployment(daily_limit: f64) -> Deployment {
    let store = Arc::new(InMemoryStore::new());
    let log = Arc::new(InMemoryUsageLog::new());
    let costs = Arc::new(CostTracker::new(store.clone(), log, daily_limit));
    let patterns = Arc::new(PatternDetector::new(store.clone()));
    let cache = Arc::new(CacheService::new(10_000, Duration::from_secs(3600)));

    let mut financial = ServerCore::new(
        "financial",
        store.clone(),
        store.clone(),
        costs.clone(),
        cache.clone(),
        patterns.clone(),
    )
    .unwrap();
    for tool in hearthmind_tools::financial_tools() {
        financial.register_tool(tool).unwrap();
    }

    let home = ServerCore::new("home", store.clone(), store.clone(), costs, cache, patterns)
        .unwrap();

    Deployment {
        store,
        financial,
        home,
    }
}

#[tokio::test]
async fn financial_tool_flows_through_the_whole_pipeline() {
    let deployment = make_deployment(50.0);
    let server = &deployment.financial;

    let args = serde_json::json!({
        "income": 6000.0,
        "expenses": {"rent": 1800.0, "food": 700.0, "transport": 300.0},
        "goals": ["vacation", "emergency_fund"]
    });
    let result = server.call_tool("analyze_budget", args.clone()).await.unwrap();

    assert_eq!(result["budget_summary"]["net_income"], 3200.0);
    assert_eq!(result["goals_assessment"]["feasible"], true);

    // The result was cached under its deterministic key.
    let cache_key = format!("analyze_budget:{}", hashed_key(&args));
    assert_eq!(
        server.cache().get(&cache_key, "financial").unwrap(),
        result
    );

    // A substantial result produced a knowledge record.
    let records = deployment
        .store
        .search(KnowledgeQuery::new().keywords(vec!["analyze_budget".into()]))
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Tool Result: analyze_budget");
    assert_eq!(records[0].domain, "financial");

    // And the call was metered.
    let usage = server
        .costs()
        .daily_usage(Some("hearthmind-financial"))
        .await
        .unwrap();
    assert_eq!(usage.total_requests, 1);
    assert!(usage.total_cost > 0.0);
}

#[tokio::test]
async fn conversations_across_servers_become_pattern_suggestions() {
    let deployment = make_deployment(50.0);

    // Both servers share the pattern detector, so turns from different
    // domains accumulate in the same default session.
    deployment
        .home
        .call_tool(
            "search_knowledge",
            serde_json::json!({"query": "kitchen renovation and repair quotes"}),
        )
        .await
        .unwrap();
    deployment
        .financial
        .call_tool(
            "search_knowledge",
            serde_json::json!({"query": "contractor payment plan options"}),
        )
        .await
        .unwrap();

    // home + financial evidence inside the window → home_improvement_project.
    let insights = deployment
        .financial
        .call_tool(
            "get_pattern_insights",
            serde_json::json!({"context": "what should I look at next"}),
        )
        .await
        .unwrap();

    let suggestions = insights["pattern_suggestions"].as_array().unwrap();
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0]["kind"], "project_coordination");

    // The search results were tagged cross-domain, so they surface as
    // cache-level insights too.
    let cache_insights = insights["cross_domain_insights"].as_array().unwrap();
    assert!(!cache_insights.is_empty());
}

#[tokio::test]
async fn budget_alerts_fire_once_per_threshold_across_calls() {
    // A tiny limit so the very first metered call blows every threshold.
    let deployment = make_deployment(0.000_001);

    for _ in 0..5 {
        deployment
            .financial
            .call_tool(
                "analyze_portfolio",
                serde_json::json!({"holdings": [{"symbol": "VTI", "quantity": 1.0, "cost_basis": 100.0}]}),
            )
            .await
            .unwrap();
    }

    let alerts: Vec<_> = deployment
        .store
        .search(KnowledgeQuery::new().keywords(vec!["alert".into()]))
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.metadata.get("type") == Some(&serde_json::json!("budget_alert")))
        .collect();

    // Four thresholds, four alerts, regardless of five calls.
    assert_eq!(alerts.len(), 4);

    // After the daily rollover the same spend alerts again.
    deployment.financial.costs().reset_daily_alerts();
    deployment
        .financial
        .call_tool(
            "analyze_portfolio",
            serde_json::json!({"holdings": [{"symbol": "BND", "quantity": 1.0, "cost_basis": 80.0}]}),
        )
        .await
        .unwrap();

    let alerts = deployment
        .store
        .search(KnowledgeQuery::new().keywords(vec!["alert".into()]))
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.metadata.get("type") == Some(&serde_json::json!("budget_alert")))
        .count();
    assert_eq!(alerts, 8);
}

#[tokio::test]
async fn sessions_scope_pattern_history() {
    let deployment = make_deployment(50.0);
    let server = &deployment.financial;

    let session_id = server.start_session(serde_json::Map::new()).await.unwrap();

    server
        .call_tool(
            "search_knowledge",
            serde_json::json!({"query": "budget $2,000 for the renovation"}),
        )
        .await
        .unwrap();

    let session = SessionStore::get(deployment.store.as_ref(), &session_id)
        .await
        .unwrap()
        .unwrap();
    assert!(session.is_active);

    server.end_session().await.unwrap();
    let session = SessionStore::get(deployment.store.as_ref(), &session_id)
        .await
        .unwrap()
        .unwrap();
    assert!(!session.is_active);

    // The turn was recorded against the session that was active.
    let analytics = server.patterns().analytics();
    assert_eq!(analytics.total_sessions, 1);
    assert!(analytics
        .most_common_triggers
        .iter()
        .any(|(t, _)| t == "financial_amount"));
}

#[tokio::test]
async fn sqlite_backed_server_round_trips_knowledge() {
    let store = Arc::new(SqliteStore::new("sqlite::memory:").await.unwrap());
    let log = Arc::new(InMemoryUsageLog::new());
    let costs = Arc::new(CostTracker::new(store.clone(), log, 50.0));
    let patterns = Arc::new(PatternDetector::new(store.clone()));
    let cache = Arc::new(CacheService::new(10_000, Duration::from_secs(3600)));

    let mut server = ServerCore::new(
        "financial",
        store.clone(),
        store.clone(),
        costs,
        cache,
        patterns,
    )
    .unwrap();
    for tool in hearthmind_tools::financial_tools() {
        server.register_tool(tool).unwrap();
    }

    server
        .call_tool(
            "plan_financial_goal",
            serde_json::json!({
                "goal_type": "house",
                "target_amount": 50000.0,
                "timeline_months": 36,
                "monthly_contribution": 1500.0
            }),
        )
        .await
        .unwrap();

    // The write-back landed in SQLite and is searchable through the tool.
    let result = server
        .call_tool(
            "search_knowledge",
            serde_json::json!({"query": "plan_financial_goal"}),
        )
        .await
        .unwrap();
    assert_eq!(result["results_count"], 1);
    assert_eq!(
        result["results"][0]["title"],
        "Tool Result: plan_financial_goal"
    );
}

#[tokio::test]
async fn server_status_reflects_activity() {
    let deployment = make_deployment(50.0);
    let server = &deployment.financial;

    server
        .call_tool(
            "analyze_budget",
            serde_json::json!({"income": 1000.0, "expenses": {}}),
        )
        .await
        .unwrap();
    server
        .call_tool("analyze_budget", serde_json::json!({}))
        .await
        .unwrap_err();

    let status = server.status();
    assert_eq!(status.server_name, "hearthmind-financial");
    assert_eq!(status.requests_handled, 2);
    assert_eq!(status.errors, 1);
    assert!((status.error_rate - 0.5).abs() < 1e-10);
    assert_eq!(status.registered_tools.len(), 8);
    assert!(status.cache_stats.sets >= 1);
}
