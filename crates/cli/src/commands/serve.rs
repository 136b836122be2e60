//! The `serve` command — a domain server over line-delimited JSON on stdio.
//!
//! Each stdin line is one request; each stdout line is one response:
//!
//! ```text
//! {"id": 1, "method": "tools/list"}
//! {"id": 2, "method": "tools/call", "params": {"name": "analyze_budget", "arguments": {...}}}
//! {"id": 3, "method": "server/status"}
//! {"id": 4, "method": "session/start", "params": {"context": {...}}}
//! {"id": 5, "method": "session/end"}
//! ```
//!
//! The pipeline itself is transport-agnostic; this is the thinnest useful
//! front end for it.

use hearthmind_cache::CacheService;
use hearthmind_config::AppConfig;
use hearthmind_core::knowledge::KnowledgeStore;
use hearthmind_core::session::SessionStore;
use hearthmind_patterns::PatternDetector;
use hearthmind_server::ServerCore;
use hearthmind_store::{InMemoryStore, SqliteStore};
use hearthmind_telemetry::{CostTracker, InMemoryUsageLog};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub(crate) struct Request {
    #[serde(default)]
    id: serde_json::Value,
    method: String,
    #[serde(default)]
    params: serde_json::Value,
}

pub async fn run(
    config_path: Option<PathBuf>,
    domain: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.unwrap_or_else(|| PathBuf::from("hearthmind.toml"));
    let mut config = AppConfig::load(&path)?;
    if let Some(domain) = domain {
        config.server.domain = domain;
        config.validate()?;
    }

    let server = Arc::new(build_server(&config).await?);
    spawn_maintenance(server.clone(), &config);

    info!("Serving {} on stdio", server.status().server_name);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => handle_request(&server, request).await,
            Err(e) => serde_json::json!({
                "id": null,
                "error": { "message": format!("invalid request: {e}") },
            }),
        };
        stdout
            .write_all(format!("{response}\n").as_bytes())
            .await?;
        stdout.flush().await?;
    }

    server.end_session().await.ok();
    info!("stdin closed, shutting down");
    Ok(())
}

/// Wire a server from config: store backend, cache, cost tracker, pattern
/// detector, and the domain's tools.
pub(crate) async fn build_server(
    config: &AppConfig,
) -> Result<ServerCore, Box<dyn std::error::Error>> {
    let (knowledge, sessions): (Arc<dyn KnowledgeStore>, Arc<dyn SessionStore>) =
        if config.store.backend == "memory" {
            let store = Arc::new(InMemoryStore::new());
            (store.clone(), store)
        } else {
            let store = Arc::new(SqliteStore::new(&config.store.path).await?);
            (store.clone(), store)
        };

    let cache = Arc::new(CacheService::new(
        config.cache.max_entries,
        Duration::from_secs(config.cache.default_ttl_secs),
    ));
    let costs = Arc::new(CostTracker::new(
        knowledge.clone(),
        Arc::new(InMemoryUsageLog::new()),
        config.budget.daily_limit,
    ));
    let patterns = Arc::new(PatternDetector::new(knowledge.clone()));

    let mut server = ServerCore::new(
        &config.server.domain,
        knowledge,
        sessions,
        costs.clone(),
        cache,
        patterns,
    )?;

    if config.server.domain == "financial" {
        for tool in hearthmind_tools::financial_tools() {
            server.register_tool(tool)?;
        }
    }

    Ok(server)
}

/// Periodic upkeep: hourly cache sweeps, daily history pruning and budget
/// alert resets.
fn spawn_maintenance(server: Arc<ServerCore>, config: &AppConfig) {
    let retention_days = config.patterns.retention_days;

    tokio::spawn({
        let server = server.clone();
        async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3600));
            interval.tick().await; // immediate first tick
            loop {
                interval.tick().await;
                let swept = server.cache().cleanup_expired();
                if swept > 0 {
                    info!("Swept {swept} expired cache entries");
                }
            }
        }
    });

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(86_400));
        interval.tick().await;
        loop {
            interval.tick().await;
            server.costs().reset_daily_alerts();
            server.patterns().cleanup_old_patterns(retention_days);
        }
    });
}

pub(crate) async fn handle_request(server: &ServerCore, request: Request) -> serde_json::Value {
    let id = request.id.clone();
    match request.method.as_str() {
        "tools/list" => serde_json::json!({
            "id": id,
            "result": { "tools": server.list_tools() },
        }),
        "tools/call" => {
            let name = request
                .params
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let arguments = request
                .params
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| serde_json::json!({}));

            match server.call_tool(&name, arguments).await {
                Ok(result) => serde_json::json!({ "id": id, "result": result }),
                Err(e) => {
                    warn!("tools/call {name} failed: {e}");
                    serde_json::json!({ "id": id, "error": { "message": e.to_string() } })
                }
            }
        }
        "server/status" => serde_json::json!({
            "id": id,
            "result": server.status(),
        }),
        "session/start" => {
            let context = request
                .params
                .get("context")
                .and_then(|v| v.as_object())
                .cloned()
                .unwrap_or_default();
            match server.start_session(context).await {
                Ok(session_id) => {
                    serde_json::json!({ "id": id, "result": { "session_id": session_id } })
                }
                Err(e) => serde_json::json!({ "id": id, "error": { "message": e.to_string() } }),
            }
        }
        "session/end" => match server.end_session().await {
            Ok(()) => serde_json::json!({ "id": id, "result": { "ended": true } }),
            Err(e) => serde_json::json!({ "id": id, "error": { "message": e.to_string() } }),
        },
        other => serde_json::json!({
            "id": id,
            "error": { "message": format!("unknown method: {other}") },
        }),
    }
}
