//! UsageLog trait — the append-only event log behind the cost tracker.
//!
//! Persistence failures propagate: the caller needs to know tracking
//! failed, even though the dispatch pipeline treats them as best-effort.

use crate::model::UsageEvent;
use crate::TrackingError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// An append-only log of usage events with trailing-window queries.
#[async_trait]
pub trait UsageLog: Send + Sync {
    /// Append an event to the log.
    async fn append(&self, event: &UsageEvent) -> Result<(), TrackingError>;

    /// Fetch events at or after `cutoff`, optionally restricted to a server.
    async fn since(
        &self,
        cutoff: DateTime<Utc>,
        server_name: Option<&str>,
    ) -> Result<Vec<UsageEvent>, TrackingError>;
}

/// In-memory usage log (most recent last).
pub struct InMemoryUsageLog {
    events: RwLock<Vec<UsageEvent>>,
}

impl InMemoryUsageLog {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// Total number of recorded events.
    pub fn len(&self) -> usize {
        self.events.read().unwrap().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop events older than a cutoff. Returns how many were removed.
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut events = self.events.write().unwrap();
        let before = events.len();
        events.retain(|e| e.timestamp >= cutoff);
        before - events.len()
    }
}

impl Default for InMemoryUsageLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UsageLog for InMemoryUsageLog {
    async fn append(&self, event: &UsageEvent) -> Result<(), TrackingError> {
        self.events.write().unwrap().push(event.clone());
        Ok(())
    }

    async fn since(
        &self,
        cutoff: DateTime<Utc>,
        server_name: Option<&str>,
    ) -> Result<Vec<UsageEvent>, TrackingError> {
        let events = self.events.read().unwrap();
        Ok(events
            .iter()
            .filter(|e| {
                e.timestamp >= cutoff
                    && server_name.is_none_or(|s| e.server_name == s)
            })
            .cloned()
            .collect())
    }
}
