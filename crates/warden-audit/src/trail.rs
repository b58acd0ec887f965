// trail.rs — The bounded in-memory audit trail.
//
// Single source of truth for decision history. Entries and statistics
// live under one mutex so they can never be observed torn apart; the
// subscriber notification happens after the lock is released, through
// the non-blocking dispatcher.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch::{AuditSink, Dispatcher, LogEvent};
use crate::entry::AuditLogEntry;
use crate::error::AuditError;
use crate::stats::SystemStatistics;

/// Default retained-entry ceiling.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// Default depth of the subscriber notification queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 1_024;

struct TrailInner {
    entries: VecDeque<AuditLogEntry>,
    stats: SystemStatistics,
}

/// Append-only, time-ordered log of every decision, with running
/// statistics and push notification of subscribers.
pub struct AuditTrail {
    inner: Mutex<TrailInner>,
    capacity: usize,
    dispatcher: Dispatcher,
}

/// The initial snapshot offered to a newly connected consumer:
/// `{ recentLogs, health, stats, timestamp }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailSnapshot {
    pub recent_logs: Vec<AuditLogEntry>,
    pub health: String,
    pub stats: SystemStatistics,
    pub timestamp: DateTime<Utc>,
}

impl AuditTrail {
    /// Create a trail with the default capacity and queue depth.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a trail retaining at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(TrailInner {
                entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                stats: SystemStatistics::default(),
            }),
            capacity,
            dispatcher: Dispatcher::start(DEFAULT_QUEUE_DEPTH),
        }
    }

    /// Append an entry, fold it into the statistics, and notify
    /// subscribers (best-effort, never blocking).
    ///
    /// Fails only when the trail cannot hold an entry at all — a fatal
    /// configuration, not a transient condition.
    pub fn append(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        if self.capacity == 0 {
            return Err(AuditError::Capacity {
                message: "trail configured with zero capacity".to_string(),
            });
        }

        {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.stats.record(&entry);
            inner.entries.push_back(entry.clone());
            // FIFO eviction; amortized O(1) per append.
            while inner.entries.len() > self.capacity {
                inner.entries.pop_front();
            }
        }

        self.dispatcher.notify(LogEvent::log(entry));
        Ok(())
    }

    /// The `n` most recent entries, most-recent-first.
    pub fn recent(&self, n: usize) -> Vec<AuditLogEntry> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.iter().rev().take(n).cloned().collect()
    }

    /// Point-in-time statistics snapshot.
    pub fn statistics(&self) -> SystemStatistics {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.stats.clone()
    }

    /// Number of entries currently retained (post-eviction).
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.entries.len()
    }

    /// Whether the trail currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a subscriber for push notification of future appends.
    pub fn subscribe(&self, sink: Box<dyn AuditSink>) {
        self.dispatcher.subscribe(sink);
    }

    /// The initial snapshot a freshly connected consumer requests.
    pub fn snapshot(&self, n: usize) -> TrailSnapshot {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        TrailSnapshot {
            recent_logs: inner.entries.iter().rev().take(n).cloned().collect(),
            health: "ok".to_string(),
            stats: inner.stats.clone(),
            timestamp: Utc::now(),
        }
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new()
    }
}
