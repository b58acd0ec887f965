// stats.rs — Running statistics derived from audit appends.
//
// Recomputed incrementally on every append, in the same locked step as
// the log write. Counters are all-time totals: eviction of old entries
// never decrements them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entry::{AuditAction, AuditLogEntry};

/// Point-in-time snapshot of the trail's derived statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemStatistics {
    /// Total evaluations recorded, ever.
    pub total_evaluated: u64,
    /// Evaluations that ended in allow.
    pub total_allowed: u64,
    /// Evaluations that ended in deny (including overridden denials).
    pub total_denied: u64,
    /// Evaluations that carried at least one per-rule evaluation error.
    pub total_errored: u64,
    /// Deny count per triggering rule id.
    pub rule_violations: BTreeMap<String, u64>,
    /// Deny count per agent id.
    pub agent_violations: BTreeMap<String, u64>,
    /// Running mean of evaluation wall-clock duration, milliseconds.
    pub avg_duration_ms: f64,
}

impl SystemStatistics {
    /// Fold one appended entry into the running totals.
    pub(crate) fn record(&mut self, entry: &AuditLogEntry) {
        self.total_evaluated += 1;
        match entry.action {
            AuditAction::Allowed => self.total_allowed += 1,
            AuditAction::Denied | AuditAction::Overridden => {
                self.total_denied += 1;
                *self
                    .agent_violations
                    .entry(entry.agent_id.clone())
                    .or_default() += 1;
                for rule_id in &entry.triggered_rules {
                    *self.rule_violations.entry(rule_id.clone()).or_default() += 1;
                }
            }
        }
        if entry.error.is_some() {
            self.total_errored += 1;
        }
        // Incremental mean: avg += (x - avg) / n
        let n = self.total_evaluated as f64;
        self.avg_duration_ms += (entry.duration_ms - self.avg_duration_ms) / n;
    }
}
