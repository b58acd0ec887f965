// entry.rs — Audit entry data model.
//
// One entry per evaluation, owned exclusively by the trail. Entries are
// immutable after construction; the builder methods below are for the
// moment of creation only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the recorded evaluation decided.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// The task was allowed to proceed.
    Allowed,
    /// The task was denied.
    Denied,
    /// A triggered rule carried the `override` action tag.
    Overridden,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::Allowed => write!(f, "allowed"),
            AuditAction::Denied => write!(f, "denied"),
            AuditAction::Overridden => write!(f, "overridden"),
        }
    }
}

/// A single immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// Unique identifier for this entry.
    pub entry_id: Uuid,

    /// When the evaluation completed (UTC).
    pub timestamp: DateTime<Utc>,

    /// Which agent's task was evaluated.
    pub agent_id: String,

    /// The task identifier or name, when the context carried one.
    pub task_id: Option<String>,

    /// What the evaluation decided.
    pub action: AuditAction,

    /// Ids of the rules that triggered, in evaluation order.
    #[serde(default)]
    pub triggered_rules: Vec<String>,

    /// Action tags collected from triggered rules ("log", "notify", ...).
    #[serde(default)]
    pub applied_actions: Vec<String>,

    /// Snapshot of the context payload, when the caller opted to keep one.
    pub payload: Option<serde_json::Value>,

    /// Human-readable decision reason.
    pub result: Option<String>,

    /// Per-rule evaluation diagnostics, joined for operator display.
    pub error: Option<String>,

    /// Wall-clock evaluation duration in milliseconds.
    pub duration_ms: f64,

    /// The requesting user, when the context metadata named one.
    pub user: Option<String>,

    /// Whether the evaluation ran in simulation mode.
    #[serde(default)]
    pub simulation: bool,
}

impl AuditLogEntry {
    /// Create an entry with the current timestamp and a random id.
    pub fn new(agent_id: impl Into<String>, action: AuditAction) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            agent_id: agent_id.into(),
            task_id: None,
            action,
            triggered_rules: Vec::new(),
            applied_actions: Vec::new(),
            payload: None,
            result: None,
            error: None,
            duration_ms: 0.0,
            user: None,
            simulation: false,
        }
    }

    /// Set the task id and return self (builder pattern).
    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Set the triggered rule ids and return self.
    pub fn with_triggered_rules(mut self, rules: Vec<String>) -> Self {
        self.triggered_rules = rules;
        self
    }

    /// Set the applied action tags and return self.
    pub fn with_applied_actions(mut self, actions: Vec<String>) -> Self {
        self.applied_actions = actions;
        self
    }

    /// Attach a payload snapshot and return self.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Set the decision reason and return self.
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    /// Set the diagnostic note and return self.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Set the measured duration and return self.
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Set the requesting user and return self.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Mark the entry as simulation-mode and return self.
    pub fn with_simulation(mut self, simulation: bool) -> Self {
        self.simulation = simulation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_serialization_round_trip() {
        let entry = AuditLogEntry::new("agent-1", AuditAction::Denied)
            .with_task("transfer_funds")
            .with_triggered_rules(vec!["limit-transfers".into()])
            .with_applied_actions(vec!["log".into(), "notify".into()])
            .with_result("denied by rule 'Large transfers' (task scope)")
            .with_duration_ms(0.42)
            .with_simulation(true);

        let json = serde_json::to_string(&entry).expect("serialize");
        let restored: AuditLogEntry = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(entry.entry_id, restored.entry_id);
        assert_eq!(restored.action, AuditAction::Denied);
        assert_eq!(restored.triggered_rules, vec!["limit-transfers".to_string()]);
        assert!(restored.simulation);
    }

    #[test]
    fn entry_ids_are_unique() {
        let a = AuditLogEntry::new("a", AuditAction::Allowed);
        let b = AuditLogEntry::new("a", AuditAction::Allowed);
        assert_ne!(a.entry_id, b.entry_id);
    }

    #[test]
    fn action_serializes_as_snake_case() {
        let json = serde_json::to_string(&AuditAction::Overridden).unwrap();
        assert_eq!(json, "\"overridden\"");
    }
}
