// context.rs — Evaluation request and result types.
//
// An EvaluationContext is the one-shot request driving an evaluation:
// built by the caller, consumed once, never mutated. Its payload is
// data, never executable — conditions reference it through the
// flattened dotted namespace only.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_expr::{Namespace, Value};
use warden_policy::{RuleAction, RuleEffect, RuleScope};

/// The task an agent proposes to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRef {
    /// Task identifier, when the caller has one.
    pub id: Option<String>,

    /// Task name (`"transfer_funds"`).
    pub name: String,

    /// Arbitrary task attributes, exposed as `task.<key>` to conditions
    /// (`task.action`, `task.resource`, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

/// Optional request metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub priority: Option<i64>,
    /// Caller-side timeout hint, milliseconds. Not enforced here.
    pub timeout_ms: Option<u64>,
    pub retry_count: Option<u32>,
    /// The human on whose behalf the agent acts.
    pub user: Option<String>,
    /// Role of the requesting user/agent (`"guest"`, `"admin"`).
    pub role: Option<String>,
}

/// The one-shot request driving an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub agent_id: String,
    pub task: TaskRef,

    /// Key/value payload — treated strictly as data.
    #[serde(default)]
    pub payload: BTreeMap<String, Value>,

    #[serde(default)]
    pub metadata: Option<ContextMetadata>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Under simulation the decision is made and audited normally, but
    /// the caller must not apply its effects.
    #[serde(default)]
    pub simulation_mode: bool,
}

impl EvaluationContext {
    /// Create a context for an agent/task pair. Fill in the rest with
    /// the builder methods.
    pub fn new(agent_id: impl Into<String>, task_name: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            task: TaskRef {
                id: None,
                name: task_name.into(),
                attributes: BTreeMap::new(),
            },
            payload: BTreeMap::new(),
            metadata: None,
            timestamp: Utc::now(),
            simulation_mode: false,
        }
    }

    /// Set a task attribute (`task.<key>`) and return self.
    pub fn with_task_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.task.attributes.insert(key.into(), value.into());
        self
    }

    /// Set a payload field (`payload.<key>`) and return self.
    pub fn with_payload_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Replace the whole payload from a JSON object and return self.
    pub fn with_payload_json(mut self, payload: serde_json::Value) -> Self {
        if let Value::Map(entries) = Value::from(payload) {
            self.payload = entries;
        }
        self
    }

    /// Set the metadata block and return self.
    pub fn with_metadata(mut self, metadata: ContextMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set the requesting role (shorthand for metadata) and return self.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.metadata.get_or_insert_with(Default::default).role = Some(role.into());
        self
    }

    /// Mark the context as simulation-mode and return self.
    pub fn with_simulation(mut self, simulation: bool) -> Self {
        self.simulation_mode = simulation;
        self
    }

    /// Flatten this context into the variable namespace conditions read.
    ///
    /// Keys: `agent.id`, `agent.role`, `task.id`, `task.name`,
    /// `task.<attribute>`, `payload.<field>` (nested maps dotted), and
    /// `context.timestamp` / `context.userRole` / `context.user` /
    /// `context.priority` / `context.retryCount` / `context.timeoutMs` /
    /// `context.simulationMode`.
    pub fn namespace(&self) -> Namespace {
        let mut vars = Namespace::new();

        vars.insert("agent.id".to_string(), Value::Str(self.agent_id.clone()));
        if let Some(id) = &self.task.id {
            vars.insert("task.id".to_string(), Value::Str(id.clone()));
        }
        vars.insert("task.name".to_string(), Value::Str(self.task.name.clone()));
        for (key, value) in &self.task.attributes {
            value.flatten_into(&format!("task.{}", key), &mut vars);
        }
        for (key, value) in &self.payload {
            value.flatten_into(&format!("payload.{}", key), &mut vars);
        }

        // Timestamps are RFC 3339 strings; lexicographic order is
        // chronological order for this format.
        vars.insert(
            "context.timestamp".to_string(),
            Value::Str(self.timestamp.to_rfc3339()),
        );
        vars.insert(
            "context.simulationMode".to_string(),
            Value::Bool(self.simulation_mode),
        );

        if let Some(meta) = &self.metadata {
            if let Some(role) = &meta.role {
                vars.insert("agent.role".to_string(), Value::Str(role.clone()));
                vars.insert("context.userRole".to_string(), Value::Str(role.clone()));
            }
            if let Some(user) = &meta.user {
                vars.insert("context.user".to_string(), Value::Str(user.clone()));
            }
            if let Some(priority) = meta.priority {
                vars.insert("context.priority".to_string(), Value::Num(priority as f64));
            }
            if let Some(retries) = meta.retry_count {
                vars.insert("context.retryCount".to_string(), Value::Num(retries as f64));
            }
            if let Some(timeout) = meta.timeout_ms {
                vars.insert("context.timeoutMs".to_string(), Value::Num(timeout as f64));
            }
        }

        vars
    }
}

/// A rule that evaluated true during a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggeredRule {
    pub rule_id: String,
    pub name: String,
    pub scope: RuleScope,
    pub priority: i64,
    pub effect: RuleEffect,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

/// A per-rule evaluation failure, degraded to non-triggering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvalError {
    pub rule_id: String,
    pub message: String,
}

/// The outcome of one evaluation. Produced exactly once, immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Whether the task may proceed.
    pub allowed: bool,

    /// Cites the deciding rule's name and scope, or states default-allow.
    pub reason: String,

    /// Every rule that evaluated true, in evaluation order.
    pub triggered_rules: Vec<TriggeredRule>,

    /// Union of triggered rules' action tags, first-seen order.
    pub applied_actions: Vec<RuleAction>,

    /// Rules whose conditions failed to evaluate (fail-closed).
    pub rule_errors: Vec<RuleEvalError>,

    /// Whether the active rule set carried conflict diagnostics at
    /// decision time.
    pub conflict_detected: Option<bool>,

    /// Echo of the context's simulation flag.
    pub simulation_mode: bool,

    pub timestamp: DateTime<Utc>,

    /// Measured wall-clock duration, milliseconds.
    pub duration_ms: f64,
}
