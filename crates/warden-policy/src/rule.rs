// rule.rs — The atomic policy unit.
//
// A Rule is an allow/deny directive with a scope, a priority, and a
// boolean condition string. Scope and priority determine evaluation
// order in the rule index; the condition decides whether the rule
// triggers for a given context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The breadth at which a rule applies.
///
/// Scope is the primary evaluation-order key: more specific scopes are
/// checked first (`task` > `agent` > `global`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    /// Applies to every evaluation.
    Global,
    /// Applies at the granularity of an agent.
    Agent,
    /// Applies at the granularity of a single task.
    Task,
}

impl RuleScope {
    /// Ordering weight — higher is more specific and evaluated first.
    pub fn specificity(&self) -> u8 {
        match self {
            RuleScope::Global => 0,
            RuleScope::Agent => 1,
            RuleScope::Task => 2,
        }
    }
}

impl std::fmt::Display for RuleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleScope::Global => write!(f, "global"),
            RuleScope::Agent => write!(f, "agent"),
            RuleScope::Task => write!(f, "task"),
        }
    }
}

/// What a triggered rule decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleEffect {
    Allow,
    Deny,
}

impl std::fmt::Display for RuleEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleEffect::Allow => write!(f, "allow"),
            RuleEffect::Deny => write!(f, "deny"),
        }
    }
}

/// Side-effect tags a triggered rule requests from the caller.
///
/// The engine collects these; applying them (writing a log line, paging
/// someone, overriding a queue) is the caller's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Log,
    Notify,
    Override,
}

impl std::fmt::Display for RuleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleAction::Log => write!(f, "log"),
            RuleAction::Notify => write!(f, "notify"),
            RuleAction::Override => write!(f, "override"),
        }
    }
}

/// An atomic allow/deny directive within a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Identifier, unique within the active rule set.
    pub id: String,

    /// Human-readable name, cited in decision reasons.
    pub name: String,

    /// Breadth at which this rule applies.
    pub scope: RuleScope,

    /// Higher priority is evaluated first within a scope.
    pub priority: i64,

    /// What triggering this rule decides.
    pub effect: RuleEffect,

    /// Boolean condition in the closed expression grammar.
    pub condition: String,

    /// Side-effect tags collected when the rule triggers.
    #[serde(default)]
    pub actions: Vec<RuleAction>,

    /// Free-form operator tags.
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Create a global, priority-0 rule. Adjust with the builder methods.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        effect: RuleEffect,
        condition: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            scope: RuleScope::Global,
            priority: 0,
            effect,
            condition: condition.into(),
            actions: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the scope and return self (builder pattern).
    pub fn with_scope(mut self, scope: RuleScope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the priority and return self.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Set the action tags and return self.
    pub fn with_actions(mut self, actions: Vec<RuleAction>) -> Self {
        self.actions = actions;
        self
    }

    /// Set the operator tags and return self.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}
