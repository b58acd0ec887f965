// policy.rs — Versioned, togglable containers of rules.
//
// A Policy is the unit operators manage: it is enabled or disabled as a
// whole, and every edit produces a PolicyVersion snapshot retained for
// rollback and audit. Validation happens here, before a policy can
// reach the rule index — a broken condition is rejected at save time,
// not discovered mid-evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PolicyError;
use crate::rule::Rule;

/// A named, versioned collection of rules, togglable as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Identifier, unique within the store.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// The rules, in authoring order.
    pub rules: Vec<Rule>,

    /// Operator-facing version string (e.g. "1.2.0").
    #[serde(default = "default_version")]
    pub version: String,

    /// Disabled policies contribute no rules to the index.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_version() -> String {
    "1".to_string()
}

fn default_enabled() -> bool {
    true
}

impl Policy {
    /// Create an enabled policy with the given rules.
    pub fn new(id: impl Into<String>, name: impl Into<String>, rules: Vec<Rule>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            rules,
            version: default_version(),
            enabled: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// An immutable snapshot of a policy at one point in its edit history.
///
/// Snapshots are append-only per policy. They never participate in
/// evaluation — only the current enabled rule set is live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyVersion {
    /// Unique id of this snapshot.
    pub version_id: Uuid,

    /// The policy this snapshot belongs to.
    pub policy_id: String,

    /// The operator-facing version string at snapshot time.
    pub version: String,

    /// The full rule set at snapshot time.
    pub rules: Vec<Rule>,

    /// Whether the policy was enabled at snapshot time.
    pub enabled: bool,

    pub created_at: DateTime<Utc>,
}

impl PolicyVersion {
    /// Snapshot the current state of a policy.
    pub fn snapshot(policy: &Policy) -> Self {
        Self {
            version_id: Uuid::new_v4(),
            policy_id: policy.id.clone(),
            version: policy.version.clone(),
            rules: policy.rules.clone(),
            enabled: policy.enabled,
            created_at: Utc::now(),
        }
    }
}

/// Validate a policy for admission: required fields present, rule ids
/// unique, every condition parseable under the closed grammar.
///
/// A policy that fails validation must never reach the rule index.
pub fn validate_policy(policy: &Policy) -> Result<(), PolicyError> {
    if policy.id.trim().is_empty() {
        return Err(PolicyError::Validation {
            policy_id: policy.id.clone(),
            message: "policy id must not be empty".to_string(),
        });
    }
    if policy.name.trim().is_empty() {
        return Err(PolicyError::Validation {
            policy_id: policy.id.clone(),
            message: "policy name must not be empty".to_string(),
        });
    }

    let mut seen = std::collections::BTreeSet::new();
    for rule in &policy.rules {
        if rule.id.trim().is_empty() {
            return Err(PolicyError::Validation {
                policy_id: policy.id.clone(),
                message: "rule id must not be empty".to_string(),
            });
        }
        if !seen.insert(rule.id.as_str()) {
            return Err(PolicyError::DuplicateRuleId {
                policy_id: policy.id.clone(),
                rule_id: rule.id.clone(),
            });
        }
        if rule.condition.trim().is_empty() {
            return Err(PolicyError::Validation {
                policy_id: policy.id.clone(),
                message: format!("rule '{}' has an empty condition", rule.id),
            });
        }
        warden_expr::parse(&rule.condition).map_err(|source| PolicyError::Condition {
            rule_id: rule.id.clone(),
            source,
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleEffect;

    fn rule(id: &str, condition: &str) -> Rule {
        Rule::new(id, format!("rule {}", id), RuleEffect::Deny, condition)
    }

    #[test]
    fn valid_policy_passes() {
        let policy = Policy::new(
            "p1",
            "Payments guard",
            vec![rule("r1", "payload.amount > 10000"), rule("r2", "agent.role == \"guest\"")],
        );
        assert!(validate_policy(&policy).is_ok());
    }

    #[test]
    fn duplicate_rule_ids_rejected() {
        let policy = Policy::new("p1", "p", vec![rule("r1", "true"), rule("r1", "false")]);
        match validate_policy(&policy).unwrap_err() {
            PolicyError::DuplicateRuleId { rule_id, .. } => assert_eq!(rule_id, "r1"),
            other => panic!("expected DuplicateRuleId, got {:?}", other),
        }
    }

    #[test]
    fn empty_condition_rejected() {
        let policy = Policy::new("p1", "p", vec![rule("r1", "   ")]);
        assert!(matches!(
            validate_policy(&policy),
            Err(PolicyError::Validation { .. })
        ));
    }

    #[test]
    fn unparseable_condition_rejected() {
        let policy = Policy::new("p1", "p", vec![rule("r1", "payload.amount >")]);
        match validate_policy(&policy).unwrap_err() {
            PolicyError::Condition { rule_id, .. } => assert_eq!(rule_id, "r1"),
            other => panic!("expected Condition, got {:?}", other),
        }
    }

    #[test]
    fn empty_policy_id_rejected() {
        let policy = Policy::new("", "p", vec![]);
        assert!(matches!(
            validate_policy(&policy),
            Err(PolicyError::Validation { .. })
        ));
    }

    #[test]
    fn snapshot_captures_rules_and_version() {
        let mut policy = Policy::new("p1", "p", vec![rule("r1", "true")]);
        policy.version = "2.1".to_string();
        let snapshot = PolicyVersion::snapshot(&policy);
        assert_eq!(snapshot.policy_id, "p1");
        assert_eq!(snapshot.version, "2.1");
        assert_eq!(snapshot.rules.len(), 1);
    }

    #[test]
    fn policy_yaml_defaults() {
        // Policy documents may omit version/enabled/timestamps.
        let json = r#"{
            "id": "p1", "name": "Guard",
            "rules": [{
                "id": "r1", "name": "big", "scope": "global",
                "priority": 1, "effect": "deny",
                "condition": "payload.amount > 10000"
            }]
        }"#;
        let policy: Policy = serde_json::from_str(json).unwrap();
        assert!(policy.enabled);
        assert_eq!(policy.version, "1");
    }
}
