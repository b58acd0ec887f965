// store.rs — In-memory policy store with append-only version history.
//
// The store is the source of truth for policies; the rule index is a
// derived projection rebuilt from it. Every successful mutation records
// a PolicyVersion snapshot, so any past state can be inspected or
// rolled back to. The store itself is a plain struct — embedding code
// wraps it in whatever synchronization it needs.

use std::collections::BTreeMap;

use crate::error::PolicyError;
use crate::policy::{validate_policy, Policy, PolicyVersion};

/// In-memory policy registry with per-policy edit history.
#[derive(Debug, Default)]
pub struct PolicyStore {
    policies: BTreeMap<String, Policy>,
    history: BTreeMap<String, Vec<PolicyVersion>>,
}

impl PolicyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a policy.
    ///
    /// The policy is validated first; on failure the store is unchanged.
    /// On success a version snapshot is appended to the policy's history
    /// and returned.
    pub fn upsert(&mut self, mut policy: Policy) -> Result<PolicyVersion, PolicyError> {
        validate_policy(&policy)?;
        policy.updated_at = chrono::Utc::now();
        let snapshot = PolicyVersion::snapshot(&policy);
        tracing::debug!(
            policy_id = %policy.id,
            version = %policy.version,
            rules = policy.rules.len(),
            "policy upserted"
        );
        self.history
            .entry(policy.id.clone())
            .or_default()
            .push(snapshot.clone());
        self.policies.insert(policy.id.clone(), policy);
        Ok(snapshot)
    }

    /// Remove a policy entirely. Its version history is retained.
    pub fn remove(&mut self, policy_id: &str) -> Result<Policy, PolicyError> {
        self.policies
            .remove(policy_id)
            .ok_or_else(|| PolicyError::UnknownPolicy {
                policy_id: policy_id.to_string(),
            })
    }

    /// Enable or disable a policy as a unit. Records a version snapshot.
    pub fn set_enabled(&mut self, policy_id: &str, enabled: bool) -> Result<&Policy, PolicyError> {
        let policy = self
            .policies
            .get_mut(policy_id)
            .ok_or_else(|| PolicyError::UnknownPolicy {
                policy_id: policy_id.to_string(),
            })?;
        policy.enabled = enabled;
        policy.updated_at = chrono::Utc::now();
        let snapshot = PolicyVersion::snapshot(policy);
        self.history
            .entry(policy_id.to_string())
            .or_default()
            .push(snapshot);
        Ok(&self.policies[policy_id])
    }

    /// Look up a policy by id.
    pub fn get(&self, policy_id: &str) -> Option<&Policy> {
        self.policies.get(policy_id)
    }

    /// All policies, enabled or not, in id order.
    pub fn list(&self) -> impl Iterator<Item = &Policy> {
        self.policies.values()
    }

    /// Only the enabled policies, in id order.
    pub fn enabled(&self) -> impl Iterator<Item = &Policy> {
        self.policies.values().filter(|p| p.enabled)
    }

    /// The append-only snapshot history for a policy (oldest first).
    ///
    /// History survives removal of the policy itself.
    pub fn version_history(&self, policy_id: &str) -> &[PolicyVersion] {
        self.history
            .get(policy_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{Rule, RuleEffect};

    fn policy(id: &str, condition: &str) -> Policy {
        Policy::new(
            id,
            format!("policy {}", id),
            vec![Rule::new("r1", "rule", RuleEffect::Deny, condition)],
        )
    }

    #[test]
    fn upsert_then_get() {
        let mut store = PolicyStore::new();
        store.upsert(policy("p1", "payload.amount > 10000")).unwrap();
        assert!(store.get("p1").is_some());
        assert_eq!(store.list().count(), 1);
    }

    #[test]
    fn invalid_policy_leaves_store_unchanged() {
        let mut store = PolicyStore::new();
        let result = store.upsert(policy("p1", "payload.amount >"));
        assert!(result.is_err());
        assert!(store.get("p1").is_none());
        assert!(store.version_history("p1").is_empty());
    }

    #[test]
    fn each_upsert_appends_history() {
        let mut store = PolicyStore::new();
        let mut p = policy("p1", "true");
        store.upsert(p.clone()).unwrap();
        p.version = "2".to_string();
        store.upsert(p).unwrap();

        let history = store.version_history("p1");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version, "1");
        assert_eq!(history[1].version, "2");
        // Snapshots are distinct records.
        assert_ne!(history[0].version_id, history[1].version_id);
    }

    #[test]
    fn disable_hides_from_enabled_listing() {
        let mut store = PolicyStore::new();
        store.upsert(policy("p1", "true")).unwrap();
        store.set_enabled("p1", false).unwrap();

        assert_eq!(store.enabled().count(), 0);
        assert_eq!(store.list().count(), 1);
        // The toggle is itself a recorded edit.
        assert_eq!(store.version_history("p1").len(), 2);
    }

    #[test]
    fn remove_keeps_history() {
        let mut store = PolicyStore::new();
        store.upsert(policy("p1", "true")).unwrap();
        store.remove("p1").unwrap();
        assert!(store.get("p1").is_none());
        assert_eq!(store.version_history("p1").len(), 1);
    }

    #[test]
    fn remove_unknown_policy_errors() {
        let mut store = PolicyStore::new();
        assert!(matches!(
            store.remove("nope"),
            Err(PolicyError::UnknownPolicy { .. })
        ));
    }
}
