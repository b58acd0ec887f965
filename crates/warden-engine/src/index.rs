// index.rs — The live rule set, kept in evaluation order.
//
// The index is a derived projection of the enabled policies. It is a
// multiple-readers/single-writer resource: readers take an immutable
// Arc snapshot and are never exposed to a partially rebuilt set —
// every mutation builds a complete new snapshot and swaps it in, while
// in-flight evaluations keep whatever snapshot they already hold.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use warden_expr::{Expr, ExprError};
use warden_policy::{Policy, PolicyError, Rule};

/// A rule admitted to the index, with its pre-parsed condition and its
/// insertion sequence number (the stable tie-break).
#[derive(Debug, Clone)]
pub struct IndexedRule {
    pub rule: Rule,
    /// The policy that contributed this rule.
    pub policy_id: String,
    /// Parsed at admission. Policies are validated at save time, so this
    /// is normally Ok; a stored Err degrades the rule to non-triggering
    /// at evaluation time instead of failing the decision.
    pub condition: Result<Expr, ExprError>,
    seq: u64,
}

struct IndexState {
    /// Rules grouped by contributing policy, seq-stamped at admission.
    policies: BTreeMap<String, Vec<IndexedRule>>,
    /// The published evaluation-order snapshot.
    snapshot: Arc<Vec<IndexedRule>>,
    next_seq: u64,
}

/// Holds all rules belonging to enabled policies, sorted by evaluation
/// order: scope specificity descending, priority descending, insertion
/// sequence ascending.
pub struct RuleIndex {
    state: RwLock<IndexState>,
}

impl RuleIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(IndexState {
                policies: BTreeMap::new(),
                snapshot: Arc::new(Vec::new()),
                next_seq: 0,
            }),
        }
    }

    /// Admit (or replace) a policy's rules and republish the snapshot.
    ///
    /// Rule ids must be unique across the whole active set, not just
    /// within one policy: triggered-rule ids, per-rule violation
    /// tallies, and conflict reports are all keyed by rule id. A
    /// colliding policy is rejected and the index is unchanged.
    ///
    /// The whole policy becomes visible in one swap — a concurrent
    /// reader sees either none of it or all of it.
    pub fn add(&self, policy: &Policy) -> Result<(), PolicyError> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        for rule in &policy.rules {
            let taken = state
                .policies
                .iter()
                .filter(|(id, _)| id.as_str() != policy.id)
                .flat_map(|(_, rules)| rules.iter())
                .any(|ir| ir.rule.id == rule.id);
            if taken {
                return Err(PolicyError::DuplicateRuleId {
                    policy_id: policy.id.clone(),
                    rule_id: rule.id.clone(),
                });
            }
        }
        let entries = policy
            .rules
            .iter()
            .map(|rule| {
                let seq = state.next_seq;
                state.next_seq += 1;
                IndexedRule {
                    rule: rule.clone(),
                    policy_id: policy.id.clone(),
                    condition: warden_expr::parse(&rule.condition),
                    seq,
                }
            })
            .collect();
        state.policies.insert(policy.id.clone(), entries);
        Self::republish(&mut state);
        tracing::debug!(policy_id = %policy.id, total_rules = state.snapshot.len(), "rule index rebuilt");
        Ok(())
    }

    /// Replace the entire index with the given policies in one swap.
    ///
    /// This is the store-driven rebuild path: policies absent from the
    /// iterator drop out, and the same cross-policy rule-id uniqueness
    /// applies. On error the previous snapshot stays published.
    pub fn rebuild_from<'a>(
        &self,
        policies: impl IntoIterator<Item = &'a Policy>,
    ) -> Result<(), PolicyError> {
        let mut grouped: BTreeMap<String, Vec<IndexedRule>> = BTreeMap::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut next_seq = 0u64;
        for policy in policies {
            let mut entries = Vec::with_capacity(policy.rules.len());
            for rule in &policy.rules {
                if !seen.insert(rule.id.clone()) {
                    return Err(PolicyError::DuplicateRuleId {
                        policy_id: policy.id.clone(),
                        rule_id: rule.id.clone(),
                    });
                }
                entries.push(IndexedRule {
                    rule: rule.clone(),
                    policy_id: policy.id.clone(),
                    condition: warden_expr::parse(&rule.condition),
                    seq: next_seq,
                });
                next_seq += 1;
            }
            grouped.insert(policy.id.clone(), entries);
        }

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.policies = grouped;
        state.next_seq = next_seq;
        Self::republish(&mut state);
        tracing::debug!(total_rules = state.snapshot.len(), "rule index rebuilt");
        Ok(())
    }

    /// Drop a policy's rules and republish the snapshot. The removal is
    /// atomic — no reader ever sees a half-disabled policy.
    pub fn remove(&self, policy_id: &str) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.policies.remove(policy_id).is_some() {
            Self::republish(&mut state);
            tracing::debug!(policy_id = %policy_id, total_rules = state.snapshot.len(), "rule index rebuilt");
        }
    }

    /// The current evaluation-order snapshot.
    ///
    /// Cheap (one Arc clone); the returned snapshot stays valid and
    /// unchanged for as long as the caller holds it, regardless of
    /// concurrent rebuilds.
    pub fn rules_in_order(&self) -> Arc<Vec<IndexedRule>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&state.snapshot)
    }

    /// Number of rules currently admitted.
    pub fn len(&self) -> usize {
        self.rules_in_order().len()
    }

    /// Whether the index holds no rules.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn republish(state: &mut IndexState) {
        let mut all: Vec<IndexedRule> = state
            .policies
            .values()
            .flat_map(|rules| rules.iter().cloned())
            .collect();
        all.sort_by_key(|ir| {
            (
                Reverse(ir.rule.scope.specificity()),
                Reverse(ir.rule.priority),
                ir.seq,
            )
        });
        state.snapshot = Arc::new(all);
    }
}

impl Default for RuleIndex {
    fn default() -> Self {
        Self::new()
    }
}
