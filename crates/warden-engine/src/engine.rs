// engine.rs — The decision engine.
//
// `evaluate()` is the single chokepoint every proposed agent task flows
// through. It never fails: rule evaluation errors fail closed (the rule
// does not trigger, the error is recorded), and an audit append failure
// degrades observability, never enforcement.
//
// Decision combination is deny-overrides with first-match-by-order:
// the first triggered deny in evaluation order decides, no matter how
// many allows also triggered; with no triggered deny the decision is
// allow, and with no triggered rule at all it is default-allow — an
// absent policy set must not block traffic.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::Utc;
use warden_audit::{AuditAction, AuditLogEntry, AuditTrail};
use warden_policy::{validate_policy, Policy, PolicyError, PolicyStore, RuleAction, RuleEffect};

use crate::conflict::{ConflictDetector, ConflictInfo};
use crate::context::{EvaluationContext, EvaluationResult, RuleEvalError, TriggeredRule};
use crate::index::RuleIndex;

/// Evaluates proposed agent tasks against the active rule set.
pub struct DecisionEngine {
    index: RuleIndex,
    trail: Arc<AuditTrail>,
    /// Findings from the last conflict scan, republished on every
    /// policy change. Diagnostic only.
    conflicts: RwLock<Arc<Vec<ConflictInfo>>>,
}

impl DecisionEngine {
    /// Create an engine with an empty rule set, recording to `trail`.
    pub fn new(trail: Arc<AuditTrail>) -> Self {
        Self {
            index: RuleIndex::new(),
            trail,
            conflicts: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Admit a policy (validated first) or, when it is disabled, drop
    /// its rules. A policy whose rule ids collide with another already
    /// indexed policy is rejected. Triggers an index rebuild and a
    /// conflict re-scan.
    pub fn load_policy(&self, policy: &Policy) -> Result<(), PolicyError> {
        validate_policy(policy)?;
        if policy.enabled {
            self.index.add(policy)?;
        } else {
            self.index.remove(&policy.id);
        }
        self.rescan_conflicts();
        Ok(())
    }

    /// Rebuild the active rule set from a store's enabled policies.
    ///
    /// The store is the source of truth for policy mutations (each
    /// upsert/toggle validates and records a version); calling this
    /// after a mutation re-derives the index and re-scans conflicts in
    /// one step. Policies no longer enabled in the store drop out.
    pub fn sync_with_store(&self, store: &PolicyStore) -> Result<(), PolicyError> {
        self.index.rebuild_from(store.enabled())?;
        self.rescan_conflicts();
        Ok(())
    }

    /// Drop a policy's rules from the index.
    pub fn unload_policy(&self, policy_id: &str) {
        self.index.remove(policy_id);
        self.rescan_conflicts();
    }

    /// The latest conflict diagnostics, for operator tooling.
    pub fn conflicts(&self) -> Arc<Vec<ConflictInfo>> {
        let guard = self.conflicts.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// The rule index (read access, e.g. for listing the active set).
    pub fn index(&self) -> &RuleIndex {
        &self.index
    }

    /// Evaluate whether the context's task may proceed.
    ///
    /// Always returns a result; every internal failure is folded in.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> EvaluationResult {
        let started = Instant::now();
        let snapshot = self.index.rules_in_order();
        let vars = ctx.namespace();

        let mut triggered: Vec<TriggeredRule> = Vec::new();
        let mut rule_errors: Vec<RuleEvalError> = Vec::new();

        for indexed in snapshot.iter() {
            let expr = match &indexed.condition {
                Ok(expr) => expr,
                Err(parse_err) => {
                    // Admission validates conditions, so this is the
                    // defensive path: degrade to non-triggering.
                    rule_errors.push(RuleEvalError {
                        rule_id: indexed.rule.id.clone(),
                        message: parse_err.to_string(),
                    });
                    continue;
                }
            };
            match warden_expr::evaluate(expr, &vars) {
                Ok(true) => triggered.push(TriggeredRule {
                    rule_id: indexed.rule.id.clone(),
                    name: indexed.rule.name.clone(),
                    scope: indexed.rule.scope,
                    priority: indexed.rule.priority,
                    effect: indexed.rule.effect,
                    actions: indexed.rule.actions.clone(),
                }),
                Ok(false) => {}
                Err(eval_err) => {
                    // Fail closed: the rule does not trigger, the rest
                    // of the set still evaluates.
                    tracing::debug!(
                        rule_id = %indexed.rule.id,
                        error = %eval_err,
                        "rule condition failed to evaluate; treating as non-triggering"
                    );
                    rule_errors.push(RuleEvalError {
                        rule_id: indexed.rule.id.clone(),
                        message: eval_err.to_string(),
                    });
                }
            }
        }

        let deciding_deny = triggered.iter().find(|t| t.effect == RuleEffect::Deny);
        let (allowed, reason) = match (deciding_deny, triggered.first()) {
            (Some(deny), _) => (
                false,
                format!("denied by rule '{}' ({} scope)", deny.name, deny.scope),
            ),
            (None, Some(allow)) => (
                true,
                format!("allowed by rule '{}' ({} scope)", allow.name, allow.scope),
            ),
            (None, None) => (true, "no rule matched — default allow".to_string()),
        };

        // Union of action tags over every triggered rule, first-seen order.
        let mut applied_actions: Vec<RuleAction> = Vec::new();
        for t in &triggered {
            for action in &t.actions {
                if !applied_actions.contains(action) {
                    applied_actions.push(*action);
                }
            }
        }

        let conflicts = self.conflicts();
        let result = EvaluationResult {
            allowed,
            reason,
            triggered_rules: triggered,
            applied_actions,
            rule_errors,
            conflict_detected: Some(!conflicts.is_empty()),
            simulation_mode: ctx.simulation_mode,
            timestamp: Utc::now(),
            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
        };

        self.record(ctx, &result);
        result
    }

    fn rescan_conflicts(&self) {
        let findings = ConflictDetector::scan(&self.index.rules_in_order());
        if !findings.is_empty() {
            tracing::warn!(count = findings.len(), "conflict scan flagged rule pairs");
        }
        let mut guard = self.conflicts.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(findings);
    }

    /// Append the decision to the audit trail. A failure here costs
    /// observability, never the decision itself.
    fn record(&self, ctx: &EvaluationContext, result: &EvaluationResult) {
        let action = if result.allowed {
            AuditAction::Allowed
        } else if result.applied_actions.contains(&RuleAction::Override) {
            AuditAction::Overridden
        } else {
            AuditAction::Denied
        };

        let mut entry = AuditLogEntry::new(&ctx.agent_id, action)
            .with_task(ctx.task.id.clone().unwrap_or_else(|| ctx.task.name.clone()))
            .with_triggered_rules(
                result
                    .triggered_rules
                    .iter()
                    .map(|t| t.rule_id.clone())
                    .collect(),
            )
            .with_applied_actions(
                result
                    .applied_actions
                    .iter()
                    .map(|a| a.to_string())
                    .collect(),
            )
            .with_result(result.reason.clone())
            .with_duration_ms(result.duration_ms)
            .with_simulation(ctx.simulation_mode);

        if let Ok(payload) = serde_json::to_value(&ctx.payload) {
            if !ctx.payload.is_empty() {
                entry = entry.with_payload(payload);
            }
        }
        if !result.rule_errors.is_empty() {
            let joined = result
                .rule_errors
                .iter()
                .map(|e| format!("rule '{}': {}", e.rule_id, e.message))
                .collect::<Vec<_>>()
                .join("; ");
            entry = entry.with_error(joined);
        }
        if let Some(user) = ctx.metadata.as_ref().and_then(|m| m.user.clone()) {
            entry = entry.with_user(user);
        }

        if let Err(e) = self.trail.append(entry) {
            tracing::error!("audit append failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_policy::Rule;

    fn engine() -> DecisionEngine {
        DecisionEngine::new(Arc::new(AuditTrail::with_capacity(1000)))
    }

    fn deny(id: &str, condition: &str) -> Rule {
        Rule::new(id, format!("rule {}", id), RuleEffect::Deny, condition)
    }

    fn allow(id: &str, condition: &str) -> Rule {
        Rule::new(id, format!("rule {}", id), RuleEffect::Allow, condition)
    }

    #[test]
    fn empty_rule_set_defaults_to_allow() {
        let engine = engine();
        let result = engine.evaluate(&EvaluationContext::new("a1", "anything"));

        assert!(result.allowed);
        assert!(result.reason.contains("default allow"));
        assert!(result.triggered_rules.is_empty());
    }

    #[test]
    fn deny_overrides_any_number_of_allows() {
        let engine = engine();
        engine
            .load_policy(&Policy::new(
                "p1",
                "p1",
                vec![
                    allow("a1", "true").with_priority(100),
                    allow("a2", "true").with_priority(90),
                    deny("d1", "true").with_priority(1),
                ],
            ))
            .unwrap();

        let result = engine.evaluate(&EvaluationContext::new("a1", "t"));
        assert!(!result.allowed);
        assert!(result.reason.contains("rule d1"));
        // All three triggered; the deny decided.
        assert_eq!(result.triggered_rules.len(), 3);
    }

    #[test]
    fn low_priority_deny_still_denies_guest_reads() {
        // Ordering determines trigger-check order, not which triggered
        // rule wins: the higher-priority allow triggers first, the
        // lower-priority deny still decides.
        let engine = engine();
        engine
            .load_policy(&Policy::new(
                "p1",
                "p1",
                vec![
                    allow("a", r#"task.action == "read""#).with_priority(10),
                    deny("b", r#"task.action == "read" && agent.role == "guest""#)
                        .with_priority(5),
                ],
            ))
            .unwrap();

        let ctx = EvaluationContext::new("a1", "read_doc")
            .with_task_attr("action", "read")
            .with_role("guest");
        let result = engine.evaluate(&ctx);

        assert!(!result.allowed);
        assert_eq!(result.triggered_rules.len(), 2);
        // The conflict scan flagged the pair, independently of the decision.
        assert_eq!(result.conflict_detected, Some(true));
    }

    #[test]
    fn missing_payload_field_fails_closed() {
        let engine = engine();
        engine
            .load_policy(&Policy::new(
                "p1",
                "p1",
                vec![deny("d1", "payload.amount > 10000")],
            ))
            .unwrap();

        // No payload at all — the rule must not trigger, and must not
        // abort the evaluation.
        let result = engine.evaluate(&EvaluationContext::new("a1", "t"));
        assert!(result.allowed);
        assert_eq!(result.rule_errors.len(), 1);
        assert_eq!(result.rule_errors[0].rule_id, "d1");
    }

    #[test]
    fn failed_rule_does_not_stop_later_rules() {
        let engine = engine();
        engine
            .load_policy(&Policy::new(
                "p1",
                "p1",
                vec![
                    deny("broken", "payload.missing > 1").with_priority(10),
                    deny("works", r#"agent.id == "a1""#).with_priority(5),
                ],
            ))
            .unwrap();

        let result = engine.evaluate(&EvaluationContext::new("a1", "t"));
        assert!(!result.allowed);
        assert_eq!(result.triggered_rules[0].rule_id, "works");
        assert_eq!(result.rule_errors[0].rule_id, "broken");
    }

    #[test]
    fn repeated_evaluation_is_identical_modulo_timing() {
        let engine = engine();
        engine
            .load_policy(&Policy::new(
                "p1",
                "p1",
                vec![deny("d1", "payload.amount > 10000"), allow("a1", "true")],
            ))
            .unwrap();

        let ctx = EvaluationContext::new("a1", "transfer")
            .with_payload_field("amount", 50000.0);
        let first = engine.evaluate(&ctx);
        let second = engine.evaluate(&ctx);

        assert_eq!(first.allowed, second.allowed);
        assert_eq!(first.reason, second.reason);
        assert_eq!(first.triggered_rules, second.triggered_rules);
        assert_eq!(first.applied_actions, second.applied_actions);
        assert_eq!(first.rule_errors, second.rule_errors);
    }

    #[test]
    fn actions_union_preserves_first_seen_order() {
        let engine = engine();
        engine
            .load_policy(&Policy::new(
                "p1",
                "p1",
                vec![
                    allow("a1", "true")
                        .with_priority(10)
                        .with_actions(vec![RuleAction::Notify, RuleAction::Log]),
                    deny("d1", "true")
                        .with_priority(5)
                        .with_actions(vec![RuleAction::Log, RuleAction::Override]),
                ],
            ))
            .unwrap();

        let result = engine.evaluate(&EvaluationContext::new("a1", "t"));
        assert_eq!(
            result.applied_actions,
            vec![RuleAction::Notify, RuleAction::Log, RuleAction::Override]
        );
    }

    #[test]
    fn simulation_mode_is_echoed_and_audited() {
        let trail = Arc::new(AuditTrail::with_capacity(100));
        let engine = DecisionEngine::new(Arc::clone(&trail));
        engine
            .load_policy(&Policy::new("p1", "p1", vec![deny("d1", "true")]))
            .unwrap();

        let ctx = EvaluationContext::new("a1", "t").with_simulation(true);
        let result = engine.evaluate(&ctx);

        assert!(!result.allowed);
        assert!(result.simulation_mode);
        let recent = trail.recent(1);
        assert!(recent[0].simulation);
    }

    #[test]
    fn disabled_policy_contributes_no_rules() {
        let engine = engine();
        let mut policy = Policy::new("p1", "p1", vec![deny("d1", "true")]);
        engine.load_policy(&policy).unwrap();
        assert!(!engine.evaluate(&EvaluationContext::new("a1", "t")).allowed);

        policy.enabled = false;
        engine.load_policy(&policy).unwrap();
        assert!(engine.evaluate(&EvaluationContext::new("a1", "t")).allowed);
    }

    #[test]
    fn invalid_policy_is_rejected_and_index_unchanged() {
        let engine = engine();
        let result = engine.load_policy(&Policy::new(
            "p1",
            "p1",
            vec![deny("d1", "payload.amount >")],
        ));
        assert!(result.is_err());
        assert!(engine.index().is_empty());
    }

    #[test]
    fn colliding_rule_id_across_policies_is_rejected() {
        let engine = engine();
        engine
            .load_policy(&Policy::new("p1", "p1", vec![allow("shared-id", "true")]))
            .unwrap();

        let result =
            engine.load_policy(&Policy::new("p2", "p2", vec![deny("shared-id", "true")]));

        match result {
            Err(PolicyError::DuplicateRuleId { policy_id, rule_id }) => {
                assert_eq!(policy_id, "p2");
                assert_eq!(rule_id, "shared-id");
            }
            other => panic!("expected DuplicateRuleId, got {:?}", other),
        }
        // Only p1's rule is active; the decision is unambiguous.
        assert_eq!(engine.index().len(), 1);
        let result = engine.evaluate(&EvaluationContext::new("a1", "t"));
        assert!(result.allowed);
        assert_eq!(result.triggered_rules.len(), 1);
    }

    #[test]
    fn store_mutations_flow_into_the_index() {
        let engine = engine();
        let mut store = PolicyStore::new();
        store
            .upsert(Policy::new("p1", "p1", vec![deny("d1", "true")]))
            .unwrap();
        engine.sync_with_store(&store).unwrap();
        assert!(!engine.evaluate(&EvaluationContext::new("a1", "t")).allowed);

        // Disabling through the store records a version and, once
        // synced, drops the policy from the active set.
        store.set_enabled("p1", false).unwrap();
        engine.sync_with_store(&store).unwrap();
        assert!(engine.evaluate(&EvaluationContext::new("a1", "t")).allowed);
        assert_eq!(store.version_history("p1").len(), 2);

        // Removal drops it entirely on the next sync.
        store.set_enabled("p1", true).unwrap();
        engine.sync_with_store(&store).unwrap();
        store.remove("p1").unwrap();
        engine.sync_with_store(&store).unwrap();
        assert!(engine.index().is_empty());
    }

    #[test]
    fn override_action_marks_audit_entry_overridden() {
        let trail = Arc::new(AuditTrail::with_capacity(100));
        let engine = DecisionEngine::new(Arc::clone(&trail));
        engine
            .load_policy(&Policy::new(
                "p1",
                "p1",
                vec![deny("d1", "true").with_actions(vec![RuleAction::Override])],
            ))
            .unwrap();

        engine.evaluate(&EvaluationContext::new("a1", "t"));
        assert_eq!(trail.recent(1)[0].action, AuditAction::Overridden);
    }
}
