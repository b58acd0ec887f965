// conflict.rs — Static conflict analysis over the active rule set.
//
// Runs whenever the rule set changes, independent of any single
// evaluation. Purely diagnostic: its findings are surfaced to operators
// and never alter which rules evaluate during decisioning.
//
// The analysis is AST-structural. Two conditions are "equivalent" when
// their parse trees are equal; one is a "strict superset" of another
// when its &&-conjunct set strictly contains the other's. This is
// conservative — it reports the clear cases and stays silent on
// anything requiring satisfiability reasoning.

use serde::{Deserialize, Serialize};
use warden_expr::Expr;
use warden_policy::{RuleEffect, RuleScope};

use crate::index::IndexedRule;

/// The kind of relationship flagged between two rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    /// Both rules can trigger together but declare different effects.
    OpposingEffects,
    /// Same effect, structurally equivalent conditions — redundant rule.
    OverlappingConditions,
    /// A lower-priority deny is strictly narrower than a higher-priority
    /// allow — a likely misconfiguration worth reviewing.
    PriorityInversion,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::OpposingEffects => write!(f, "opposing-effects"),
            ConflictKind::OverlappingConditions => write!(f, "overlapping-conditions"),
            ConflictKind::PriorityInversion => write!(f, "priority-inversion"),
        }
    }
}

/// How urgently an operator should look at a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    Warning,
    Critical,
}

/// A diagnostic about a pair of rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictInfo {
    /// Rule earlier in evaluation order.
    pub first_rule: String,
    /// Rule later in evaluation order.
    pub second_rule: String,
    pub kind: ConflictKind,
    pub severity: ConflictSeverity,
    /// Human-readable explanation for operator tooling.
    pub detail: String,
}

/// Pairwise static analyzer for the active rule set.
pub struct ConflictDetector;

impl ConflictDetector {
    /// Scan a rule slice (in evaluation order) for conflicts.
    pub fn scan(rules: &[IndexedRule]) -> Vec<ConflictInfo> {
        let mut findings = Vec::new();

        for i in 0..rules.len() {
            for j in (i + 1)..rules.len() {
                let earlier = &rules[i];
                let later = &rules[j];
                if !scopes_overlap(earlier.rule.scope, later.rule.scope) {
                    continue;
                }
                // Rules with unparseable conditions are already surfaced
                // through per-rule evaluation errors; skip them here.
                let (Ok(first), Ok(second)) = (&earlier.condition, &later.condition) else {
                    continue;
                };

                if let Some(finding) = Self::check_pair(earlier, first, later, second) {
                    findings.push(finding);
                }
            }
        }

        findings
    }

    fn check_pair(
        earlier: &IndexedRule,
        first: &Expr,
        later: &IndexedRule,
        second: &Expr,
    ) -> Option<ConflictInfo> {
        let pair = |kind, severity, detail| {
            Some(ConflictInfo {
                first_rule: earlier.rule.id.clone(),
                second_rule: later.rule.id.clone(),
                kind,
                severity,
                detail,
            })
        };

        if first == second {
            return if earlier.rule.effect != later.rule.effect {
                pair(
                    ConflictKind::OpposingEffects,
                    ConflictSeverity::Critical,
                    format!(
                        "rules '{}' ({}) and '{}' ({}) share an equivalent condition but declare opposite effects",
                        earlier.rule.name, earlier.rule.effect, later.rule.name, later.rule.effect
                    ),
                )
            } else {
                pair(
                    ConflictKind::OverlappingConditions,
                    ConflictSeverity::Warning,
                    format!(
                        "rule '{}' duplicates the condition of '{}' with the same effect",
                        later.rule.name, earlier.rule.name
                    ),
                )
            };
        }

        // A deny that sits after an allow in evaluation order but whose
        // condition strictly narrows the allow's: it can only fire on
        // contexts the allow already matched first.
        if earlier.rule.effect == RuleEffect::Allow
            && later.rule.effect == RuleEffect::Deny
            && is_strict_conjunct_superset(second, first)
        {
            return pair(
                ConflictKind::PriorityInversion,
                ConflictSeverity::Warning,
                format!(
                    "deny rule '{}' narrows allow rule '{}' but is evaluated after it",
                    later.rule.name, earlier.rule.name
                ),
            );
        }

        None
    }
}

/// Scopes overlap when equal, or when either applies globally. Agent
/// and task scopes are treated as orthogonal axes and skipped.
fn scopes_overlap(a: RuleScope, b: RuleScope) -> bool {
    a == b || a == RuleScope::Global || b == RuleScope::Global
}

/// Whether `sup`'s &&-conjunct set strictly contains `sub`'s.
fn is_strict_conjunct_superset(sup: &Expr, sub: &Expr) -> bool {
    let sup_parts = sup.conjuncts();
    let sub_parts = sub.conjuncts();
    sup_parts.len() > sub_parts.len()
        && sub_parts
            .iter()
            .all(|part| sup_parts.iter().any(|candidate| candidate == part))
}
