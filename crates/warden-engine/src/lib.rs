//! # warden-engine
//!
//! The decisioning core of Warden: holds the live rule set, evaluates
//! whether an agent's proposed task may proceed, and records every
//! decision in the audit trail.
//!
//! - [`RuleIndex`] — the rules of all enabled policies, kept in
//!   evaluation order (scope specificity, then priority, then insertion
//!   order), republished atomically on every policy change.
//! - [`DecisionEngine`] — walks the index for a given
//!   [`EvaluationContext`], combines triggered rules under
//!   deny-overrides semantics, and appends an audit entry.
//! - [`ConflictDetector`] — static pairwise analysis of the active rule
//!   set, surfaced for operators; never alters a live decision.
//!
//! ## Key invariants
//!
//! - **`evaluate()` always returns a result**: a rule whose condition
//!   fails to evaluate is treated as non-triggering, recorded as a
//!   diagnostic, and the remaining rules still run.
//! - **Deny-overrides**: any triggered deny wins over any number of
//!   triggered allows, regardless of ordering.
//! - **Default allow**: an empty rule set never blocks traffic.

pub mod conflict;
pub mod context;
pub mod engine;
pub mod index;

pub use conflict::{ConflictDetector, ConflictInfo, ConflictKind, ConflictSeverity};
pub use context::{ContextMetadata, EvaluationContext, EvaluationResult, RuleEvalError, TaskRef, TriggeredRule};
pub use engine::DecisionEngine;
pub use index::{IndexedRule, RuleIndex};
