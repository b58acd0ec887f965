//! # warden-policy
//!
//! The policy data model for Warden: [`Rule`]s grouped into versioned,
//! togglable [`Policy`] containers, plus the [`PolicyStore`] that is the
//! source of truth for what is enabled.
//!
//! ## Key invariants
//!
//! - **Validated before admitted**: a policy with a duplicate rule id or a
//!   condition that does not parse is rejected at save time — it never
//!   reaches the rule index with a broken condition.
//! - **Append-only history**: every successful upsert records a
//!   [`PolicyVersion`] snapshot. History is for rollback and audit only;
//!   evaluation always runs against the currently enabled rule set.

pub mod error;
pub mod policy;
pub mod rule;
pub mod store;

pub use error::PolicyError;
pub use policy::{validate_policy, Policy, PolicyVersion};
pub use rule::{Rule, RuleAction, RuleEffect, RuleScope};
pub use store::PolicyStore;
