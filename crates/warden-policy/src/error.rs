// error.rs — Error types for the policy subsystem.

use thiserror::Error;
use warden_expr::ExprError;

/// Errors that can occur during policy validation and storage.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A required field is missing or malformed.
    #[error("validation failed for policy '{policy_id}': {message}")]
    Validation { policy_id: String, message: String },

    /// A rule identifier is already taken, either within the policy
    /// itself or by another policy in the active rule set.
    #[error("duplicate rule id '{rule_id}' in policy '{policy_id}'")]
    DuplicateRuleId { policy_id: String, rule_id: String },

    /// A rule's condition string does not parse under the closed grammar.
    #[error("invalid condition in rule '{rule_id}': {source}")]
    Condition {
        rule_id: String,
        #[source]
        source: ExprError,
    },

    /// The referenced policy does not exist in the store.
    #[error("no policy with id '{policy_id}'")]
    UnknownPolicy { policy_id: String },
}
