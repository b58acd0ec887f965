// eval.rs — Pure evaluation of a parsed condition against a namespace.
//
// Evaluation is total: the tree is depth-bounded at parse time, there are
// no calls or loops, and every failure is a typed ExprError. The namespace
// is read-only — evaluating a condition can never mutate anything.

use std::collections::BTreeMap;

use crate::ast::{CompareOp, Expr};
use crate::error::ExprError;
use crate::value::Value;

/// The flattened variable namespace a condition is evaluated against.
///
/// Keys are dotted paths (`agent.id`, `payload.amount`, `context.userRole`).
pub type Namespace = BTreeMap<String, Value>;

/// Evaluate a parsed condition to a boolean.
///
/// The expression as a whole must produce a boolean — a condition that is
/// just `payload.amount` is a type mismatch unless that field is a bool.
pub fn evaluate(expr: &Expr, vars: &Namespace) -> Result<bool, ExprError> {
    match eval_value(expr, vars)? {
        Value::Bool(b) => Ok(b),
        other => Err(ExprError::TypeMismatch {
            operation: "boolean position".to_string(),
            left: other.type_name().to_string(),
            right: "boolean".to_string(),
        }),
    }
}

fn eval_value(expr: &Expr, vars: &Namespace) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Var(path) => vars
            .get(path)
            .cloned()
            .ok_or_else(|| ExprError::UnknownVariable { path: path.clone() }),
        Expr::Not(operand) => {
            let b = evaluate(operand, vars)?;
            Ok(Value::Bool(!b))
        }
        // && and || short-circuit: the right side is not evaluated (and
        // cannot error) when the left side already decides the outcome.
        Expr::And(left, right) => {
            if !evaluate(left, vars)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(evaluate(right, vars)?))
        }
        Expr::Or(left, right) => {
            if evaluate(left, vars)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(evaluate(right, vars)?))
        }
        Expr::Compare { op, left, right } => {
            let lhs = eval_value(left, vars)?;
            let rhs = eval_value(right, vars)?;
            compare(*op, &lhs, &rhs).map(Value::Bool)
        }
        Expr::In { needle, haystack } => {
            let value = eval_value(needle, vars)?;
            // Membership is exact tagged equality; a number never
            // matches a string element.
            Ok(Value::Bool(haystack.iter().any(|item| *item == value)))
        }
    }
}

/// Compare two values. Ordering is defined within a type only; comparing
/// across types (string vs number) is a type mismatch, not a coercion.
fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<bool, ExprError> {
    let mismatch = || ExprError::TypeMismatch {
        operation: format!("'{}' comparison", op.symbol()),
        left: lhs.type_name().to_string(),
        right: rhs.type_name().to_string(),
    };

    match (lhs, rhs) {
        (Value::Num(a), Value::Num(b)) => Ok(apply_ord(op, a.partial_cmp(b))),
        // Strings order lexicographically — RFC 3339 timestamps in the
        // namespace compare chronologically this way.
        (Value::Str(a), Value::Str(b)) => Ok(apply_ord(op, Some(a.cmp(b)))),
        (Value::Bool(a), Value::Bool(b)) => match op {
            CompareOp::Eq => Ok(a == b),
            CompareOp::Ne => Ok(a != b),
            _ => Err(mismatch()),
        },
        // Null participates in equality tests only: `payload.note == null`.
        (Value::Null, Value::Null) => match op {
            CompareOp::Eq => Ok(true),
            CompareOp::Ne => Ok(false),
            _ => Err(mismatch()),
        },
        (Value::Null, _) | (_, Value::Null) => match op {
            CompareOp::Eq => Ok(false),
            CompareOp::Ne => Ok(true),
            _ => Err(mismatch()),
        },
        _ => Err(mismatch()),
    }
}

fn apply_ord(op: CompareOp, ordering: Option<std::cmp::Ordering>) -> bool {
    use std::cmp::Ordering::*;
    match ordering {
        // NaN comparisons: nothing holds except !=.
        None => matches!(op, CompareOp::Ne),
        Some(ord) => match op {
            CompareOp::Eq => ord == Equal,
            CompareOp::Ne => ord != Equal,
            CompareOp::Lt => ord == Less,
            CompareOp::Le => ord != Greater,
            CompareOp::Gt => ord == Greater,
            CompareOp::Ge => ord != Less,
        },
    }
}
