//! # warden-expr
//!
//! The closed condition language for Warden policy rules.
//!
//! Rule conditions are short boolean expressions over a flattened variable
//! namespace (`agent.id`, `task.resource`, `payload.amount`, ...). The
//! grammar is deliberately closed: boolean and comparison operators,
//! literals, dotted variable paths, and membership tests against literal
//! arrays. No function calls, no loops, no assignment — a condition string
//! can never become a general scripting surface.
//!
//! ## Key invariants
//!
//! - **Total**: parsing and evaluation always terminate. Nesting is capped
//!   at [`MAX_DEPTH`], and evaluation is a pure walk of the parsed tree.
//! - **Typed failures**: an unknown variable or a cross-type comparison is
//!   an [`ExprError`], never a coercion and never a panic.
//! - **Side-effect free**: evaluation reads the namespace and nothing else.
//!
//! ## Quick Example
//!
//! ```rust
//! use warden_expr::{parse, evaluate, Namespace, Value};
//!
//! let expr = parse(r#"payload.amount > 10000 && agent.role == "user""#).unwrap();
//! let mut vars = Namespace::new();
//! vars.insert("payload.amount".into(), Value::Num(50000.0));
//! vars.insert("agent.role".into(), Value::Str("user".into()));
//! assert!(evaluate(&expr, &vars).unwrap());
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod value;

pub use ast::{parse, CompareOp, Expr, MAX_DEPTH};
pub use error::ExprError;
pub use eval::{evaluate, Namespace};
pub use value::Value;
