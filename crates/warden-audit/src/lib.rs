//! # warden-audit
//!
//! Append-only audit trail for Warden policy decisions.
//!
//! Every evaluation is recorded as an [`AuditLogEntry`]; the trail keeps a
//! bounded in-memory history plus running [`SystemStatistics`], and pushes
//! a [`LogEvent`] to subscribed [`AuditSink`]s through a bounded queue
//! drained by a dedicated dispatcher thread — a slow subscriber can never
//! backpressure an append.
//!
//! ## Key invariants
//!
//! - **Entries are immutable**: created once per evaluation, never edited.
//! - **Entry and statistics move together**: both live under one lock, so
//!   a reader never sees a new entry with stale counters or vice versa.
//! - **Eviction is FIFO and bounded**: oldest entries go first once the
//!   capacity ceiling is hit; all-time counters are never decremented.
//!
//! ## Quick Example
//!
//! ```rust
//! use warden_audit::{AuditAction, AuditLogEntry, AuditTrail};
//!
//! let trail = AuditTrail::with_capacity(1000);
//! let entry = AuditLogEntry::new("agent-1", AuditAction::Denied)
//!     .with_task("transfer_funds")
//!     .with_triggered_rules(vec!["limit-transfers".into()]);
//! trail.append(entry).unwrap();
//! assert_eq!(trail.statistics().total_evaluated, 1);
//! ```

pub mod dispatch;
pub mod entry;
pub mod error;
pub mod jsonl;
pub mod stats;
pub mod trail;

pub use dispatch::{AuditSink, LogEvent};
pub use entry::{AuditAction, AuditLogEntry};
pub use error::AuditError;
pub use jsonl::JsonlSink;
pub use stats::SystemStatistics;
pub use trail::{AuditTrail, TrailSnapshot};
