// conflicts.rs — Scan a policy set for conflicting rules.

use std::path::PathBuf;
use std::sync::Arc;

use warden_audit::AuditTrail;
use warden_engine::DecisionEngine;

use super::load_store;

pub fn execute(policies: &[PathBuf]) -> anyhow::Result<()> {
    let engine = DecisionEngine::new(Arc::new(AuditTrail::new()));
    let store = load_store(policies)?;
    engine.sync_with_store(&store)?;

    let conflicts = engine.conflicts();
    if conflicts.is_empty() {
        println!(
            "No conflicts detected across {} rule(s).",
            engine.index().len()
        );
        return Ok(());
    }

    println!(
        "{:<16} {:<16} {:<24} {:<10} DETAIL",
        "FIRST", "SECOND", "KIND", "SEVERITY"
    );
    println!("{}", "-".repeat(90));
    for conflict in conflicts.iter() {
        println!(
            "{:<16} {:<16} {:<24} {:<10} {}",
            conflict.first_rule,
            conflict.second_rule,
            conflict.kind.to_string(),
            format!("{:?}", conflict.severity).to_lowercase(),
            conflict.detail,
        );
    }
    println!();
    println!(
        "{} conflict(s). Conflicts are diagnostics; evaluation still applies deny-overrides.",
        conflicts.len()
    );
    Ok(())
}
