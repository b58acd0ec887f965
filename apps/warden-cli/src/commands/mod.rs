// mod.rs — Subcommand modules and shared policy-file loading.

pub mod audit;
pub mod check;
pub mod conflicts;
pub mod policy;

use std::path::{Path, PathBuf};

use anyhow::Context;
use warden_policy::{Policy, PolicyStore};

/// Load a policy document from a JSON or YAML file, by extension.
pub fn load_policy_file(path: &Path) -> anyhow::Result<Policy> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading policy file {}", path.display()))?;
    let policy = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&text)
            .with_context(|| format!("parsing YAML policy {}", path.display()))?,
        _ => serde_json::from_str(&text)
            .with_context(|| format!("parsing JSON policy {}", path.display()))?,
    };
    Ok(policy)
}

/// Load policy files into a store, validating and versioning each one.
/// The engine's active rule set is then derived from the store.
pub fn load_store(paths: &[PathBuf]) -> anyhow::Result<PolicyStore> {
    let mut store = PolicyStore::new();
    for path in paths {
        let policy = load_policy_file(path)?;
        store
            .upsert(policy)
            .with_context(|| format!("loading policy {}", path.display()))?;
    }
    Ok(store)
}
