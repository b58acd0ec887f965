// check.rs — Evaluate a task context against policy files.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use warden_audit::{AuditTrail, JsonlSink};
use warden_engine::{DecisionEngine, EvaluationContext};

use super::load_store;

#[derive(Args)]
pub struct CheckArgs {
    /// Policy files (JSON or YAML). Repeatable.
    #[arg(long = "policy", required = true)]
    pub policies: Vec<PathBuf>,

    /// Full evaluation context as a JSON file. Flags below override it.
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Agent identifier the task runs as.
    #[arg(long, required_unless_present = "context")]
    pub agent: Option<String>,

    /// Task name (e.g. "transfer_funds").
    #[arg(long, required_unless_present = "context")]
    pub task: Option<String>,

    /// Task attribute, key=value. Repeatable.
    #[arg(long = "attr")]
    pub attrs: Vec<String>,

    /// Task payload as a JSON object.
    #[arg(long)]
    pub payload: Option<String>,

    /// Role of the requesting user/agent.
    #[arg(long)]
    pub role: Option<String>,

    /// Evaluate without granting execution (decision is still audited).
    #[arg(long)]
    pub simulate: bool,

    /// Append the decision to this tamper-evident audit log.
    #[arg(long)]
    pub audit_log: Option<PathBuf>,

    /// Emit the full evaluation result as JSON.
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: &CheckArgs) -> anyhow::Result<()> {
    let trail = Arc::new(AuditTrail::new());
    if let Some(path) = &args.audit_log {
        trail.subscribe(Box::new(JsonlSink::open(path)?));
    }

    let engine = DecisionEngine::new(Arc::clone(&trail));
    let store = load_store(&args.policies)?;
    engine.sync_with_store(&store)?;

    let mut ctx = match &args.context {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading context file {}", path.display()))?;
            let mut ctx: EvaluationContext = serde_json::from_str(&text)
                .with_context(|| format!("parsing context file {}", path.display()))?;
            if let Some(agent) = &args.agent {
                ctx.agent_id = agent.clone();
            }
            if let Some(task) = &args.task {
                ctx.task.name = task.clone();
            }
            ctx
        }
        None => {
            // clap guarantees both flags when --context is absent.
            EvaluationContext::new(
                args.agent.as_deref().unwrap_or_default(),
                args.task.as_deref().unwrap_or_default(),
            )
        }
    };
    if args.simulate {
        ctx = ctx.with_simulation(true);
    }
    for attr in &args.attrs {
        let (key, value) = attr
            .split_once('=')
            .with_context(|| format!("invalid --attr '{}', expected key=value", attr))?;
        ctx = ctx.with_task_attr(key, value);
    }
    if let Some(payload) = &args.payload {
        let json: serde_json::Value =
            serde_json::from_str(payload).context("parsing --payload as JSON")?;
        anyhow::ensure!(json.is_object(), "--payload must be a JSON object");
        ctx = ctx.with_payload_json(json);
    }
    if let Some(role) = &args.role {
        ctx = ctx.with_role(role);
    }

    let result = engine.evaluate(&ctx);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let verdict = if result.allowed { "ALLOWED" } else { "DENIED" };
        println!("{}: {}", verdict, result.reason);
        for rule in &result.triggered_rules {
            println!(
                "  triggered: {} [{} {} priority {}]",
                rule.rule_id, rule.effect, rule.scope, rule.priority
            );
        }
        for err in &result.rule_errors {
            println!("  rule error: {}: {}", err.rule_id, err.message);
        }
        if result.conflict_detected == Some(true) {
            println!("  note: rule set carries conflicts (see `warden conflicts`)");
        }
    }

    // The trail's dispatch thread flushes sinks on drop.
    drop(engine);
    drop(trail);

    if !result.allowed {
        anyhow::bail!("task denied");
    }
    Ok(())
}
