//! # warden-cli
//!
//! Command-line interface for Warden.
//!
//! Evaluates proposed agent tasks against policy files and inspects the
//! resulting audit trail:
//! - `warden check` — evaluate a task context against policy files
//! - `warden conflicts` — scan a policy set for conflicting rules
//! - `warden policy validate` — validate policy files without loading them
//! - `warden audit tail/verify` — inspect the tamper-evident audit log

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Warden CLI — evaluate and inspect agent policy decisions.
#[derive(Parser)]
#[command(name = "warden", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a task context against policy files.
    Check(commands::check::CheckArgs),
    /// Scan a policy set for conflicting rules.
    Conflicts {
        /// Policy files (JSON or YAML). Repeatable.
        #[arg(long = "policy", required = true)]
        policies: Vec<std::path::PathBuf>,
    },
    /// Manage policy files.
    Policy {
        #[command(subcommand)]
        command: commands::policy::PolicyCommands,
    },
    /// Inspect the audit log.
    Audit {
        #[command(subcommand)]
        command: commands::audit::AuditCommands,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("warden=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Check(args) => commands::check::execute(args),
        Commands::Conflicts { policies } => commands::conflicts::execute(policies),
        Commands::Policy { command } => commands::policy::execute(command),
        Commands::Audit { command } => commands::audit::execute(command),
    }
}
