// audit.rs — Audit log subcommands: tail, verify.

use std::path::PathBuf;

use clap::Subcommand;
use warden_audit::{AuditError, JsonlSink};

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Show recent audit entries.
    Tail {
        /// Path to the audit log.
        #[arg(long)]
        log: PathBuf,
        /// Number of entries to show.
        #[arg(short, default_value = "10")]
        n: usize,
    },
    /// Verify the audit log hash chain integrity.
    Verify {
        /// Path to the audit log.
        #[arg(long)]
        log: PathBuf,
    },
}

pub fn execute(cmd: &AuditCommands) -> anyhow::Result<()> {
    match cmd {
        AuditCommands::Tail { log, n } => {
            if !log.exists() {
                println!("No audit log found at {}", log.display());
                return Ok(());
            }

            let entries = JsonlSink::read_all(log)?;
            let start = entries.len().saturating_sub(*n);
            let recent = &entries[start..];

            if recent.is_empty() {
                println!("No audit entries.");
                return Ok(());
            }

            println!(
                "{:<20} {:<12} {:<12} {:<16} RESULT",
                "TIMESTAMP", "AGENT", "ACTION", "TASK"
            );
            println!("{}", "-".repeat(100));
            for entry in recent {
                println!(
                    "{:<20} {:<12} {:<12} {:<16} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.agent_id,
                    entry.action.to_string(),
                    entry.task_id.as_deref().unwrap_or("-"),
                    entry.result.as_deref().unwrap_or("-"),
                );
            }
        }

        AuditCommands::Verify { log } => {
            if !log.exists() {
                println!("No audit log found at {}", log.display());
                return Ok(());
            }

            match JsonlSink::verify_chain(log) {
                Ok(count) => {
                    println!("Audit log verified: {} entry(ies), hash chain intact.", count);
                }
                Err(AuditError::IntegrityViolation {
                    line,
                    expected,
                    actual,
                }) => {
                    println!("INTEGRITY VIOLATION at line {}:", line);
                    println!("  Expected previous_hash: {}", expected);
                    println!("  Actual previous_hash:   {}", actual);
                    println!();
                    println!("The audit log may have been tampered with.");
                    anyhow::bail!("Audit log integrity check failed");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
