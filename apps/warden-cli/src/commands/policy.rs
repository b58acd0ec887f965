// policy.rs — Policy file subcommands: validate.

use std::path::PathBuf;

use clap::Subcommand;
use warden_policy::validate_policy;

use super::load_policy_file;

#[derive(Subcommand)]
pub enum PolicyCommands {
    /// Parse and validate policy files without loading them.
    Validate {
        /// Policy files (JSON or YAML).
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

pub fn execute(cmd: &PolicyCommands) -> anyhow::Result<()> {
    match cmd {
        PolicyCommands::Validate { files } => {
            let mut failures = 0usize;
            for path in files {
                match load_policy_file(path).and_then(|p| Ok(validate_policy(&p)?)) {
                    Ok(()) => println!("{}: OK", path.display()),
                    Err(e) => {
                        failures += 1;
                        println!("{}: {:#}", path.display(), e);
                    }
                }
            }
            if failures > 0 {
                anyhow::bail!("{} of {} policy file(s) failed validation", failures, files.len());
            }
            Ok(())
        }
    }
}
