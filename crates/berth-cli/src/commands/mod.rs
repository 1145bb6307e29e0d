//! CLI command definitions and dispatch.

pub mod plan;
pub mod simulate;

use std::path::PathBuf;

use berth_common::config::BerthConfig;
use berth_common::constants::{BIN_NAME, DEFAULT_MANIFEST, DEFAULT_MAX_PARALLEL};
use clap::{Parser, Subcommand};

/// Declarative container reconciliation.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Path to the desired-state manifest.
    #[arg(short = 'f', long, global = true, default_value = DEFAULT_MANIFEST)]
    pub manifest: PathBuf,

    /// Maximum number of containers reconciled at once within a round.
    #[arg(long, global = true, env = "BERTH_MAX_PARALLEL", default_value_t = DEFAULT_MAX_PARALLEL)]
    pub max_parallel: usize,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub json: bool,
}

impl Cli {
    /// Builds the run configuration from the global flags.
    #[must_use]
    pub fn config(&self) -> BerthConfig {
        BerthConfig {
            max_parallel: self.max_parallel,
            manifest: self.manifest.clone(),
        }
    }
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the rounds in which containers would be reconciled.
    Plan(plan::PlanArgs),
    /// Reconcile the manifest against an in-process engine.
    Simulate(simulate::SimulateArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config();
    match cli.command {
        Command::Plan(args) => plan::execute(&config, &args),
        Command::Simulate(args) => simulate::execute(&config, &args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_flags_build_config() {
        let cli = Cli::try_parse_from(["berth", "plan", "-f", "stack.yaml", "--max-parallel", "2"])
            .expect("should parse");
        let config = cli.config();
        assert_eq!(config.manifest, PathBuf::from("stack.yaml"));
        assert_eq!(config.max_parallel, 2);
    }

    #[test]
    fn defaults_apply_without_flags() {
        let cli = Cli::try_parse_from(["berth", "simulate"]).expect("should parse");
        assert_eq!(cli.config(), BerthConfig::default());
        assert!(!cli.json);
    }
}
