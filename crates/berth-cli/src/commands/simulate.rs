//! `berth simulate`: reconcile the manifest against an in-process engine.

use std::sync::Arc;

use berth_common::config::BerthConfig;
use berth_reconcile::graph::{ScheduleOptions, apply_graph_with};
use clap::Args;

use crate::manifest::Manifest;
use crate::output;

/// Arguments for the `simulate` command.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of consecutive runs; later runs show what a converged engine sees.
    #[arg(long, default_value_t = 1)]
    pub runs: usize,

    /// Print only mutating calls (create, start, remove).
    #[arg(long)]
    pub mutations_only: bool,
}

/// Executes the `simulate` command.
///
/// Seeds an in-process engine with the manifest's images, then applies the
/// manifest `runs` times, printing the outcome and engine calls of each run.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded or any run fails.
pub async fn execute(config: &BerthConfig, args: &SimulateArgs) -> anyhow::Result<()> {
    let manifest = Manifest::load(&config.manifest)?;
    let engine = Arc::new(manifest.seed_engine());
    let options = ScheduleOptions::from(config);

    for run in 1..=args.runs.max(1) {
        engine.clear_calls();
        let applied = apply_graph_with(Arc::clone(&engine), manifest.specs()?, options).await?;

        println!("Run {run}: {}", output::summarize(&applied));
        for a in &applied {
            println!("  [{}] {:<10} {}", a.round, a.outcome.to_string(), a.name);
        }
        println!("  calls:");
        for call in engine.calls().iter().filter(|c| !args.mutations_only || c.is_mutation()) {
            println!("    {}", output::format_call(call));
        }
        println!();
        tracing::debug!(run, mutations = engine.mutation_count(), "simulation run finished");
    }
    Ok(())
}
