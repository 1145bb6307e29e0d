//! `berth plan`: print the reconciliation rounds without touching an engine.

use berth_common::config::BerthConfig;
use berth_reconcile::graph::ExecutionGraph;
use clap::Args;

use crate::manifest::Manifest;
use crate::output;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Also print each container's image and links.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Executes the `plan` command.
///
/// Loads the manifest, validates names and links, and prints the rounds
/// in which the containers would be reconciled.
///
/// # Errors
///
/// Returns an error if the manifest cannot be loaded, an entry is invalid,
/// or the links cannot be satisfied.
pub fn execute(config: &BerthConfig, args: &PlanArgs) -> anyhow::Result<()> {
    let manifest = Manifest::load(&config.manifest)?;
    let specs = manifest.specs()?;
    let rounds = ExecutionGraph::new(specs)?.plan()?;

    println!("Plan for {}", config.manifest.display());
    println!();
    for (line, names) in output::format_rounds(&rounds).iter().zip(&rounds) {
        println!("  {line}");
        if !args.verbose {
            continue;
        }
        for entry in manifest.containers.iter().filter(|c| names.contains(&c.name)) {
            println!("      {}  image: {}", entry.name, entry.image);
            if !entry.links.is_empty() {
                println!("      {}  links: {}", entry.name, entry.links.join(", "));
            }
        }
    }
    println!();
    println!(
        "  {} container(s) in {} round(s), at most {} at once.",
        manifest.containers.len(),
        rounds.len(),
        config.effective_parallelism()
    );
    Ok(())
}
