//! Formatted output helpers for CLI commands.

use berth_engine::memory::EngineCall;
use berth_reconcile::apply::ApplyOutcome;
use berth_reconcile::graph::Applied;

/// Renders one recorded engine call, e.g. `create  api`.
#[must_use]
pub fn format_call(call: &EngineCall) -> String {
    let (verb, target) = match call {
        EngineCall::Inspect(name) => ("inspect", name.as_str()),
        EngineCall::Create(name) => ("create", name.as_str()),
        EngineCall::Start(name) => ("start", name.as_str()),
        EngineCall::Remove(name) => ("remove", name.as_str()),
        EngineCall::ListImages => ("images", ""),
        EngineCall::Pull(image) => ("pull", image.as_str()),
    };
    format!("{verb:<8}{target}").trim_end().to_string()
}

/// Renders a round list as `round N: a, b` lines.
#[must_use]
pub fn format_rounds(rounds: &[Vec<String>]) -> Vec<String> {
    rounds
        .iter()
        .enumerate()
        .map(|(i, names)| format!("round {i}: {}", names.join(", ")))
        .collect()
}

/// Summarizes outcomes as `N container(s): x created, y unchanged`.
#[must_use]
pub fn summarize(applied: &[Applied]) -> String {
    let outcomes = [
        ApplyOutcome::Created,
        ApplyOutcome::Recreated,
        ApplyOutcome::Started,
        ApplyOutcome::Unchanged,
    ];
    let parts: Vec<String> = outcomes
        .iter()
        .filter_map(|outcome| {
            let n = applied.iter().filter(|a| a.outcome == *outcome).count();
            (n > 0).then(|| format!("{n} {outcome}"))
        })
        .collect();
    if parts.is_empty() {
        return "0 container(s)".to_string();
    }
    format!("{} container(s): {}", applied.len(), parts.join(", "))
}
