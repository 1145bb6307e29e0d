//! Dependency-ordered reconciliation of a set of linked containers.
//!
//! Containers are applied in rounds. A round holds every pending spec whose
//! link targets have all been applied in earlier rounds; its members are
//! reconciled concurrently and the round must finish before the next one is
//! computed. The first failure ends the call once the in-flight members of
//! its round have settled.

use std::collections::HashSet;
use std::sync::Arc;

use berth_common::config::BerthConfig;
use berth_engine::ContainerEngine;
use petgraph::graph::DiGraph;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::apply::{ApplyOutcome, apply};
use crate::error::{ReconcileError, Result};
use crate::spec::ContainerSpec;

/// Tuning for [`apply_graph_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleOptions {
    /// Maximum number of containers reconciled at once within a round.
    pub max_parallel: usize,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            max_parallel: berth_common::constants::DEFAULT_MAX_PARALLEL,
        }
    }
}

impl From<&BerthConfig> for ScheduleOptions {
    fn from(config: &BerthConfig) -> Self {
        Self {
            max_parallel: config.effective_parallelism(),
        }
    }
}

/// The result of reconciling one container within a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// Container name.
    pub name: String,
    /// Zero-based round the container was reconciled in.
    pub round: usize,
    /// What `apply` did.
    pub outcome: ApplyOutcome,
}

/// Working set of the scheduler.
#[derive(Debug)]
pub struct ExecutionGraph {
    pending: Vec<Arc<ContainerSpec>>,
    known: HashSet<String>,
    started: HashSet<String>,
}

impl ExecutionGraph {
    /// Validates a batch of specs and prepares it for scheduling.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if two specs share a name and `UnknownLink`
    /// if a link targets a name outside the batch.
    pub fn new(specs: impl IntoIterator<Item = ContainerSpec>) -> Result<Self> {
        let pending: Vec<Arc<ContainerSpec>> = specs.into_iter().map(Arc::new).collect();

        let mut known = HashSet::with_capacity(pending.len());
        for spec in &pending {
            if !known.insert(spec.name().to_string()) {
                return Err(ReconcileError::DuplicateName {
                    name: spec.name().to_string(),
                });
            }
        }

        for spec in &pending {
            for (link, reference) in spec.links().iter().zip(spec.link_references()) {
                if !known.contains(reference.target) {
                    return Err(ReconcileError::UnknownLink {
                        name: spec.name().to_string(),
                        link: link.clone(),
                    });
                }
            }
        }

        Ok(Self {
            pending,
            known,
            started: HashSet::new(),
        })
    }

    /// Returns whether every spec has been handed out.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of specs in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Returns whether the batch was empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    fn is_ready(&self, spec: &ContainerSpec) -> bool {
        spec.link_references()
            .all(|link| self.started.contains(link.target))
    }

    /// Removes and returns the specs whose dependencies have all started,
    /// in the order they were supplied.
    ///
    /// # Errors
    ///
    /// Returns `LinkCycle` if specs are pending but none is ready.
    pub fn next_round(&mut self) -> Result<Vec<Arc<ContainerSpec>>> {
        let (ready, deferred): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|spec| self.is_ready(spec));
        self.pending = deferred;

        if ready.is_empty() && !self.pending.is_empty() {
            return Err(ReconcileError::LinkCycle {
                names: self.cycle_members(),
            });
        }
        Ok(ready)
    }

    /// Records containers as reconciled so their dependents become ready.
    pub fn mark_started<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.started.extend(names.into_iter().map(Into::into));
    }

    /// Returns the names in each round, assuming every container succeeds.
    ///
    /// # Errors
    ///
    /// Returns `LinkCycle` if the links can never all be satisfied.
    pub fn plan(mut self) -> Result<Vec<Vec<String>>> {
        let mut rounds = Vec::new();
        while !self.is_complete() {
            let names: Vec<String> = self
                .next_round()?
                .iter()
                .map(|s| s.name().to_string())
                .collect();
            self.mark_started(names.iter().cloned());
            rounds.push(names);
        }
        Ok(rounds)
    }

    /// Names of pending specs that sit on a link cycle.
    fn cycle_members(&self) -> Vec<String> {
        let mut graph = DiGraph::<&str, ()>::new();
        let nodes: Vec<_> = self
            .pending
            .iter()
            .map(|s| (s.name(), graph.add_node(s.name())))
            .collect();
        let index_of = |name: &str| nodes.iter().find(|(n, _)| *n == name).map(|(_, i)| *i);

        for spec in &self.pending {
            let Some(from) = index_of(spec.name()) else {
                continue;
            };
            for link in spec.link_references() {
                if let Some(to) = index_of(link.target) {
                    let _ = graph.update_edge(from, to, ());
                }
            }
        }

        let mut names: Vec<String> = petgraph::algo::tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || scc.iter().any(|&n| graph.contains_edge(n, n)))
            .flatten()
            .filter_map(|n| graph.node_weight(n).map(|name| (*name).to_string()))
            .collect();
        if names.is_empty() {
            names = self.pending.iter().map(|s| s.name().to_string()).collect();
        }
        names.sort();
        names
    }
}

/// Applies every spec, dependencies first, with default options.
///
/// # Errors
///
/// See [`apply_graph_with`].
pub async fn apply_graph<E>(engine: Arc<E>, specs: Vec<ContainerSpec>) -> Result<Vec<Applied>>
where
    E: ContainerEngine + ?Sized + 'static,
{
    apply_graph_with(engine, specs, ScheduleOptions::default()).await
}

/// Applies every spec, dependencies first.
///
/// All validation (duplicate names, unknown links) happens before the first
/// engine call. Within a round at most `options.max_parallel` containers
/// are reconciled at once.
///
/// # Errors
///
/// Returns the first validation error, `LinkCycle` when the remaining specs
/// wait on each other, or the first error from a container's `apply`. After
/// a failure no further containers are started and no later round runs.
pub async fn apply_graph_with<E>(
    engine: Arc<E>,
    specs: Vec<ContainerSpec>,
    options: ScheduleOptions,
) -> Result<Vec<Applied>>
where
    E: ContainerEngine + ?Sized + 'static,
{
    let mut graph = ExecutionGraph::new(specs)?;
    let mut applied = Vec::with_capacity(graph.len());
    let mut round = 0;

    while !graph.is_complete() {
        let ready = graph.next_round()?;
        tracing::info!(
            round,
            containers = ?ready.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "applying round"
        );
        let results = run_round(&engine, ready, options.max_parallel.max(1)).await?;
        graph.mark_started(results.iter().map(|(name, _)| name.clone()));
        applied.extend(results.into_iter().map(|(name, outcome)| Applied {
            name,
            round,
            outcome,
        }));
        round += 1;
    }

    tracing::info!(containers = applied.len(), rounds = round, "graph applied");
    Ok(applied)
}

/// Waits for a permit, then runs `apply` on a blocking thread.
///
/// Returns `None` without touching the engine if the round was cancelled
/// before a permit became free. A failure closes the semaphore while the
/// permit is still held, so no waiting member can take it over.
async fn reconcile_member<E>(
    engine: Arc<E>,
    spec: Arc<ContainerSpec>,
    permits: Arc<Semaphore>,
) -> Result<Option<(String, ApplyOutcome)>>
where
    E: ContainerEngine + ?Sized + 'static,
{
    let Ok(_permit) = Arc::clone(&permits).acquire_owned().await else {
        return Ok(None);
    };
    let name = spec.name().to_string();
    let result = tokio::task::spawn_blocking(move || apply(&*engine, &spec))
        .await
        .map_err(|e| ReconcileError::Task {
            message: format!("{name}: {e}"),
        })
        .and_then(|applied| applied);
    match result {
        Ok(outcome) => Ok(Some((name, outcome))),
        Err(err) => {
            permits.close();
            Err(err)
        }
    }
}

/// Reconciles one round concurrently and waits for every member to settle.
///
/// Results come back in the order the round was given.
async fn run_round<E>(
    engine: &Arc<E>,
    ready: Vec<Arc<ContainerSpec>>,
    max_parallel: usize,
) -> Result<Vec<(String, ApplyOutcome)>>
where
    E: ContainerEngine + ?Sized + 'static,
{
    let permits = Arc::new(Semaphore::new(max_parallel));
    let order: Vec<String> = ready.iter().map(|s| s.name().to_string()).collect();
    let mut tasks = JoinSet::new();

    for spec in ready {
        let engine = Arc::clone(engine);
        let permits = Arc::clone(&permits);
        let _ = tasks.spawn(reconcile_member(engine, spec, permits));
    }

    let mut done = Vec::new();
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let result = joined.unwrap_or_else(|e| {
            Err(ReconcileError::Task {
                message: e.to_string(),
            })
        });
        match result {
            Ok(Some(entry)) => done.push(entry),
            Ok(None) => {}
            Err(err) => {
                if first_error.is_none() {
                    tracing::warn!(error = %err, "container failed, cancelling the rest of the round");
                    permits.close();
                    first_error = Some(err);
                }
            }
        }
    }

    if let Some(err) = first_error {
        return Err(err);
    }
    done.sort_by_key(|(name, _)| order.iter().position(|n| n == name));
    Ok(done)
}

#[cfg(test)]
mod tests {
    use berth_engine::memory::{ImageDefaults, MemoryEngine};

    use super::*;

    fn spec(name: &str, links: &[&str]) -> ContainerSpec {
        links
            .iter()
            .fold(ContainerSpec::builder().name(name).image("app:1"), |b, l| b.link(*l))
            .build()
            .expect("valid spec")
    }

    #[test]
    fn duplicate_names_rejected() {
        let err = ExecutionGraph::new(vec![spec("a", &[]), spec("a", &[])]).unwrap_err();
        assert!(matches!(err, ReconcileError::DuplicateName { ref name } if name == "a"));
    }

    #[test]
    fn unknown_link_rejected() {
        let err = ExecutionGraph::new(vec![spec("b", &[]), spec("a", &["missing:alias"])])
            .unwrap_err();
        match err {
            ReconcileError::UnknownLink { name, link } => {
                assert_eq!(name, "a");
                assert_eq!(link, "missing:alias");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn plan_orders_dependencies_first() {
        let graph = ExecutionGraph::new(vec![
            spec("web", &["api:api"]),
            spec("api", &["db:db", "cache:cache"]),
            spec("db", &[]),
            spec("cache", &[]),
        ])
        .expect("graph");
        let rounds = graph.plan().expect("plan");
        assert_eq!(rounds, vec![vec!["db", "cache"], vec!["api"], vec!["web"]]);
    }

    #[test]
    fn plan_of_empty_batch_is_empty() {
        let graph = ExecutionGraph::new(Vec::new()).expect("graph");
        assert!(graph.is_empty());
        assert!(graph.plan().expect("plan").is_empty());
    }

    #[test]
    fn cycle_is_reported_with_members() {
        let graph = ExecutionGraph::new(vec![
            spec("root", &[]),
            spec("a", &["b:b"]),
            spec("b", &["a:a"]),
            spec("c", &["a:a"]),
        ])
        .expect("graph");
        let err = graph.plan().unwrap_err();
        match err {
            ReconcileError::LinkCycle { names } => assert_eq!(names, vec!["a", "b"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn self_link_is_a_cycle() {
        let graph = ExecutionGraph::new(vec![spec("a", &["a:self"])]).expect("graph");
        let err = graph.plan().unwrap_err();
        assert!(matches!(err, ReconcileError::LinkCycle { ref names } if names == &["a"]));
    }

    #[test]
    fn schedule_options_follow_config() {
        let config = BerthConfig {
            max_parallel: 0,
            ..BerthConfig::default()
        };
        assert_eq!(ScheduleOptions::from(&config).max_parallel, 1);
    }

    #[tokio::test]
    async fn applied_reports_rounds() {
        let engine = Arc::new(MemoryEngine::new().with_local_image("app:1", ImageDefaults::default()));
        let applied = apply_graph(engine, vec![spec("n1", &["n2:n2"]), spec("n2", &[])])
            .await
            .expect("apply graph");
        assert_eq!(
            applied,
            vec![
                Applied {
                    name: "n2".into(),
                    round: 0,
                    outcome: ApplyOutcome::Created,
                },
                Applied {
                    name: "n1".into(),
                    round: 1,
                    outcome: ApplyOutcome::Created,
                },
            ]
        );
    }
}
