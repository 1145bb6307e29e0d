//! Per-container reconciliation.
//!
//! [`apply`] inspects the named container and takes the shortest path to
//! the desired state:
//!
//! ```text
//! inspect ─┬─ missing ─────────────────────────────┐
//!          ├─ force remove ── remove ──────────────┤
//!          └─ present ── diff ─┬─ match, running ──┼─> done
//!                              ├─ match, stopped ──┼─> start
//!                              └─ mismatch ─ remove┘
//!                                                  └─> create ─> start ─> hook
//! ```
//!
//! A failing hook removes the container it was given, best effort.

use std::fmt;

use berth_common::types::ContainerId;
use berth_engine::ContainerEngine;
use berth_engine::EngineError;

use crate::diff;
use crate::error::{ReconcileError, Result};
use crate::image;
use crate::spec::ContainerSpec;

/// What `apply` did to reach the desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyOutcome {
    /// The container already matched and was running.
    Unchanged,
    /// The container matched but was stopped; it was started.
    Started,
    /// No container existed; one was created and started.
    Created,
    /// An existing container was removed and a new one created and started.
    Recreated,
}

impl ApplyOutcome {
    /// Returns whether any engine mutation happened.
    #[must_use]
    pub const fn changed(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::Started => write!(f, "started"),
            Self::Created => write!(f, "created"),
            Self::Recreated => write!(f, "recreated"),
        }
    }
}

/// Where the state machine goes after inspection.
enum Path {
    Done,
    Start(ContainerId),
    Create { replaced: bool },
}

/// Reconciles one container against the engine.
///
/// Idempotent: when the live container matches and is running, no engine
/// mutation is made.
///
/// # Errors
///
/// Returns a `ConfigMismatch` if the live container differs and `spec`
/// does not allow removing it, an `AfterCreate` error if the hook fails,
/// and an engine error if any inspect, remove, create or start call fails.
pub fn apply<E>(engine: &E, spec: &ContainerSpec) -> Result<ApplyOutcome>
where
    E: ContainerEngine + ?Sized,
{
    let name = spec.name();
    let path = match engine.inspect_container(name) {
        Err(EngineError::NotFound { .. }) => {
            tracing::debug!(name, "container not found");
            Path::Create { replaced: false }
        }
        Err(e) => return Err(ReconcileError::engine("inspect", name, e)),
        Ok(current) if spec.force_remove_existing() => {
            remove(engine, name, &current.id)?;
            Path::Create { replaced: true }
        }
        Ok(current) => {
            tracing::debug!(name, id = %current.id, status = %current.status, "comparing live container");
            if !diff::matches(engine, spec, &current)? {
                remove(engine, name, &current.id)?;
                Path::Create { replaced: true }
            } else if current.is_running() {
                Path::Done
            } else {
                Path::Start(current.id)
            }
        }
    };

    let (id, outcome) = match path {
        Path::Done => {
            tracing::debug!(name, "container up to date");
            return Ok(ApplyOutcome::Unchanged);
        }
        Path::Start(id) => (id, ApplyOutcome::Started),
        Path::Create { replaced } => {
            let id = create(engine, spec)?;
            let outcome = if replaced {
                ApplyOutcome::Recreated
            } else {
                ApplyOutcome::Created
            };
            (id, outcome)
        }
    };

    engine
        .start_container(&id, spec.host_config())
        .map_err(|e| ReconcileError::engine("start", name, e))?;
    tracing::info!(name, id = id.short(), "container started");

    if outcome != ApplyOutcome::Started {
        run_after_create(engine, spec, &id)?;
    }
    Ok(outcome)
}

fn remove<E>(engine: &E, name: &str, id: &ContainerId) -> Result<()>
where
    E: ContainerEngine + ?Sized,
{
    engine
        .remove_container(id, true, false)
        .map_err(|e| ReconcileError::engine("remove", name, e))?;
    tracing::info!(name, id = id.short(), "existing container removed");
    Ok(())
}

/// Creates the container and returns the ID the engine reports for it.
fn create<E>(engine: &E, spec: &ContainerSpec) -> Result<ContainerId>
where
    E: ContainerEngine + ?Sized,
{
    let name = spec.name();
    let _ = image::create_with_pull(engine, spec.container_config(), name, spec.auth_config())?;
    let created = engine
        .inspect_container(name)
        .map_err(|e| ReconcileError::engine("inspect", name, e))?;
    tracing::info!(name, id = created.id.short(), image = %spec.image(), "container created");
    Ok(created.id)
}

fn run_after_create<E>(engine: &E, spec: &ContainerSpec, id: &ContainerId) -> Result<()>
where
    E: ContainerEngine + ?Sized,
{
    let Some(hook) = spec.after_create() else {
        return Ok(());
    };
    let name = spec.name();
    if let Err(source) = hook(id) {
        if let Err(e) = engine.remove_container(id, true, false) {
            tracing::warn!(name, id = %id, error = %e, "cleanup after failed hook did not complete");
        }
        return Err(ReconcileError::AfterCreate {
            name: name.to_string(),
            source,
        });
    }
    tracing::debug!(name, id = %id, "after-create hook completed");
    Ok(())
}
