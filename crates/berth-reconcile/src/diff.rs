//! Desired versus observed configuration.
//!
//! Five axes are compared in a fixed order and the first divergence wins:
//! image, DNS, command, environment, binds. Image and DNS compare exactly.
//! The other three are containment checks, because the engine merges image
//! defaults into what it reports: the observed command ends with the desired
//! one, and observed env and volumes are supersets of the desired ones.
//!
//! Nothing here mutates the engine. The image check may list and pull
//! images to learn the desired content ID.

use berth_common::constants::BIND_SEPARATOR;
use berth_engine::ContainerEngine;
use berth_engine::model::ObservedContainer;

use crate::error::{DiffAxis, ReconcileError, Result};
use crate::image;
use crate::spec::ContainerSpec;

/// One diverging axis with both sides rendered for humans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    /// Axis that diverged.
    pub axis: DiffAxis,
    /// Observed value.
    pub current: String,
    /// Desired value.
    pub desired: String,
}

impl Mismatch {
    fn into_error(self, name: &str) -> ReconcileError {
        ReconcileError::ConfigMismatch {
            name: name.to_string(),
            axis: self.axis,
            current: self.current,
            desired: self.desired,
        }
    }
}

/// Returns whether every element of `want` appears in `have`.
pub fn contains_all<T: PartialEq>(have: &[T], want: &[T]) -> bool {
    want.iter().all(|w| have.contains(w))
}

/// Returns whether `have` ends with exactly the elements of `want`.
pub fn ends_with<T: PartialEq>(have: &[T], want: &[T]) -> bool {
    have.ends_with(want)
}

/// Drops the `:mode` suffix of a bind, leaving `source:destination`.
fn bind_path(bind: &str) -> &str {
    let mut separators = bind.match_indices(BIND_SEPARATOR).map(|(i, _)| i);
    match (separators.next(), separators.next()) {
        (Some(_), Some(second)) => &bind[..second],
        _ => bind,
    }
}

/// Finds the first axis on which `observed` diverges from `spec`.
///
/// # Errors
///
/// Returns an error if the desired image cannot be resolved.
pub fn first_mismatch<E>(
    engine: &E,
    spec: &ContainerSpec,
    observed: &ObservedContainer,
) -> Result<Option<Mismatch>>
where
    E: ContainerEngine + ?Sized,
{
    let desired_image = image::resolve_image_id(engine, spec.image(), spec.auth_config())?;
    if observed.image != desired_image {
        return Ok(Some(Mismatch {
            axis: DiffAxis::Image,
            current: observed.image.to_string(),
            desired: format!("{} with id {desired_image}", spec.image()),
        }));
    }

    Ok(config_mismatch(spec, observed))
}

/// Compares the axes that need no engine access.
fn config_mismatch(spec: &ContainerSpec, observed: &ObservedContainer) -> Option<Mismatch> {
    if observed.host_config.dns.as_slice() != spec.dns() {
        return Some(Mismatch {
            axis: DiffAxis::Dns,
            current: format!("{:?}", observed.host_config.dns),
            desired: format!("{:?}", spec.dns()),
        });
    }

    let desired_cmd = &spec.container_config().cmd;
    if !ends_with(&observed.config.cmd, desired_cmd) {
        return Some(Mismatch {
            axis: DiffAxis::Command,
            current: format!("{:?}", observed.config.cmd),
            desired: format!("{desired_cmd:?}"),
        });
    }

    let desired_env = &spec.container_config().env;
    if !contains_all(&observed.config.env, desired_env) {
        return Some(Mismatch {
            axis: DiffAxis::Env,
            current: format!("{:?}", observed.config.env),
            desired: format!("{desired_env:?}"),
        });
    }

    let observed_binds = observed.bind_strings();
    let observed_paths: Vec<&str> = observed_binds.iter().map(String::as_str).collect();
    let desired_paths: Vec<&str> = spec.binds().iter().map(|b| bind_path(b)).collect();
    if !contains_all(&observed_paths, &desired_paths) {
        return Some(Mismatch {
            axis: DiffAxis::Binds,
            current: format!("{observed_binds:?}"),
            desired: format!("{:?}", spec.binds()),
        });
    }

    None
}

/// Decides whether `observed` satisfies `spec`.
///
/// Returns `Ok(true)` on a match. On a mismatch, returns `Ok(false)` when
/// `spec` allows removing the existing container, and a `ConfigMismatch`
/// error naming the axis otherwise.
///
/// # Errors
///
/// Returns `ConfigMismatch` as described above, or an error if the desired
/// image cannot be resolved.
pub fn matches<E>(engine: &E, spec: &ContainerSpec, observed: &ObservedContainer) -> Result<bool>
where
    E: ContainerEngine + ?Sized,
{
    match first_mismatch(engine, spec, observed)? {
        None => Ok(true),
        Some(mismatch) if spec.remove_existing() => {
            tracing::info!(
                name = %spec.name(),
                axis = %mismatch.axis,
                current = %mismatch.current,
                desired = %mismatch.desired,
                "existing container differs, will recreate"
            );
            Ok(false)
        }
        Some(mismatch) => Err(mismatch.into_error(spec.name())),
    }
}
