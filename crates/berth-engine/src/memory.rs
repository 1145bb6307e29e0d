//! In-process container engine.
//!
//! Keeps containers and images in memory, behaves like a real engine for
//! the calls in [`ContainerEngine`], and records every call so callers can
//! see exactly what a reconciliation did. Used by `berth simulate` and by
//! the test suites.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use berth_common::constants::{BIND_SEPARATOR, IMAGE_ID_PREFIX};
use berth_common::types::{ContainerId, ContainerStatus, ImageId};
use sha2::{Digest, Sha256};

use crate::engine::ContainerEngine;
use crate::error::{EngineError, Result};
use crate::model::{AuthConfig, ContainerConfig, HostConfig, ImageRecord, ObservedContainer};

/// Defaults baked into an image, merged into every container created from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageDefaults {
    /// Entrypoint placed ahead of the container command.
    pub entrypoint: Vec<String>,
    /// Command used when the container does not specify one.
    pub cmd: Vec<String>,
    /// Environment present in every container.
    pub env: Vec<String>,
}

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    /// `inspect_container(name)`.
    Inspect(String),
    /// `create_container(_, name)`.
    Create(String),
    /// `start_container(id, _)`, recorded with the container name.
    Start(String),
    /// `remove_container(id, ..)`, recorded with the container name.
    Remove(String),
    /// `list_images()`.
    ListImages,
    /// `pull_image(image, _)`.
    Pull(String),
}

impl EngineCall {
    /// Returns whether the call changes engine state.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(self, Self::Create(_) | Self::Start(_) | Self::Remove(_))
    }
}

#[derive(Debug, Clone)]
struct StoredImage {
    id: ImageId,
    tag: String,
    defaults: ImageDefaults,
}

#[derive(Debug, Default)]
struct MemoryState {
    containers: BTreeMap<String, ObservedContainer>,
    images: Vec<StoredImage>,
    registry: BTreeMap<String, (ImageDefaults, u32)>,
    calls: Vec<EngineCall>,
}

impl MemoryState {
    fn find_by_id(&self, id: &ContainerId) -> Option<&str> {
        self.containers
            .values()
            .find(|c| &c.id == id)
            .map(|c| c.name.as_str())
    }

    fn local_image(&self, tag: &str) -> Option<&StoredImage> {
        self.images.iter().find(|i| i.tag == tag)
    }
}

/// An engine that lives entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: Mutex<MemoryState>,
}

impl MemoryEngine {
    /// Creates an engine with no images and no containers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes an image pullable from the simulated registry.
    #[must_use]
    pub fn with_registry_image(self, tag: impl Into<String>, defaults: ImageDefaults) -> Self {
        let _ = self.lock().registry.insert(tag.into(), (defaults, 0));
        self
    }

    /// Makes an image pullable and already present locally.
    #[must_use]
    pub fn with_local_image(self, tag: impl Into<String>, defaults: ImageDefaults) -> Self {
        let tag = tag.into();
        {
            let mut state = self.lock();
            let _ = state.registry.insert(tag.clone(), (defaults.clone(), 0));
            state.images.push(StoredImage {
                id: image_id(&tag, 0),
                tag,
                defaults,
            });
        }
        self
    }

    /// Publishes a new revision of a registry image and moves the local tag
    /// to it, as a `docker pull` of an updated tag would.
    ///
    /// Containers created from the old revision keep the old image ID.
    pub fn rebuild_image(&self, tag: &str) {
        let mut state = self.lock();
        let Some((defaults, revision)) = state.registry.get_mut(tag) else {
            return;
        };
        *revision += 1;
        let stored = StoredImage {
            id: image_id(tag, *revision),
            tag: tag.to_string(),
            defaults: defaults.clone(),
        };
        state.images.retain(|i| i.tag != tag);
        state.images.push(stored);
    }

    /// Marks a running container as exited.
    pub fn stop(&self, name: &str) {
        if let Some(container) = self.lock().containers.get_mut(name) {
            container.status = ContainerStatus::Exited;
        }
    }

    /// Returns every call made so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<EngineCall> {
        self.lock().calls.clone()
    }

    /// Returns the number of create, start and remove calls made so far.
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.lock().calls.iter().filter(|c| c.is_mutation()).count()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Returns a snapshot of every container on the engine.
    #[must_use]
    pub fn containers(&self) -> Vec<ObservedContainer> {
        self.lock().containers.values().cloned().collect()
    }
}

fn image_id(tag: &str, revision: u32) -> ImageId {
    let digest = Sha256::digest(format!("{tag}@{revision}").as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    ImageId::new(format!("{IMAGE_ID_PREFIX}{hex}"))
}

/// Splits `source:destination[:mode]` into its destination and source.
fn parse_bind(bind: &str) -> Option<(String, String)> {
    let mut parts = bind.splitn(3, BIND_SEPARATOR);
    let source = parts.next()?;
    let destination = parts.next()?;
    Some((destination.to_string(), source.to_string()))
}

impl ContainerEngine for MemoryEngine {
    fn inspect_container(&self, name: &str) -> Result<ObservedContainer> {
        let mut state = self.lock();
        state.calls.push(EngineCall::Inspect(name.to_string()));
        if let Some(container) = state.containers.get(name) {
            return Ok(container.clone());
        }
        state
            .containers
            .values()
            .find(|c| c.id.as_str() == name)
            .cloned()
            .ok_or_else(|| EngineError::container_not_found(name))
    }

    fn create_container(&self, config: &ContainerConfig, name: &str) -> Result<ContainerId> {
        let mut state = self.lock();
        state.calls.push(EngineCall::Create(name.to_string()));
        if state.containers.contains_key(name) {
            return Err(EngineError::Conflict {
                name: name.to_string(),
            });
        }
        let image = state
            .local_image(&config.image)
            .cloned()
            .ok_or_else(|| EngineError::image_not_found(&config.image))?;

        let mut cmd = image.defaults.entrypoint.clone();
        if config.cmd.is_empty() {
            cmd.extend(image.defaults.cmd.iter().cloned());
        } else {
            cmd.extend(config.cmd.iter().cloned());
        }
        let mut env = image.defaults.env.clone();
        env.extend(config.env.iter().cloned());

        let id = ContainerId::generate();
        let observed = ObservedContainer {
            id: id.clone(),
            name: name.to_string(),
            status: ContainerStatus::Created,
            image: image.id,
            config: ContainerConfig {
                image: config.image.clone(),
                cmd,
                env,
            },
            host_config: HostConfig::default(),
            volumes: BTreeMap::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        let _ = state.containers.insert(name.to_string(), observed);
        tracing::debug!(id = %id, name, "memory engine created container");
        Ok(id)
    }

    fn start_container(&self, id: &ContainerId, host_config: Option<&HostConfig>) -> Result<()> {
        let mut state = self.lock();
        let Some(name) = state.find_by_id(id).map(str::to_string) else {
            state.calls.push(EngineCall::Start(id.to_string()));
            return Err(EngineError::container_not_found(id.as_str()));
        };
        state.calls.push(EngineCall::Start(name.clone()));
        if let Some(container) = state.containers.get_mut(&name) {
            if let Some(host) = host_config {
                container.volumes = host
                    .binds
                    .iter()
                    .map(String::as_str)
                    .filter_map(parse_bind)
                    .collect();
                container.host_config = host.clone();
            }
            container.status = ContainerStatus::Running;
        }
        Ok(())
    }

    fn remove_container(&self, id: &ContainerId, force: bool, _remove_volumes: bool) -> Result<()> {
        let mut state = self.lock();
        let Some(name) = state.find_by_id(id).map(str::to_string) else {
            state.calls.push(EngineCall::Remove(id.to_string()));
            return Err(EngineError::container_not_found(id.as_str()));
        };
        state.calls.push(EngineCall::Remove(name.clone()));
        let running = state.containers.get(&name).is_some_and(ObservedContainer::is_running);
        if running && !force {
            return Err(EngineError::rejected(
                "remove",
                format!("container {name} is running; stop it or force removal"),
            ));
        }
        let _ = state.containers.remove(&name);
        Ok(())
    }

    fn list_images(&self) -> Result<Vec<ImageRecord>> {
        let mut state = self.lock();
        state.calls.push(EngineCall::ListImages);
        Ok(state
            .images
            .iter()
            .map(|i| ImageRecord {
                id: i.id.clone(),
                repo_tags: vec![i.tag.clone()],
            })
            .collect())
    }

    fn pull_image(&self, image: &str, _auth: Option<&AuthConfig>) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(EngineCall::Pull(image.to_string()));
        let Some((defaults, revision)) = state.registry.get(image).cloned() else {
            return Err(EngineError::rejected(
                "pull",
                format!("repository {image} not found in registry"),
            ));
        };
        state.images.retain(|i| i.tag != image);
        state.images.push(StoredImage {
            id: image_id(image, revision),
            tag: image.to_string(),
            defaults,
        });
        tracing::debug!(image, "memory engine pulled image");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis() -> ImageDefaults {
        ImageDefaults {
            entrypoint: vec!["docker-entrypoint.sh".into()],
            cmd: vec!["redis-server".into()],
            env: vec!["REDIS_VERSION=7".into()],
        }
    }

    #[test]
    fn inspect_missing_is_not_found() {
        let engine = MemoryEngine::new();
        let err = engine.inspect_container("web").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn create_without_local_image_is_not_found() {
        let engine = MemoryEngine::new().with_registry_image("redis:7", redis());
        let config = ContainerConfig {
            image: "redis:7".into(),
            ..ContainerConfig::default()
        };
        let err = engine.create_container(&config, "cache").unwrap_err();
        assert_eq!(err, EngineError::image_not_found("redis:7"));
    }

    #[test]
    fn pull_then_create_merges_image_defaults() {
        let engine = MemoryEngine::new().with_registry_image("redis:7", redis());
        engine.pull_image("redis:7", None).expect("pull");
        let config = ContainerConfig {
            image: "redis:7".into(),
            cmd: vec!["--appendonly".into(), "yes".into()],
            env: vec!["MODE=primary".into()],
        };
        let _ = engine.create_container(&config, "cache").expect("create");
        let observed = engine.inspect_container("cache").expect("inspect");
        assert_eq!(
            observed.config.cmd,
            vec!["docker-entrypoint.sh", "--appendonly", "yes"]
        );
        assert_eq!(observed.config.env, vec!["REDIS_VERSION=7", "MODE=primary"]);
        assert_eq!(observed.status, ContainerStatus::Created);
        assert!(observed.image.as_str().starts_with("sha256:"));
    }

    #[test]
    fn create_twice_conflicts() {
        let engine = MemoryEngine::new().with_local_image("redis:7", redis());
        let config = ContainerConfig {
            image: "redis:7".into(),
            ..ContainerConfig::default()
        };
        let _ = engine.create_container(&config, "cache").expect("create");
        let err = engine.create_container(&config, "cache").unwrap_err();
        assert!(matches!(err, EngineError::Conflict { .. }));
    }

    #[test]
    fn start_applies_host_config() {
        let engine = MemoryEngine::new().with_local_image("redis:7", redis());
        let config = ContainerConfig {
            image: "redis:7".into(),
            ..ContainerConfig::default()
        };
        let id = engine.create_container(&config, "cache").expect("create");
        let host = HostConfig {
            binds: vec!["/srv/redis:/data:rw".into()],
            dns: vec!["10.0.0.2".into()],
            links: Vec::new(),
        };
        engine.start_container(&id, Some(&host)).expect("start");
        let observed = engine.inspect_container("cache").expect("inspect");
        assert!(observed.is_running());
        assert_eq!(observed.host_config.dns, vec!["10.0.0.2"]);
        assert_eq!(observed.bind_strings(), vec!["/srv/redis:/data"]);
    }

    #[test]
    fn remove_running_requires_force() {
        let engine = MemoryEngine::new().with_local_image("redis:7", redis());
        let config = ContainerConfig {
            image: "redis:7".into(),
            ..ContainerConfig::default()
        };
        let id = engine.create_container(&config, "cache").expect("create");
        engine.start_container(&id, None).expect("start");
        assert!(engine.remove_container(&id, false, false).is_err());
        engine.remove_container(&id, true, false).expect("forced remove");
        assert!(engine.containers().is_empty());
    }

    #[test]
    fn pull_of_unknown_repository_fails() {
        let engine = MemoryEngine::new();
        let err = engine.pull_image("ghost:1", None).unwrap_err();
        assert!(!err.is_not_found());
    }

    #[test]
    fn rebuild_moves_tag_to_new_id() {
        let engine = MemoryEngine::new().with_local_image("redis:7", redis());
        let before = engine.list_images().expect("list")[0].id.clone();
        engine.rebuild_image("redis:7");
        let after = engine.list_images().expect("list")[0].id.clone();
        assert_ne!(before, after);
    }

    #[test]
    fn calls_are_recorded_in_order() {
        let engine = MemoryEngine::new().with_local_image("redis:7", redis());
        let _ = engine.inspect_container("cache");
        let config = ContainerConfig {
            image: "redis:7".into(),
            ..ContainerConfig::default()
        };
        let id = engine.create_container(&config, "cache").expect("create");
        engine.start_container(&id, None).expect("start");
        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::Inspect("cache".into()),
                EngineCall::Create("cache".into()),
                EngineCall::Start("cache".into()),
            ]
        );
        assert_eq!(engine.mutation_count(), 2);
        engine.clear_calls();
        assert!(engine.calls().is_empty());
    }
}
