//! The engine client contract.

use std::sync::Arc;

use berth_common::types::ContainerId;

use crate::error::Result;
use crate::model::{AuthConfig, ContainerConfig, HostConfig, ImageRecord, ObservedContainer};

/// Capabilities the reconciler needs from a container engine.
///
/// Every call is a single synchronous request/response; implementors give
/// no transactional guarantees. Absence of a container or image is reported
/// as [`EngineError::NotFound`](crate::EngineError::NotFound).
pub trait ContainerEngine: Send + Sync {
    /// Returns the engine's current view of the named container.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no container has that name.
    fn inspect_container(&self, name: &str) -> Result<ObservedContainer>;

    /// Creates (but does not start) a container, returning its identifier.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the image is not present locally.
    fn create_container(&self, config: &ContainerConfig, name: &str) -> Result<ContainerId>;

    /// Starts a created container with the given host configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be started.
    fn start_container(&self, id: &ContainerId, host_config: Option<&HostConfig>) -> Result<()>;

    /// Removes a container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be removed.
    fn remove_container(&self, id: &ContainerId, force: bool, remove_volumes: bool) -> Result<()>;

    /// Lists the images present locally.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    fn list_images(&self) -> Result<Vec<ImageRecord>>;

    /// Pulls an image from its registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the pull fails.
    fn pull_image(&self, image: &str, auth: Option<&AuthConfig>) -> Result<()>;
}

impl<E: ContainerEngine + ?Sized> ContainerEngine for Arc<E> {
    fn inspect_container(&self, name: &str) -> Result<ObservedContainer> {
        (**self).inspect_container(name)
    }

    fn create_container(&self, config: &ContainerConfig, name: &str) -> Result<ContainerId> {
        (**self).create_container(config, name)
    }

    fn start_container(&self, id: &ContainerId, host_config: Option<&HostConfig>) -> Result<()> {
        (**self).start_container(id, host_config)
    }

    fn remove_container(&self, id: &ContainerId, force: bool, remove_volumes: bool) -> Result<()> {
        (**self).remove_container(id, force, remove_volumes)
    }

    fn list_images(&self) -> Result<Vec<ImageRecord>> {
        (**self).list_images()
    }

    fn pull_image(&self, image: &str, auth: Option<&AuthConfig>) -> Result<()> {
        (**self).pull_image(image, auth)
    }
}
