//! Desired-state container specifications.
//!
//! A [`ContainerSpec`] is built once through [`ContainerSpecBuilder`] and is
//! read-only afterwards; `apply` and `apply_graph` only ever borrow it.

use std::fmt;
use std::sync::Arc;

use berth_common::constants::{BIND_SEPARATOR, LINK_SEPARATOR};
use berth_common::types::ContainerId;
use berth_engine::model::{AuthConfig, ContainerConfig, HostConfig, LinkReference};

use crate::error::{HookError, ReconcileError, Result};

/// Callback run with the ID of a freshly created and started container.
pub type AfterCreateHook = Arc<dyn Fn(&ContainerId) -> std::result::Result<(), HookError> + Send + Sync>;

/// A desired container.
#[derive(Clone)]
pub struct ContainerSpec {
    name: String,
    container_config: ContainerConfig,
    host_config: Option<HostConfig>,
    auth_config: Option<AuthConfig>,
    remove_existing: bool,
    force_remove_existing: bool,
    after_create: Option<AfterCreateHook>,
}

impl ContainerSpec {
    /// Starts building a spec.
    #[must_use]
    pub fn builder() -> ContainerSpecBuilder {
        ContainerSpecBuilder::default()
    }

    /// Container name, the identity key on the engine and in a graph.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Image-level configuration.
    #[must_use]
    pub const fn container_config(&self) -> &ContainerConfig {
        &self.container_config
    }

    /// Image reference.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.container_config.image
    }

    /// Host-level configuration, if any.
    #[must_use]
    pub const fn host_config(&self) -> Option<&HostConfig> {
        self.host_config.as_ref()
    }

    /// Registry credentials used when pulling.
    #[must_use]
    pub const fn auth_config(&self) -> Option<&AuthConfig> {
        self.auth_config.as_ref()
    }

    /// Whether a non-matching live container may be discarded.
    #[must_use]
    pub const fn remove_existing(&self) -> bool {
        self.remove_existing
    }

    /// Whether any live container is discarded before reconciling.
    #[must_use]
    pub const fn force_remove_existing(&self) -> bool {
        self.force_remove_existing
    }

    /// The post-creation hook, if set.
    #[must_use]
    pub fn after_create(&self) -> Option<&AfterCreateHook> {
        self.after_create.as_ref()
    }

    /// Desired DNS servers; empty when no host configuration is set.
    #[must_use]
    pub fn dns(&self) -> &[String] {
        self.host_config.as_ref().map_or(&[], |h| h.dns.as_slice())
    }

    /// Desired bind mounts; empty when no host configuration is set.
    #[must_use]
    pub fn binds(&self) -> &[String] {
        self.host_config.as_ref().map_or(&[], |h| h.binds.as_slice())
    }

    /// Declared links; empty when no host configuration is set.
    #[must_use]
    pub fn links(&self) -> &[String] {
        self.host_config.as_ref().map_or(&[], |h| h.links.as_slice())
    }

    /// Parsed links.
    pub fn link_references(&self) -> impl Iterator<Item = LinkReference<'_>> {
        self.host_config.iter().flat_map(HostConfig::link_references)
    }
}

impl fmt::Debug for ContainerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerSpec")
            .field("name", &self.name)
            .field("container_config", &self.container_config)
            .field("host_config", &self.host_config)
            .field("auth_config", &self.auth_config)
            .field("remove_existing", &self.remove_existing)
            .field("force_remove_existing", &self.force_remove_existing)
            .field("after_create", &self.after_create.is_some())
            .finish()
    }
}

/// Builder for [`ContainerSpec`].
///
/// Options apply in call order. The first malformed option is remembered
/// and returned by [`build`](Self::build); options after it have no effect.
#[derive(Default)]
pub struct ContainerSpecBuilder {
    name: String,
    container_config: ContainerConfig,
    host_config: Option<HostConfig>,
    auth_config: Option<AuthConfig>,
    remove_existing: bool,
    force_remove_existing: bool,
    after_create: Option<AfterCreateHook>,
    error: Option<ReconcileError>,
}

impl ContainerSpecBuilder {
    fn reject(mut self, option: &'static str, value: impl Into<String>, reason: &'static str) -> Self {
        if self.error.is_none() {
            self.error = Some(ReconcileError::InvalidOption {
                option,
                value: value.into(),
                reason,
            });
        }
        self
    }

    fn host(&mut self) -> &mut HostConfig {
        self.host_config.get_or_insert_with(HostConfig::default)
    }

    /// Sets the container name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        if self.error.is_none() {
            self.name = name.into();
        }
        self
    }

    /// Replaces the whole image-level configuration.
    #[must_use]
    pub fn container_config(mut self, config: ContainerConfig) -> Self {
        if self.error.is_none() {
            self.container_config = config;
        }
        self
    }

    /// Sets the image reference.
    #[must_use]
    pub fn image(mut self, image: impl Into<String>) -> Self {
        if self.error.is_none() {
            self.container_config.image = image.into();
        }
        self
    }

    /// Sets the command arguments.
    #[must_use]
    pub fn command<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.error.is_none() {
            self.container_config.cmd = cmd.into_iter().map(Into::into).collect();
        }
        self
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if key.is_empty() || key.contains('=') {
            return self.reject("env", key, "variable name must be non-empty and contain no '='");
        }
        if self.error.is_none() {
            self.container_config.env.push(format!("{key}={}", value.into()));
        }
        self
    }

    /// Replaces the whole host configuration.
    #[must_use]
    pub fn host_config(mut self, config: HostConfig) -> Self {
        if self.error.is_none() {
            self.host_config = Some(config);
        }
        self
    }

    /// Adds a bind mount in `source:destination[:mode]` form.
    #[must_use]
    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        let bind = bind.into();
        let mut parts = bind.splitn(3, BIND_SEPARATOR);
        let source = parts.next().unwrap_or_default();
        let destination = parts.next().unwrap_or_default();
        if source.is_empty() || destination.is_empty() {
            return self.reject("bind", bind, "expected source:destination");
        }
        if self.error.is_none() {
            self.host().binds.push(bind);
        }
        self
    }

    /// Adds a DNS server.
    #[must_use]
    pub fn dns(mut self, server: impl Into<String>) -> Self {
        if self.error.is_none() {
            self.host().dns.push(server.into());
        }
        self
    }

    /// Adds a link in `name[:alias]` form.
    #[must_use]
    pub fn link(mut self, link: impl Into<String>) -> Self {
        let link = link.into();
        if link.split(LINK_SEPARATOR).next().unwrap_or_default().is_empty() {
            return self.reject("link", link, "expected name:alias");
        }
        if self.error.is_none() {
            self.host().links.push(link);
        }
        self
    }

    /// Sets the registry credentials.
    #[must_use]
    pub fn auth_config(mut self, auth: AuthConfig) -> Self {
        if self.error.is_none() {
            self.auth_config = Some(auth);
        }
        self
    }

    /// Allows a non-matching live container to be removed and recreated.
    #[must_use]
    pub fn remove_existing(mut self, remove: bool) -> Self {
        if self.error.is_none() {
            self.remove_existing = remove;
        }
        self
    }

    /// Removes any live container before reconciling.
    #[must_use]
    pub fn force_remove_existing(mut self, remove: bool) -> Self {
        if self.error.is_none() {
            self.force_remove_existing = remove;
        }
        self
    }

    /// Sets a callback run once a container has been created and started.
    #[must_use]
    pub fn after_create<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ContainerId) -> std::result::Result<(), HookError> + Send + Sync + 'static,
    {
        if self.error.is_none() {
            self.after_create = Some(Arc::new(hook));
        }
        self
    }

    /// Validates and returns the spec.
    ///
    /// # Errors
    ///
    /// Returns the first rejected option, or `MissingName` if no name was set.
    pub fn build(self) -> Result<ContainerSpec> {
        if let Some(err) = self.error {
            return Err(err);
        }
        if self.name.is_empty() {
            return Err(ReconcileError::MissingName);
        }
        Ok(ContainerSpec {
            name: self.name,
            container_config: self.container_config,
            host_config: self.host_config,
            auth_config: self.auth_config,
            remove_existing: self.remove_existing,
            force_remove_existing: self.force_remove_existing,
            after_create: self.after_create,
        })
    }
}

impl fmt::Debug for ContainerSpecBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerSpecBuilder")
            .field("name", &self.name)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
