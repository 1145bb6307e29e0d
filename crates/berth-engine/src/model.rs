//! Data exchanged with the engine.

use std::collections::BTreeMap;
use std::fmt;

use berth_common::constants::{BIND_SEPARATOR, LINK_SEPARATOR};
use berth_common::types::{ContainerId, ContainerStatus, ImageId};
use serde::{Deserialize, Serialize};

/// Image-level container configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Image reference, e.g. `redis:7`.
    pub image: String,
    /// Command arguments.
    pub cmd: Vec<String>,
    /// Environment variables in `KEY=value` form.
    pub env: Vec<String>,
}

/// Host-level runtime configuration, applied when the container starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Bind mounts in `source:destination` form.
    pub binds: Vec<String>,
    /// DNS servers, in resolution order.
    pub dns: Vec<String>,
    /// Links to other containers in `name:alias` form.
    pub links: Vec<String>,
}

impl HostConfig {
    /// Parses every declared link.
    pub fn link_references(&self) -> impl Iterator<Item = LinkReference<'_>> {
        self.links.iter().map(|link| LinkReference::parse(link))
    }
}

/// A dependency edge declared as `target:alias`.
///
/// Only the target participates in ordering; the alias is the hostname the
/// linking container sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkReference<'a> {
    /// Name of the container being linked to.
    pub target: &'a str,
    /// Alias inside the linking container, if given.
    pub alias: Option<&'a str>,
}

impl<'a> LinkReference<'a> {
    /// Splits a link on its first separator.
    #[must_use]
    pub fn parse(link: &'a str) -> Self {
        match link.split_once(LINK_SEPARATOR) {
            Some((target, alias)) => Self {
                target,
                alias: Some(alias),
            },
            None => Self {
                target: link,
                alias: None,
            },
        }
    }
}

/// Registry credentials passed along with a pull.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Registry user name.
    pub username: String,
    /// Registry password or token.
    pub password: String,
    /// Account e-mail, for registries that still ask for it.
    pub email: String,
    /// Registry address; empty means the default registry.
    pub server_address: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .field("server_address", &self.server_address)
            .finish()
    }
}

/// The engine's report about a container.
///
/// The applied command and environment may be a superset of what was
/// requested: the engine merges the image's own defaults in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedContainer {
    /// Engine-assigned identifier.
    pub id: ContainerId,
    /// Container name.
    pub name: String,
    /// Current lifecycle status.
    pub status: ContainerStatus,
    /// Content ID of the image the container was created from.
    pub image: ImageId,
    /// Applied image-level configuration.
    pub config: ContainerConfig,
    /// Applied host configuration.
    pub host_config: HostConfig,
    /// Mounted volumes, keyed by destination path, valued by source.
    pub volumes: BTreeMap<String, String>,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
}

impl ObservedContainer {
    /// Returns whether the container is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.status.is_running()
    }

    /// Flattens the volume map into `source:destination` strings, the
    /// same shape as a desired bind.
    #[must_use]
    pub fn bind_strings(&self) -> Vec<String> {
        self.volumes
            .iter()
            .map(|(destination, source)| format!("{source}{BIND_SEPARATOR}{destination}"))
            .collect()
    }
}

/// An entry in the engine's local image catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Content identifier.
    pub id: ImageId,
    /// Human-readable tags pointing at this image.
    pub repo_tags: Vec<String>,
}

impl ImageRecord {
    /// Returns whether `reference` is one of this image's tags.
    #[must_use]
    pub fn has_tag(&self, reference: &str) -> bool {
        self.repo_tags.iter().any(|t| t == reference)
    }
}
