//! Desired-state manifest.
//!
//! ```yaml
//! images:
//!   - tag: postgres:16
//!     local: true
//!     entrypoint: [docker-entrypoint.sh]
//!     cmd: [postgres]
//! containers:
//!   - name: db
//!     image: postgres:16
//!     env: { POSTGRES_PASSWORD: secret }
//!     binds: ["/srv/pg:/var/lib/postgresql/data"]
//!   - name: api
//!     image: registry.example.com/api:3
//!     command: [serve, --port, "8080"]
//!     links: ["db:database"]
//!     remove_existing: true
//!     auth: { username: ci, password: token }
//! ```
//!
//! `images` only matters to `simulate`: it seeds the in-process engine.
//! Images referenced by a container but not listed are pullable with no
//! defaults.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use berth_common::error::{BerthError, Result};
use berth_engine::memory::{ImageDefaults, MemoryEngine};
use berth_engine::model::AuthConfig;
use berth_reconcile::spec::ContainerSpec;
use serde::Deserialize;

/// A parsed manifest file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Images known to the simulated engine.
    #[serde(default)]
    pub images: Vec<ImageEntry>,
    /// Desired containers.
    #[serde(default)]
    pub containers: Vec<ContainerEntry>,
}

/// An image the simulated engine knows about.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageEntry {
    /// Image tag.
    pub tag: String,
    /// Present locally before the run; otherwise only pullable.
    #[serde(default)]
    pub local: bool,
    /// Image entrypoint.
    #[serde(default)]
    pub entrypoint: Vec<String>,
    /// Image default command.
    #[serde(default)]
    pub cmd: Vec<String>,
    /// Image environment in `KEY=value` form.
    #[serde(default)]
    pub env: Vec<String>,
}

/// One desired container.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerEntry {
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Command arguments.
    #[serde(default)]
    pub command: Vec<String>,
    /// Environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Bind mounts in `source:destination[:mode]` form.
    #[serde(default)]
    pub binds: Vec<String>,
    /// DNS servers, in order.
    #[serde(default)]
    pub dns: Vec<String>,
    /// Links in `name:alias` form.
    #[serde(default)]
    pub links: Vec<String>,
    /// Replace the container when it differs from this entry.
    #[serde(default)]
    pub remove_existing: bool,
    /// Always replace the container.
    #[serde(default)]
    pub force_remove_existing: bool,
    /// Registry credentials for pulls.
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

impl Manifest {
    /// Reads and parses a manifest file.
    ///
    /// # Errors
    ///
    /// Returns `BerthError::Io` if the file cannot be read and
    /// `BerthError::Yaml` if it is not a valid manifest.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| BerthError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = Self::parse(&content)?;
        tracing::debug!(
            path = %path.display(),
            containers = manifest.containers.len(),
            images = manifest.images.len(),
            "manifest loaded"
        );
        Ok(manifest)
    }

    /// Parses a manifest from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `BerthError::Yaml` if the text is not a valid manifest and
    /// `BerthError::Config` if an image tag is listed twice.
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Self = serde_yaml::from_str(content)?;
        let mut seen = BTreeSet::new();
        let duplicate = manifest
            .images
            .iter()
            .find(|i| !seen.insert(i.tag.as_str()))
            .map(|i| i.tag.clone());
        if let Some(tag) = duplicate {
            return Err(BerthError::Config {
                message: format!("image {tag} is listed more than once"),
            });
        }
        Ok(manifest)
    }

    /// Builds a spec for every container entry.
    ///
    /// # Errors
    ///
    /// Returns the first entry rejected by the spec builder.
    pub fn specs(&self) -> berth_reconcile::error::Result<Vec<ContainerSpec>> {
        self.containers.iter().map(ContainerEntry::to_spec).collect()
    }

    /// Creates an in-process engine holding the manifest's images.
    #[must_use]
    pub fn seed_engine(&self) -> MemoryEngine {
        let listed: BTreeSet<&str> = self.images.iter().map(|i| i.tag.as_str()).collect();
        let unlisted: BTreeSet<&str> = self
            .containers
            .iter()
            .map(|c| c.image.as_str())
            .filter(|image| !listed.contains(image))
            .collect();

        let engine = self.images.iter().fold(MemoryEngine::new(), |engine, image| {
            let defaults = ImageDefaults {
                entrypoint: image.entrypoint.clone(),
                cmd: image.cmd.clone(),
                env: image.env.clone(),
            };
            if image.local {
                engine.with_local_image(&image.tag, defaults)
            } else {
                engine.with_registry_image(&image.tag, defaults)
            }
        });
        unlisted.into_iter().fold(engine, |engine, image| {
            engine.with_registry_image(image, ImageDefaults::default())
        })
    }
}

impl ContainerEntry {
    /// Builds a validated spec from this entry.
    ///
    /// # Errors
    ///
    /// Returns the first option rejected by the builder.
    pub fn to_spec(&self) -> berth_reconcile::error::Result<ContainerSpec> {
        let mut builder = ContainerSpec::builder()
            .name(&self.name)
            .image(&self.image)
            .command(&self.command)
            .remove_existing(self.remove_existing)
            .force_remove_existing(self.force_remove_existing);
        for (key, value) in &self.env {
            builder = builder.env(key, value);
        }
        for bind in &self.binds {
            builder = builder.bind(bind);
        }
        for server in &self.dns {
            builder = builder.dns(server);
        }
        for link in &self.links {
            builder = builder.link(link);
        }
        if let Some(auth) = &self.auth {
            builder = builder.auth_config(auth.clone());
        }
        builder.build()
    }
}
