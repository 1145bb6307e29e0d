//! Scripted engine for unit tests.
//!
//! Each operation answers through a closure given the 1-based number of the
//! call to that operation, so tests can script "fail the first create, then
//! succeed". Every call is logged.

use std::sync::Mutex;

use berth_common::types::ContainerId;
use berth_engine::model::{AuthConfig, ContainerConfig, HostConfig, ImageRecord, ObservedContainer};
use berth_engine::{ContainerEngine, EngineError, Result};

type Handler<T> = Box<dyn Fn(usize) -> Result<T> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Inspect(String),
    Create(String),
    Start(String),
    Remove { id: String, force: bool, volumes: bool },
    ListImages,
    Pull(String),
}

pub struct ScriptedEngine {
    inspect: Handler<ObservedContainer>,
    create: Handler<ContainerId>,
    start: Handler<()>,
    remove: Handler<()>,
    list_images: Handler<Vec<ImageRecord>>,
    pull: Handler<()>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            inspect: Box::new(|_| Err(EngineError::container_not_found("scripted"))),
            create: Box::new(|_| Ok(ContainerId::new("created"))),
            start: Box::new(|_| Ok(())),
            remove: Box::new(|_| Ok(())),
            list_images: Box::new(|_| Ok(Vec::new())),
            pull: Box::new(|_| Ok(())),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_inspect(mut self, f: impl Fn(usize) -> Result<ObservedContainer> + Send + Sync + 'static) -> Self {
        self.inspect = Box::new(f);
        self
    }

    pub fn on_create(mut self, f: impl Fn(usize) -> Result<ContainerId> + Send + Sync + 'static) -> Self {
        self.create = Box::new(f);
        self
    }

    pub fn on_start(mut self, f: impl Fn(usize) -> Result<()> + Send + Sync + 'static) -> Self {
        self.start = Box::new(f);
        self
    }

    pub fn on_remove(mut self, f: impl Fn(usize) -> Result<()> + Send + Sync + 'static) -> Self {
        self.remove = Box::new(f);
        self
    }

    pub fn on_list_images(
        mut self,
        f: impl Fn(usize) -> Result<Vec<ImageRecord>> + Send + Sync + 'static,
    ) -> Self {
        self.list_images = Box::new(f);
        self
    }

    pub fn on_pull(mut self, f: impl Fn(usize) -> Result<()> + Send + Sync + 'static) -> Self {
        self.pull = Box::new(f);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    /// Records `call` and returns how many calls of the same kind were made.
    fn record(&self, call: Call) -> usize {
        let mut calls = self.calls.lock().unwrap();
        let kind = std::mem::discriminant(&call);
        calls.push(call);
        calls.iter().filter(|c| std::mem::discriminant(*c) == kind).count()
    }
}

impl ContainerEngine for ScriptedEngine {
    fn inspect_container(&self, name: &str) -> Result<ObservedContainer> {
        let n = self.record(Call::Inspect(name.to_string()));
        (self.inspect)(n)
    }

    fn create_container(&self, _config: &ContainerConfig, name: &str) -> Result<ContainerId> {
        let n = self.record(Call::Create(name.to_string()));
        (self.create)(n)
    }

    fn start_container(&self, id: &ContainerId, _host_config: Option<&HostConfig>) -> Result<()> {
        let n = self.record(Call::Start(id.to_string()));
        (self.start)(n)
    }

    fn remove_container(&self, id: &ContainerId, force: bool, remove_volumes: bool) -> Result<()> {
        let n = self.record(Call::Remove {
            id: id.to_string(),
            force,
            volumes: remove_volumes,
        });
        (self.remove)(n)
    }

    fn list_images(&self) -> Result<Vec<ImageRecord>> {
        let n = self.record(Call::ListImages);
        (self.list_images)(n)
    }

    fn pull_image(&self, image: &str, _auth: Option<&AuthConfig>) -> Result<()> {
        let n = self.record(Call::Pull(image.to_string()));
        (self.pull)(n)
    }
}

/// A live container as the engine would report it.
pub fn observed(id: &str, image_id: &str, running: bool) -> ObservedContainer {
    use berth_common::types::{ContainerStatus, ImageId};

    ObservedContainer {
        id: ContainerId::new(id),
        name: id.to_string(),
        status: if running {
            ContainerStatus::Running
        } else {
            ContainerStatus::Exited
        },
        image: ImageId::new(image_id),
        config: ContainerConfig::default(),
        host_config: HostConfig::default(),
        volumes: std::collections::BTreeMap::new(),
        created_at: String::new(),
    }
}
