//! Container backend abstraction.
//!
//! Backends are synchronous; the container service calls them from a
//! blocking task.

pub mod memory;
pub mod process;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use convoy_common::config::ConvoyConfig;
use convoy_common::error::Result;
use convoy_common::types::{ContainerId, ContainerState};

/// Configuration for creating a container.
#[derive(Debug, Clone, Default)]
pub struct ContainerConfig {
    /// Container name, unique within the backend.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Command line.
    pub command: Vec<String>,
    /// Environment variables.
    pub env: Vec<(String, String)>,
    /// Labels, including project and service ownership.
    pub labels: BTreeMap<String, String>,
}

/// Information about a tracked container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Unique identifier.
    pub id: ContainerId,
    /// Container name.
    pub name: String,
    /// Current state.
    pub state: ContainerState,
    /// PID of the main process, if running.
    pub pid: Option<u32>,
    /// Image reference.
    pub image: String,
    /// Container labels.
    pub labels: BTreeMap<String, String>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl ContainerInfo {
    /// Returns whether the container carries `key=value`.
    pub fn has_label(&self, key: &str, value: &str) -> bool {
        self.labels.get(key).is_some_and(|v| v == value)
    }
}

/// Platform-agnostic container backend.
pub trait ContainerBackend: Send + Sync {
    /// Creates a container from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the container cannot be created.
    fn create(&self, config: &ContainerConfig) -> Result<ContainerId>;

    /// Starts a created or stopped container, returning its PID if it has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown or cannot be started.
    fn start(&self, id: &ContainerId) -> Result<Option<u32>>;

    /// Stops a running container, allowing `grace` before forcing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown or cannot be stopped.
    fn stop(&self, id: &ContainerId, grace: Duration) -> Result<()>;

    /// Forcibly stops a running container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is unknown or cannot be killed.
    fn kill(&self, id: &ContainerId) -> Result<()>;

    /// Removes a container. Running containers are stopped first.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be removed.
    fn remove(&self, id: &ContainerId) -> Result<()>;

    /// Returns a container's logs.
    ///
    /// # Errors
    ///
    /// Returns an error if logs cannot be retrieved.
    fn logs(&self, id: &ContainerId) -> Result<String>;

    /// Lists all tracked containers.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot retrieve state.
    fn list(&self) -> Result<Vec<ContainerInfo>>;

    /// Makes `image` available locally.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be fetched.
    fn pull(&self, image: &str) -> Result<()>;

    /// Finds a container by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot retrieve state.
    fn find(&self, name: &str) -> Result<Option<ContainerInfo>> {
        Ok(self.list()?.into_iter().find(|c| c.name == name))
    }
}

/// Shared handle to a backend.
pub type SharedBackend = Arc<dyn ContainerBackend>;

/// Available backend implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Runs each service's command as a host process.
    #[default]
    Process,
    /// Keeps containers in memory; nothing is executed.
    Memory,
}

/// Opens the backend of the given kind.
#[must_use]
pub fn open_backend(kind: BackendKind, config: &ConvoyConfig) -> SharedBackend {
    match kind {
        BackendKind::Process => Arc::new(process::ProcessBackend::new(
            config.data_dir.clone(),
            config.state_file.clone(),
        )),
        BackendKind::Memory => Arc::new(memory::MemoryBackend::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_uses_list() {
        let backend = memory::MemoryBackend::new();
        let id = backend
            .create(&ContainerConfig {
                name: "web".into(),
                ..ContainerConfig::default()
            })
            .unwrap();

        assert_eq!(backend.find("web").unwrap().unwrap().id, id);
        assert!(backend.find("db").unwrap().is_none());
    }

    #[test]
    fn label_matching() {
        let info = ContainerInfo {
            id: ContainerId::new("x"),
            name: "x".into(),
            state: ContainerState::Created,
            pid: None,
            image: String::new(),
            labels: BTreeMap::from([("k".to_string(), "v".to_string())]),
            created_at: String::new(),
        };
        assert!(info.has_label("k", "v"));
        assert!(!info.has_label("k", "w"));
        assert!(!info.has_label("missing", "v"));
    }
}
