//! In-memory backend.
//!
//! Tracks container state transitions without executing anything. Used by
//! `--backend memory` dry runs and by tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use convoy_common::error::{ConvoyError, Result};
use convoy_common::types::{ContainerId, ContainerState};

use super::{ContainerBackend, ContainerConfig, ContainerInfo};

/// Backend holding containers in a map.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    containers: BTreeMap<ContainerId, ContainerInfo>,
    logs: BTreeMap<ContainerId, Vec<String>>,
    pulled: Vec<String>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Images pulled so far, in order.
    pub fn pulled(&self) -> Vec<String> {
        self.lock().pulled.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, id: &ContainerId, to: ContainerState, line: &str) -> Result<()> {
        let mut state = self.lock();
        let info = state.containers.get_mut(id).ok_or_else(|| not_found(id))?;
        info.state = to;
        state.logs.entry(id.clone()).or_default().push(line.to_string());
        Ok(())
    }
}

impl ContainerBackend for MemoryBackend {
    fn create(&self, config: &ContainerConfig) -> Result<ContainerId> {
        let mut state = self.lock();
        if state.containers.values().any(|c| c.name == config.name) {
            return Err(ConvoyError::Backend {
                message: format!("container name {} already in use", config.name),
            });
        }

        let id = ContainerId::generate();
        let _ = state.containers.insert(
            id.clone(),
            ContainerInfo {
                id: id.clone(),
                name: config.name.clone(),
                state: ContainerState::Created,
                pid: None,
                image: config.image.clone(),
                labels: config.labels.clone(),
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        );
        tracing::debug!(id = %id, name = %config.name, "created in-memory container");
        Ok(id)
    }

    fn start(&self, id: &ContainerId) -> Result<Option<u32>> {
        self.transition(id, ContainerState::Running, "started")?;
        Ok(None)
    }

    fn stop(&self, id: &ContainerId, _grace: Duration) -> Result<()> {
        self.transition(id, ContainerState::Stopped, "stopped")
    }

    fn kill(&self, id: &ContainerId) -> Result<()> {
        self.transition(id, ContainerState::Stopped, "killed")
    }

    fn remove(&self, id: &ContainerId) -> Result<()> {
        let mut state = self.lock();
        let _ = state.containers.remove(id).ok_or_else(|| not_found(id))?;
        let _ = state.logs.remove(id);
        Ok(())
    }

    fn logs(&self, id: &ContainerId) -> Result<String> {
        let state = self.lock();
        if !state.containers.contains_key(id) {
            return Err(not_found(id));
        }
        Ok(state
            .logs
            .get(id)
            .map(|lines| lines.iter().map(|l| format!("{l}\n")).collect())
            .unwrap_or_default())
    }

    fn list(&self) -> Result<Vec<ContainerInfo>> {
        Ok(self.lock().containers.values().cloned().collect())
    }

    fn pull(&self, image: &str) -> Result<()> {
        self.lock().pulled.push(image.to_string());
        Ok(())
    }
}

fn not_found(id: &ContainerId) -> ConvoyError {
    ConvoyError::NotFound {
        kind: "container",
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str) -> ContainerConfig {
        ContainerConfig {
            name: name.into(),
            image: "busybox".into(),
            ..ContainerConfig::default()
        }
    }

    #[test]
    fn lifecycle_transitions() {
        let backend = MemoryBackend::new();
        let id = backend.create(&config("web")).unwrap();
        assert_eq!(backend.list().unwrap()[0].state, ContainerState::Created);

        assert_eq!(backend.start(&id).unwrap(), None);
        assert!(backend.list().unwrap()[0].state.is_running());

        backend.stop(&id, Duration::ZERO).unwrap();
        assert_eq!(backend.list().unwrap()[0].state, ContainerState::Stopped);
        assert_eq!(backend.logs(&id).unwrap(), "started\nstopped\n");

        backend.remove(&id).unwrap();
        assert!(backend.list().unwrap().is_empty());
        assert!(matches!(backend.logs(&id), Err(ConvoyError::NotFound { .. })));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let backend = MemoryBackend::new();
        let _ = backend.create(&config("web")).unwrap();
        assert!(backend.create(&config("web")).is_err());
    }

    #[test]
    fn unknown_container_operations_fail() {
        let backend = MemoryBackend::new();
        let id = ContainerId::new("ghost");
        assert!(backend.start(&id).is_err());
        assert!(backend.kill(&id).is_err());
        assert!(backend.remove(&id).is_err());
    }

    #[test]
    fn pulls_are_recorded() {
        let backend = MemoryBackend::new();
        backend.pull("busybox").unwrap();
        backend.pull("nginx").unwrap();
        assert_eq!(backend.pulled(), vec!["busybox", "nginx"]);
    }
}
