//! Host-process backend.
//!
//! A "container" is a record in the state index plus, while running, a
//! host process executing the service's command. Output is appended to a
//! per-container log file under the data directory.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use convoy_common::error::{ConvoyError, Result};
use convoy_common::types::{ContainerId, ContainerState};

use super::{ContainerBackend, ContainerConfig, ContainerInfo};
use crate::state::{self, StateEntry, StateIndex};
use crate::{logs, process};

/// Backend that runs service commands as host processes.
#[derive(Debug)]
pub struct ProcessBackend {
    data_dir: PathBuf,
    state_file: PathBuf,
    index_lock: Mutex<()>,
}

impl ProcessBackend {
    /// Creates a backend storing logs under `data_dir` and state in `state_file`.
    #[must_use]
    pub const fn new(data_dir: PathBuf, state_file: PathBuf) -> Self {
        Self {
            data_dir,
            state_file,
            index_lock: Mutex::new(()),
        }
    }

    /// Runs `f` on the state index and persists the result.
    fn update<T>(&self, f: impl FnOnce(&mut StateIndex) -> Result<T>) -> Result<T> {
        let _guard = self.lock();
        let mut index = state::load_state(&self.state_file)?;
        let out = f(&mut index)?;
        state::save_state(&self.state_file, &index)?;
        Ok(out)
    }

    fn load(&self) -> Result<StateIndex> {
        let _guard = self.lock();
        state::load_state(&self.state_file)
    }

    /// PID of a container whose process is still alive.
    fn live_pid(&self, id: &ContainerId) -> Result<Option<u32>> {
        let index = self.load()?;
        let entry = index.get(id).ok_or_else(|| not_found(id))?;
        Ok(entry.pid.filter(|pid| process::is_alive(*pid)))
    }

    fn mark_stopped(&self, id: &ContainerId) -> Result<()> {
        self.update(|index| {
            let entry = index.require_mut(id)?;
            entry.state = ContainerState::Stopped;
            entry.pid = None;
            Ok(())
        })
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.index_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContainerBackend for ProcessBackend {
    fn create(&self, config: &ContainerConfig) -> Result<ContainerId> {
        let id = ContainerId::generate();
        self.update(|index| {
            if index.containers.iter().any(|e| e.name == config.name) {
                return Err(ConvoyError::Backend {
                    message: format!("container name {} already in use", config.name),
                });
            }
            index.containers.push(StateEntry {
                id: id.clone(),
                name: config.name.clone(),
                state: ContainerState::Created,
                pid: None,
                image: config.image.clone(),
                command: config.command.clone(),
                env: config.env.clone(),
                labels: config.labels.clone(),
                created_at: chrono::Utc::now().to_rfc3339(),
            });
            Ok(())
        })?;
        tracing::info!(id = %id, name = %config.name, "created container");
        Ok(id)
    }

    fn start(&self, id: &ContainerId) -> Result<Option<u32>> {
        let pid = self.update(|index| {
            let entry = index.require_mut(id)?;
            if let Some(pid) = entry.pid.filter(|pid| process::is_alive(*pid)) {
                return Ok(pid);
            }
            let log = logs::open_log(&self.data_dir, id.as_str())?;
            let pid = process::spawn_service_process(&entry.command, &entry.env, &log)?;
            entry.pid = Some(pid);
            entry.state = ContainerState::Running;
            Ok(pid)
        })?;
        tracing::info!(id = %id, pid, "started container");
        Ok(Some(pid))
    }

    fn stop(&self, id: &ContainerId, grace: Duration) -> Result<()> {
        if let Some(pid) = self.live_pid(id)? {
            process::terminate(pid, grace)?;
        }
        self.mark_stopped(id)?;
        tracing::info!(id = %id, "stopped container");
        Ok(())
    }

    fn kill(&self, id: &ContainerId) -> Result<()> {
        if let Some(pid) = self.live_pid(id)? {
            process::kill_process(pid)?;
        }
        self.mark_stopped(id)?;
        tracing::info!(id = %id, "killed container");
        Ok(())
    }

    fn remove(&self, id: &ContainerId) -> Result<()> {
        if let Some(pid) = self.live_pid(id)? {
            process::kill_process(pid)?;
        }
        self.update(|index| {
            index.containers.retain(|e| e.id != *id);
            Ok(())
        })?;
        logs::remove_log(&self.data_dir, id.as_str())?;
        tracing::info!(id = %id, "removed container");
        Ok(())
    }

    fn logs(&self, id: &ContainerId) -> Result<String> {
        logs::read_logs(&self.data_dir, id.as_str())
    }

    fn list(&self) -> Result<Vec<ContainerInfo>> {
        Ok(self
            .load()?
            .containers
            .into_iter()
            .map(|e| {
                let alive = e.pid.is_some_and(process::is_alive);
                let state = if e.state.is_running() && !alive {
                    ContainerState::Stopped
                } else {
                    e.state
                };
                ContainerInfo {
                    id: e.id,
                    name: e.name,
                    state,
                    pid: e.pid.filter(|_| alive),
                    image: e.image,
                    labels: e.labels,
                    created_at: e.created_at,
                }
            })
            .collect())
    }

    fn pull(&self, image: &str) -> Result<()> {
        tracing::debug!(image, "process backend runs host commands, nothing to pull");
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

    fn backend(dir: &std::path::Path) -> ProcessBackend {
        ProcessBackend::new(dir.to_path_buf(), dir.join("state.json"))
    }

    fn config(name: &str, command: &[&str]) -> ContainerConfig {
        ContainerConfig {
            name: name.into(),
            image: "host".into(),
            command: command.iter().map(ToString::to_string).collect(),
            ..ContainerConfig::default()
        }
    }

    #[test]
    fn create_persists_to_index() {
        let dir = tempfile::tempdir().unwrap();
        let id = backend(dir.path()).create(&config("web", &["true"])).unwrap();

        let reopened = backend(dir.path());
        let listed = reopened.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(listed[0].state, ContainerState::Created);
        assert!(reopened.create(&config("web", &["true"])).is_err());
    }

    #[test]
    fn start_stop_remove() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path());
        let id = backend.create(&config("sleeper", &["sleep", "30"])).unwrap();

        let pid = backend.start(&id).unwrap().unwrap();
        assert_eq!(backend.start(&id).unwrap(), Some(pid));
        assert!(backend.list().unwrap()[0].state.is_running());

        backend.stop(&id, Duration::from_secs(5)).unwrap();
        let info = backend.find("sleeper").unwrap().unwrap();
        assert_eq!(info.state, ContainerState::Stopped);
        assert!(info.pid.is_none());

        backend.remove(&id).unwrap();
        assert!(backend.list().unwrap().is_empty());
    }

    #[test]
    fn exited_process_lists_as_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path());
        let id = backend.create(&config("echo", &["echo", "hi"])).unwrap();
        let pid = backend.start(&id).unwrap().unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while process::is_alive(pid) && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }

        assert_eq!(backend.list().unwrap()[0].state, ContainerState::Stopped);
        assert_eq!(backend.logs(&id).unwrap(), "hi\n");
    }

    #[test]
    fn unknown_container_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = backend(dir.path());
        assert!(matches!(
            backend.stop(&ContainerId::new("ghost"), Duration::ZERO),
            Err(ConvoyError::NotFound { .. })
        ));
    }
}
