//! Persistent state index.
//!
//! A JSON document listing every container the process backend manages,
//! so `down` and `ps` work from a fresh invocation.

use std::collections::BTreeMap;
use std::path::Path;

use convoy_common::error::{ConvoyError, Result};
use convoy_common::types::{ContainerId, ContainerState};
use serde::{Deserialize, Serialize};

/// Persistent record of one container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    /// Container identifier.
    pub id: ContainerId,
    /// Container name.
    pub name: String,
    /// Current lifecycle state.
    pub state: ContainerState,
    /// PID of the service process, while running.
    pub pid: Option<u32>,
    /// Image reference the container was created from.
    pub image: String,
    /// Command line.
    pub command: Vec<String>,
    /// Environment passed to the process.
    #[serde(default)]
    pub env: Vec<(String, String)>,
    /// Container labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

/// The whole index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateIndex {
    /// Known containers.
    pub containers: Vec<StateEntry>,
}

impl StateIndex {
    /// Finds a container by id.
    pub fn get(&self, id: &ContainerId) -> Option<&StateEntry> {
        self.containers.iter().find(|e| e.id == *id)
    }

    /// Finds a container by id, mutably.
    pub fn get_mut(&mut self, id: &ContainerId) -> Option<&mut StateEntry> {
        self.containers.iter_mut().find(|e| e.id == *id)
    }

    /// Like [`get_mut`](Self::get_mut), failing with `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns an error if no container has this id.
    pub fn require_mut(&mut self, id: &ContainerId) -> Result<&mut StateEntry> {
        self.get_mut(id).ok_or_else(|| ConvoyError::NotFound {
            kind: "container",
            id: id.to_string(),
        })
    }
}

/// Loads the state index from disk. A missing file is an empty index.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_state(path: &Path) -> Result<StateIndex> {
    tracing::debug!(path = %path.display(), "loading state index");
    if !path.exists() {
        return Ok(StateIndex::default());
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConvoyError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    if content.trim().is_empty() {
        return Ok(StateIndex::default());
    }
    Ok(serde_json::from_str(&content)?)
}

/// Persists the state index to disk atomically.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_state(path: &Path, index: &StateIndex) -> Result<()> {
    tracing::debug!(path = %path.display(), containers = index.containers.len(), "saving state index");
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConvoyError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let tmp = path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(index)?;
    std::fs::write(&tmp, content).map_err(|e| ConvoyError::Io {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| ConvoyError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
