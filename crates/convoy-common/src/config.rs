//! Global configuration model for the Convoy orchestrator.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConvoyError, Result};

/// Root configuration for a Convoy run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvoyConfig {
    /// Project name used to label containers.
    pub project_name: String,
    /// Base directory for Convoy state and logs.
    pub data_dir: PathBuf,
    /// Path to the container state index file.
    pub state_file: PathBuf,
    /// Services that are only pretended to be created, never run.
    pub disabled: Vec<String>,
}

impl Default for ConvoyConfig {
    fn default() -> Self {
        Self {
            project_name: crate::constants::DEFAULT_PROJECT_NAME.to_string(),
            data_dir: crate::constants::data_dir().clone(),
            state_file: crate::constants::default_state_file(),
            disabled: Vec::new(),
        }
    }
}

impl ConvoyConfig {
    /// Creates a configuration rooted at the given data directory.
    #[must_use]
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            state_file: data_dir.join("state.json"),
            data_dir,
            ..Self::default()
        }
    }

    /// Loads a configuration file, falling back to defaults for missing keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConvoyError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Returns whether the named service is disabled.
    #[must_use]
    pub fn is_disabled(&self, service: &str) -> bool {
        self.disabled.iter().any(|s| s == service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_data_dir_places_state_inside() {
        let cfg = ConvoyConfig::with_data_dir("/tmp/convoy-test");
        assert_eq!(cfg.state_file, PathBuf::from("/tmp/convoy-test/state.json"));
        assert_eq!(cfg.project_name, "convoy");
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: ConvoyConfig =
            serde_yaml::from_str("project_name: os\ndisabled: [ntp]\n").unwrap();
        assert_eq!(cfg.project_name, "os");
        assert!(cfg.is_disabled("ntp"));
        assert!(!cfg.is_disabled("console"));
    }
}
