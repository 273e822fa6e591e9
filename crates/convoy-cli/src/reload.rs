//! Configuration reload for restart rounds.
//!
//! When a service asks for a reload, the compose file is read again and
//! only definitions whose content hash changed are re-added to the project.

use std::path::PathBuf;

use convoy_common::error::Result;
use convoy_compose::loader::{self, service_hash};
use convoy_compose::service::ServiceConfig;
use convoy_project::Project;

/// Re-adds new or changed definitions. Returns how many were re-added.
pub fn apply_changes(project: &Project, services: Vec<(String, ServiceConfig)>) -> Result<usize> {
    let mut changed = 0;
    for (name, config) in services {
        let unchanged = match project.config(&name) {
            Some(current) => service_hash(&name, &current)? == service_hash(&name, &config)?,
            None => false,
        };
        if unchanged {
            continue;
        }
        tracing::info!(service = %name, "service definition changed");
        project.add_config(&name, config);
        changed += 1;
    }
    Ok(changed)
}

/// Returns a reload callback that re-reads `path`.
pub fn file_reloader(path: PathBuf) -> impl Fn(&Project) -> Result<()> + Send + Sync + 'static {
    move |project: &Project| {
        let changed = apply_changes(project, loader::load_file(&path)?)?;
        tracing::debug!(path = %path.display(), changed, "configuration reloaded");
        Ok(())
    }
}
