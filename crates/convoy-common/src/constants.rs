//! System-wide constants, default paths, and well-known label keys.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Default base directory for Convoy data on Linux with root access.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/convoy";

/// Returns the data directory, preferring `$HOME/.convoy` for non-root
/// or non-Linux environments, falling back to `/var/lib/convoy`.
fn resolve_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
        let user_dir = PathBuf::from(home).join(".convoy");
        if std::fs::create_dir_all(&user_dir).is_ok() {
            return user_dir;
        }
    }
    PathBuf::from(SYSTEM_DATA_DIR)
}

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved data directory for this session.
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(resolve_data_dir)
}

/// Returns the default state file path.
pub fn default_state_file() -> PathBuf {
    data_dir().join("state.json")
}

/// Default compose file looked up by the CLI.
pub const DEFAULT_COMPOSE_FILE: &str = "convoy.yml";

/// Default project name when none is configured.
pub const DEFAULT_PROJECT_NAME: &str = "convoy";

/// Grace period granted to a service process between SIGTERM and SIGKILL.
pub const STOP_GRACE_PERIOD_SECS: u64 = 10;

/// Capacity of listener channels created by the default event listener.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Data key carrying the container id in container events.
pub const CONTAINER_ID: &str = "container_id";

/// Label listing services (comma separated) this service must start after.
pub const LABEL_AFTER: &str = "io.convoy.after";

/// Label listing services (comma separated) that must start after this one.
pub const LABEL_BEFORE: &str = "io.convoy.before";

/// Label that makes a successful `up`/`create` request a project reload.
pub const LABEL_RELOAD_CONFIG: &str = "io.convoy.reload_config";

/// Label that makes `up` only create the container without starting it.
pub const LABEL_CREATE_ONLY: &str = "io.convoy.create_only";

/// Label recording the project a container belongs to.
pub const LABEL_PROJECT: &str = "io.convoy.project";

/// Label recording the service a container belongs to.
pub const LABEL_SERVICE: &str = "io.convoy.service";

/// Application name used in CLI output and state files.
pub const APP_NAME: &str = "convoy";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "convoy";
