//! `convoy down|create|delete|restart|kill|pull` — Run one verb over services.

use super::{GlobalArgs, ServiceArgs, Session};

/// Lifecycle verbs that need nothing beyond a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Stop services.
    Down,
    /// Create without starting.
    Create,
    /// Remove containers.
    Delete,
    /// Restart.
    Restart,
    /// Kill.
    Kill,
    /// Pull images.
    Pull,
}

/// Executes a lifecycle verb.
///
/// # Errors
///
/// Returns an error if the project cannot be loaded or a service fails.
pub async fn execute(global: &GlobalArgs, verb: Verb, args: &ServiceArgs) -> anyhow::Result<()> {
    let session = Session::open(global)?;
    let services = args.names();
    let project = &session.project;

    tracing::debug!(?verb, ?services, "running verb");
    let result = match verb {
        Verb::Down => project.down(&services).await,
        Verb::Create => project.create(&services).await,
        Verb::Delete => project.delete(&services).await,
        Verb::Restart => project.restart(&services).await,
        Verb::Kill => project.kill(&services).await,
        Verb::Pull => project.pull(&services).await,
    };

    session.close().await;
    Ok(result?)
}
