//! `convoy logs` — Print service logs.

use super::{GlobalArgs, ServiceArgs, Session};

/// Executes the `logs` command.
///
/// # Errors
///
/// Returns an error if the project cannot be loaded or logs are unavailable.
pub async fn execute(global: &GlobalArgs, args: &ServiceArgs) -> anyhow::Result<()> {
    let session = Session::open(global)?;
    let result = session.project.log(&args.names()).await;
    session.close().await;
    Ok(result?)
}
