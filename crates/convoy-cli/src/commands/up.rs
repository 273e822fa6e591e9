//! `convoy up` — Create and start services, then wait for Ctrl+C.

use std::sync::Arc;

use clap::Args;
use tokio::sync::Notify;

use super::{GlobalArgs, ServiceArgs, Session};

/// Arguments for the `up` command.
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Return once services are up instead of waiting for Ctrl+C.
    #[arg(short, long)]
    pub detach: bool,

    /// Services to start.
    #[command(flatten)]
    pub selection: ServiceArgs,
}

/// Executes the `up` command.
///
/// Without `--detach`, waits for Ctrl+C and then stops the same services.
///
/// # Errors
///
/// Returns an error if the project cannot be loaded or services fail.
pub async fn execute(global: &GlobalArgs, args: UpArgs) -> anyhow::Result<()> {
    let session = Session::open(global)?;
    let services = args.selection.names();

    let result = session.project.up(&services).await;
    if result.is_err() || args.detach {
        session.close().await;
        return Ok(result?);
    }

    let shutdown = Arc::new(Notify::new());
    let signal = Arc::clone(&shutdown);
    ctrlc::set_handler(move || signal.notify_one())
        .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {e}"))?;

    eprintln!("  Press Ctrl+C to stop...");
    shutdown.notified().await;

    let result = session.project.down(&services).await;
    session.close().await;
    Ok(result?)
}
