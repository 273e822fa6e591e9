//! `convoy ps` — List services' containers.

use clap::Args;

use super::{GlobalArgs, ServiceArgs, Session};
use crate::output::format_state;

/// Arguments for the `ps` command.
#[derive(Args, Debug)]
pub struct PsArgs {
    /// Show stopped containers too.
    #[arg(short, long)]
    pub all: bool,

    /// Services to list.
    #[command(flatten)]
    pub selection: ServiceArgs,
}

/// Executes the `ps` command.
///
/// # Errors
///
/// Returns an error if the project cannot be loaded or the backend fails.
pub async fn execute(global: &GlobalArgs, args: &PsArgs) -> anyhow::Result<()> {
    let session = Session::open(global)?;
    let listing = session.project.containers(&args.selection.names()).await;
    session.close().await;

    let rows: Vec<_> = listing?
        .into_iter()
        .flat_map(|(service, containers)| containers.into_iter().map(move |c| (service.clone(), c)))
        .filter(|(_, c)| args.all || c.state.is_running())
        .collect();

    if rows.is_empty() {
        println!("No containers found.");
        return Ok(());
    }

    println!("{:<14} {:<15} {:<25} {:<10}", "CONTAINER ID", "SERVICE", "NAME", "STATE");
    for (service, c) in &rows {
        println!(
            "{:<14} {:<15} {:<25} {}",
            c.id.short(),
            service,
            c.name,
            format_state(c.state)
        );
    }
    Ok(())
}
