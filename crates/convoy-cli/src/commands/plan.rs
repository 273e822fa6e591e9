//! `convoy plan` — Show the start order without running anything.

use std::collections::BTreeMap;

use clap::Args;
use convoy_compose::graph::DependencyGraph;
use convoy_compose::relationship::ordering_dependencies;

use super::{GlobalArgs, read_compose};

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {}

/// Executes the `plan` command.
///
/// Builds the graph of mandatory edges, resolves a topological order and
/// prints it with each service's dependencies.
///
/// # Errors
///
/// Returns an error if the compose file is invalid or has a mandatory cycle.
pub fn execute(global: &GlobalArgs, _args: &PlanArgs) -> anyhow::Result<()> {
    let content = read_compose(&global.file)?;
    let configs: BTreeMap<_, _> = convoy_compose::loader::parse_services(&content)?
        .into_iter()
        .collect();

    let graph = DependencyGraph::from_configs(&configs);
    let order = graph.resolve_order()?;
    let ordering = ordering_dependencies(&configs);

    println!("Start plan for: {}", global.file.display());
    println!("{}", "\u{2550}".repeat(35));
    println!();

    for name in &order {
        let Some(config) = configs.get(name) else {
            continue;
        };
        println!("  + {name}");
        if !config.image.is_empty() {
            println!("      image: {}", config.image);
        }
        let deps = graph.dependencies_of(name);
        if !deps.is_empty() {
            println!("      after: {}", deps.join(", "));
        }
        if let Some(optional) = ordering.get(name) {
            println!("      after (optional): {}", optional.join(", "));
        }
    }

    println!();
    println!("  {} service(s) will be started.", order.len());
    Ok(())
}
