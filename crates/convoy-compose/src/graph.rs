//! Static dependency graph built with `petgraph`.
//!
//! The orchestrator derives edges dynamically while it runs; this graph is
//! the offline view of the same edges, used to preview a deployment order
//! and to report mandatory cycles before anything is started. Optional
//! edges are left out because the orchestrator may break them.

use std::collections::{BTreeMap, HashMap};

use convoy_common::error::{ConvoyError, Result};
use petgraph::graph::NodeIndex;

use crate::relationship::{self, ServiceRelationship};
use crate::service::ServiceConfig;

/// A dependency graph of services.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: petgraph::Graph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: petgraph::Graph::new(),
            nodes: HashMap::new(),
        }
    }

    /// Builds the graph of mandatory edges for a set of service definitions.
    ///
    /// Edges to services that are not defined are ignored.
    #[must_use]
    pub fn from_configs(configs: &BTreeMap<String, ServiceConfig>) -> Self {
        let mut graph = Self::new();
        for name in configs.keys() {
            let _ = graph.add_service(name);
        }
        for (name, config) in configs {
            for rel in relationship::default_dependent_services(config) {
                graph.add_relationship(name, &rel);
            }
        }
        graph
    }

    /// Adds a service node, returning the existing node if already present.
    pub fn add_service(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        let _ = self.nodes.insert(name.to_string(), idx);
        idx
    }

    /// Adds a dependency edge: `dependent` depends on `dependency`.
    ///
    /// The graph edge points from `dependency` to `dependent`
    /// so that topological sort yields dependencies first.
    pub fn add_dependency(&mut self, dependent: NodeIndex, dependency: NodeIndex) {
        let _ = self.graph.add_edge(dependency, dependent, ());
    }

    /// Adds the edge described by `rel` unless it is optional or dangling.
    pub fn add_relationship(&mut self, dependent: &str, rel: &ServiceRelationship) {
        if rel.optional {
            return;
        }
        let (Some(&from), Some(&to)) = (self.nodes.get(dependent), self.nodes.get(&rel.target))
        else {
            tracing::debug!(service = dependent, target = %rel.target, "dangling dependency");
            return;
        };
        self.add_dependency(from, to);
    }

    /// Returns the direct mandatory dependencies of a service.
    #[must_use]
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        let Some(&idx) = self.nodes.get(name) else {
            return Vec::new();
        };
        let mut deps: Vec<String> = self
            .graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        deps.sort();
        deps.dedup();
        deps
    }

    /// Returns a topological ordering of services for deployment.
    ///
    /// Dependencies appear before the services that depend on them.
    ///
    /// # Errors
    ///
    /// Returns an error naming a service on the cycle if the graph is cyclic.
    pub fn resolve_order(&self) -> Result<Vec<String>> {
        match petgraph::algo::toposort(&self.graph, None) {
            Ok(indices) => Ok(indices
                .iter()
                .filter_map(|&idx| self.graph.node_weight(idx).cloned())
                .collect()),
            Err(cycle) => {
                let name = self
                    .graph
                    .node_weight(cycle.node_id())
                    .cloned()
                    .unwrap_or_default();
                Err(ConvoyError::Config {
                    message: format!("cyclic dependency detected at service \"{name}\""),
                })
            }
        }
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
