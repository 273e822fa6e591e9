//! Dependency edges between services.
//!
//! Edges are derived on demand from a service's configuration rather than
//! stored in a static graph, because ordering labels can add edges that no
//! container link expresses.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use convoy_common::constants::{LABEL_AFTER, LABEL_BEFORE};

use crate::reference::{self, SourceKind};
use crate::service::ServiceConfig;

/// Why one service depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// A container link or an ordering hint.
    Link,
    /// Volumes mounted from the target.
    VolumesFrom,
    /// Shares the target's IPC namespace.
    IpcNamespace,
    /// Shares the target's network namespace.
    NetNamespace,
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link => write!(f, "link"),
            Self::VolumesFrom => write!(f, "volumes_from"),
            Self::IpcNamespace => write!(f, "ipc"),
            Self::NetNamespace => write!(f, "net"),
        }
    }
}

/// A directed edge: the owning service depends on `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRelationship {
    /// Name of the service depended upon.
    pub target: String,
    /// Alias under which the target is linked, if any.
    pub alias: Option<String>,
    /// Kind of dependency.
    pub kind: RelationshipKind,
    /// Whether the edge may be broken to resolve a cycle.
    pub optional: bool,
}

impl ServiceRelationship {
    /// Creates a mandatory relationship to `target`.
    #[must_use]
    pub fn new(target: impl Into<String>, kind: RelationshipKind) -> Self {
        Self {
            target: target.into(),
            alias: None,
            kind,
            optional: false,
        }
    }

    /// Marks the relationship as optional.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Derives the edges expressed directly by a service's configuration.
///
/// Malformed references are logged and skipped. `volumes_from` entries that
/// name an external container do not produce an edge.
#[must_use]
pub fn default_dependent_services(config: &ServiceConfig) -> Vec<ServiceRelationship> {
    let mut rels = Vec::new();

    for link in &config.links {
        match reference::parse_link(link) {
            Ok(parsed) => rels.push(ServiceRelationship {
                target: parsed.target,
                alias: parsed.alias,
                kind: RelationshipKind::Link,
                optional: false,
            }),
            Err(e) => tracing::warn!(link = %link, error = %e, "skipping link"),
        }
    }

    for entry in &config.volumes_from {
        match reference::parse_volumes_from(entry) {
            Ok(parsed) if parsed.kind == SourceKind::Service => {
                rels.push(ServiceRelationship::new(
                    parsed.target,
                    RelationshipKind::VolumesFrom,
                ));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(volumes_from = %entry, error = %e, "skipping volumes_from"),
        }
    }

    if let Some(target) = config.net.as_deref().and_then(reference::parse_namespace) {
        rels.push(ServiceRelationship::new(target, RelationshipKind::NetNamespace));
    }
    if let Some(target) = config.ipc.as_deref().and_then(reference::parse_namespace) {
        rels.push(ServiceRelationship::new(target, RelationshipKind::IpcNamespace));
    }

    rels
}

/// Computes the ordering edges implied by `after`/`before` labels.
///
/// `io.convoy.after: a,b` on service `s` makes `s` depend on `a` and `b`;
/// `io.convoy.before: x` on service `s` makes `x` depend on `s`. Edges that
/// name services missing from `configs` are dropped. The returned map lists,
/// per service, the targets it must wait for.
#[must_use]
pub fn ordering_dependencies(
    configs: &BTreeMap<String, ServiceConfig>,
) -> HashMap<String, Vec<String>> {
    let mut deps: HashMap<String, Vec<String>> = HashMap::new();

    for (name, config) in configs {
        for after in config.label_list(LABEL_AFTER) {
            if configs.contains_key(&after) && after != *name {
                push_unique(deps.entry(name.clone()).or_default(), after);
            }
        }
        for before in config.label_list(LABEL_BEFORE) {
            if configs.contains_key(&before) && before != *name {
                push_unique(deps.entry(before).or_default(), name.clone());
            }
        }
    }

    deps
}

/// Appends `target` as an optional link unless an edge to it already exists.
pub fn append_optional_link(rels: &mut Vec<ServiceRelationship>, target: &str) {
    if rels.iter().any(|r| r.target == target) {
        return;
    }
    rels.push(ServiceRelationship::new(target, RelationshipKind::Link).optional());
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_labels(labels: &[(&str, &str)]) -> ServiceConfig {
        ServiceConfig {
            labels: labels
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            ..ServiceConfig::default()
        }
    }

    #[test]
    fn links_volumes_and_namespaces_produce_edges() {
        let cfg = ServiceConfig {
            links: vec!["db:database".into()],
            volumes_from: vec!["data:ro".into(), "container:external".into()],
            net: Some("container:network".into()),
            ipc: Some("host".into()),
            ..ServiceConfig::default()
        };
        let rels = default_dependent_services(&cfg);
        assert_eq!(rels.len(), 3);
        assert_eq!(rels[0].target, "db");
        assert_eq!(rels[0].alias.as_deref(), Some("database"));
        assert_eq!(rels[1].kind, RelationshipKind::VolumesFrom);
        assert_eq!(rels[2].kind, RelationshipKind::NetNamespace);
        assert!(rels.iter().all(|r| !r.optional));
    }

    #[test]
    fn malformed_links_are_dropped() {
        let cfg = ServiceConfig {
            links: vec!["a:b:c".into(), "ok".into()],
            ..ServiceConfig::default()
        };
        let rels = default_dependent_services(&cfg);
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].target, "ok");
    }

    #[test]
    fn after_and_before_labels_become_ordering_edges() {
        let mut configs = BTreeMap::new();
        let _ = configs.insert("console".into(), config_with_labels(&[(LABEL_AFTER, "network, ntp")]));
        let _ = configs.insert("network".into(), ServiceConfig::default());
        let _ = configs.insert("syslog".into(), config_with_labels(&[(LABEL_BEFORE, "network")]));

        let deps = ordering_dependencies(&configs);
        assert_eq!(deps["console"], vec!["network"]);
        assert_eq!(deps["network"], vec!["syslog"]);
        assert!(!deps.contains_key("syslog"));
    }

    #[test]
    fn optional_link_is_not_duplicated() {
        let mut rels = vec![ServiceRelationship::new("db", RelationshipKind::Link)];
        append_optional_link(&mut rels, "db");
        append_optional_link(&mut rels, "cache");
        assert_eq!(rels.len(), 2);
        assert!(!rels[0].optional);
        assert!(rels[1].optional);
    }
}
