//! The per-service configuration record.
//!
//! A [`ServiceConfig`] is plain data: it is owned by the project, copied
//! whenever a service instance is constructed, and never mutated in place
//! by a running service.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Configuration of a single service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Explicit container name; defaults to the service name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Image reference.
    pub image: String,
    /// Command to run, as a list or a whitespace separated string.
    #[serde(deserialize_with = "string_or_list")]
    pub command: Vec<String>,
    /// Links to other services, `target[:alias]`.
    pub links: Vec<String>,
    /// Services or containers whose volumes are mounted, optionally with a mode.
    pub volumes_from: Vec<String>,
    /// Network mode; `container:<name>` shares another service's namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net: Option<String>,
    /// IPC mode; `container:<name>` shares another service's namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipc: Option<String>,
    /// Free-form labels, given as a mapping or a `key=value` list.
    #[serde(deserialize_with = "map_or_list")]
    pub labels: BTreeMap<String, String>,
    /// Environment as `KEY=VALUE` pairs or bare `KEY` names awaiting lookup.
    #[serde(deserialize_with = "env_map_or_list")]
    pub environment: Vec<String>,
}

impl ServiceConfig {
    /// Creates a configuration for the given image.
    #[must_use]
    pub fn with_image(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    /// Returns the value of a label, if set.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Returns whether a label is set to `true`.
    #[must_use]
    pub fn label_is_true(&self, key: &str) -> bool {
        self.label(key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Returns the comma separated entries of a label, trimmed and non-empty.
    #[must_use]
    pub fn label_list(&self, key: &str) -> Vec<String> {
        self.label(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the name the backing container should carry.
    #[must_use]
    pub fn container_name_or<'a>(&'a self, service: &'a str) -> &'a str {
        self.container_name.as_deref().unwrap_or(service)
    }

    /// Returns the environment as key/value pairs, skipping unresolved names.
    #[must_use]
    pub fn environment_pairs(&self) -> Vec<(String, String)> {
        self.environment
            .iter()
            .filter_map(|entry| entry.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    String(String),
    List(Vec<String>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MapOrList {
    Map(BTreeMap<String, serde_yaml::Value>),
    List(Vec<String>),
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<StringOrList>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(StringOrList::String(s)) => s.split_whitespace().map(str::to_string).collect(),
        Some(StringOrList::List(list)) => list,
    })
}

fn map_or_list<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<MapOrList>::deserialize(deserializer)? {
        None => BTreeMap::new(),
        Some(MapOrList::Map(map)) => map
            .into_iter()
            .map(|(k, v)| (k, scalar_to_string(&v).unwrap_or_default()))
            .collect(),
        Some(MapOrList::List(list)) => list
            .into_iter()
            .map(|entry| match entry.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (entry, String::new()),
            })
            .collect(),
    })
}

fn env_map_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<MapOrList>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(MapOrList::Map(map)) => map
            .into_iter()
            .map(|(k, v)| match scalar_to_string(&v) {
                Some(value) => format!("{k}={value}"),
                None => k,
            })
            .collect(),
        Some(MapOrList::List(list)) => list,
    })
}

/// Renders a YAML scalar as a string; `None` for null and non-scalars.
fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_accepts_string_and_list() {
        let a: ServiceConfig = serde_yaml::from_str("command: sh -c true").unwrap();
        let b: ServiceConfig = serde_yaml::from_str("command: [sh, -c, 'true']").unwrap();
        assert_eq!(a.command, vec!["sh", "-c", "true"]);
        assert_eq!(b.command, vec!["sh", "-c", "true"]);
    }

    #[test]
    fn labels_accept_map_with_scalars() {
        let cfg: ServiceConfig = serde_yaml::from_str(
            "labels:\n  io.convoy.reload_config: true\n  io.convoy.after: 'db, cache'\n",
        )
        .unwrap();
        assert!(cfg.label_is_true("io.convoy.reload_config"));
        assert_eq!(cfg.label_list("io.convoy.after"), vec!["db", "cache"]);
    }

    #[test]
    fn labels_accept_list() {
        let cfg: ServiceConfig = serde_yaml::from_str("labels: [a=1, b]").unwrap();
        assert_eq!(cfg.label("a"), Some("1"));
        assert_eq!(cfg.label("b"), Some(""));
        assert_eq!(cfg.label("c"), None);
    }

    #[test]
    fn environment_map_keeps_bare_names_for_null_values() {
        let cfg: ServiceConfig =
            serde_yaml::from_str("environment:\n  A: x\n  B:\n  C: 3\n").unwrap();
        assert_eq!(cfg.environment, vec!["A=x", "B", "C=3"]);
        assert_eq!(
            cfg.environment_pairs(),
            vec![("A".to_string(), "x".to_string()), ("C".to_string(), "3".to_string())]
        );
    }

    #[test]
    fn missing_fields_default() {
        let cfg: ServiceConfig = serde_yaml::from_str("image: busybox").unwrap();
        assert_eq!(cfg, ServiceConfig::with_image("busybox"));
        assert_eq!(cfg.container_name_or("web"), "web");
    }

    #[test]
    fn clone_is_independent_of_original() {
        let original = ServiceConfig {
            environment: vec!["A".into()],
            ..ServiceConfig::default()
        };
        let mut copy = original.clone();
        copy.environment.push("B=1".into());
        assert_eq!(original.environment, vec!["A"]);
    }
}
