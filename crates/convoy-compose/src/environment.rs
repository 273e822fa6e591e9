//! Resolution of bare environment names at service construction time.
//!
//! A service may list `KEY` (or `KEY=`) in its environment without a value.
//! Such entries are looked up through an [`EnvironmentLookup`] when the
//! service is instantiated; entries that already carry a value are kept.

use std::collections::BTreeMap;

use crate::service::ServiceConfig;

/// Resolves a bare environment name into `KEY=VALUE` entries.
pub trait EnvironmentLookup: Send + Sync {
    /// Returns the entries `key` expands to for `service_name`.
    ///
    /// An empty result drops the variable.
    fn lookup(&self, key: &str, service_name: &str, config: &ServiceConfig) -> Vec<String>;
}

/// Lookup backed by an in-memory key/value table.
///
/// Keys may be scoped to a service as `service/KEY`; the scoped key wins
/// over the global one. A requested key ending in `*` expands to every
/// entry sharing that prefix.
#[derive(Debug, Clone, Default)]
pub struct MapEnvironmentLookup {
    values: BTreeMap<String, String>,
}

impl MapEnvironmentLookup {
    /// Creates a lookup over the given table.
    #[must_use]
    pub const fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    /// Creates a lookup over the current process environment.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self::new(std::env::vars().collect())
    }

    /// Inserts or replaces an entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let _ = self.values.insert(key.into(), value.into());
    }

    fn lookup_keys(&self, keys: &[String]) -> Vec<String> {
        for key in keys {
            if let Some(prefix) = key.strip_suffix('*') {
                let result: Vec<String> = self
                    .values
                    .range(prefix.to_string()..)
                    .take_while(|(k, _)| k.starts_with(prefix))
                    .map(|(k, v)| entry(k, v))
                    .collect();
                if !result.is_empty() {
                    return result;
                }
            } else if let Some(value) = self.values.get(key) {
                return vec![entry(key, value)];
            }
        }
        Vec::new()
    }
}

impl EnvironmentLookup for MapEnvironmentLookup {
    fn lookup(&self, key: &str, service_name: &str, _config: &ServiceConfig) -> Vec<String> {
        self.lookup_keys(&[format!("{service_name}/{key}"), key.to_string()])
    }
}

/// Formats an entry, dropping any `service/` scope from the key.
fn entry(key: &str, value: &str) -> String {
    let key = key.split_once('/').map_or(key, |(_, k)| k);
    format!("{key}={value}")
}

/// Rewrites `config.environment`, expanding entries that have no value.
pub fn resolve_environment(
    lookup: &dyn EnvironmentLookup,
    service_name: &str,
    config: &mut ServiceConfig,
) {
    let mut resolved = Vec::with_capacity(config.environment.len());
    for env in &config.environment {
        let key = match env.split_once('=') {
            Some((_, value)) if !value.is_empty() => {
                resolved.push(env.clone());
                continue;
            }
            Some((key, _)) => key,
            None => env.as_str(),
        };
        let values = lookup.lookup(key, service_name, config);
        if values.is_empty() {
            tracing::debug!(service = service_name, key, "environment variable not found");
        }
        resolved.extend(values);
    }
    config.environment = resolved;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLookup;

    impl EnvironmentLookup for FixedLookup {
        fn lookup(&self, key: &str, _service_name: &str, _config: &ServiceConfig) -> Vec<String> {
            vec![format!("{key}=X")]
        }
    }

    #[test]
    fn bare_and_empty_entries_are_resolved() {
        let mut cfg = ServiceConfig {
            environment: vec!["A".into(), "A=".into(), "A=B".into()],
            ..ServiceConfig::default()
        };
        resolve_environment(&FixedLookup, "foo", &mut cfg);
        assert_eq!(cfg.environment, vec!["A=X", "A=X", "A=B"]);
    }

    #[test]
    fn scoped_key_wins_over_global() {
        let mut lookup = MapEnvironmentLookup::default();
        lookup.set("HTTP_PROXY", "global");
        lookup.set("web/HTTP_PROXY", "scoped");
        let cfg = ServiceConfig::default();
        assert_eq!(lookup.lookup("HTTP_PROXY", "web", &cfg), vec!["HTTP_PROXY=scoped"]);
        assert_eq!(lookup.lookup("HTTP_PROXY", "db", &cfg), vec!["HTTP_PROXY=global"]);
    }

    #[test]
    fn wildcard_expands_prefix() {
        let mut lookup = MapEnvironmentLookup::default();
        lookup.set("ETCD_A", "1");
        lookup.set("ETCD_B", "2");
        lookup.set("OTHER", "3");
        let cfg = ServiceConfig::default();
        assert_eq!(
            lookup.lookup("ETCD_*", "svc", &cfg),
            vec!["ETCD_A=1", "ETCD_B=2"]
        );
    }

    #[test]
    fn missing_variable_is_dropped() {
        let lookup = MapEnvironmentLookup::default();
        let mut cfg = ServiceConfig {
            environment: vec!["MISSING".into(), "KEPT=1".into()],
            ..ServiceConfig::default()
        };
        resolve_environment(&lookup, "svc", &mut cfg);
        assert_eq!(cfg.environment, vec!["KEPT=1"]);
    }
}
