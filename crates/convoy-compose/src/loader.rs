//! Loading of compose YAML documents.
//!
//! Two layouts are accepted: a top-level mapping of service names to
//! definitions, or a versioned document with a `services` section.

use std::path::Path;

use convoy_common::error::{ConvoyError, Result};
use serde_yaml::Value;
use sha2::{Digest, Sha256};

use crate::service::ServiceConfig;

/// Parses a compose document into `(name, config)` pairs in document order.
///
/// # Errors
///
/// Returns an error if the document is not valid YAML, is not a mapping,
/// or a service definition has the wrong shape.
pub fn parse_services(content: &str) -> Result<Vec<(String, ServiceConfig)>> {
    let document: Value = serde_yaml::from_str(content)?;
    let services = match document {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(mut map) => {
            if map.contains_key("version") {
                match map.remove("services") {
                    Some(Value::Mapping(services)) => services,
                    Some(Value::Null) | None => return Ok(Vec::new()),
                    Some(_) => return Err(config_error("`services` must be a mapping")),
                }
            } else {
                map
            }
        }
        _ => return Err(config_error("compose document must be a mapping")),
    };

    let mut parsed = Vec::with_capacity(services.len());
    for (key, value) in services {
        let Value::String(name) = key else {
            return Err(config_error("service names must be strings"));
        };
        let config: ServiceConfig = if value.is_null() {
            ServiceConfig::default()
        } else {
            serde_yaml::from_value(value)?
        };
        parsed.push((name, config));
    }
    tracing::debug!(count = parsed.len(), "parsed compose document");
    Ok(parsed)
}

/// Reads and parses a compose file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_file(path: &Path) -> Result<Vec<(String, ServiceConfig)>> {
    tracing::info!(path = %path.display(), "loading compose file");
    let content = std::fs::read_to_string(path).map_err(|e| ConvoyError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_services(&content)
}

/// Returns a stable content hash of a service definition.
///
/// Used to detect which definitions changed between two reads of the
/// same configuration.
///
/// # Errors
///
/// Returns an error if the configuration cannot be serialized.
pub fn service_hash(name: &str, config: &ServiceConfig) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0]);
    hasher.update(serde_json::to_vec(config)?);
    Ok(format!("{:x}", hasher.finalize()))
}

fn config_error(message: &str) -> ConvoyError {
    ConvoyError::Config {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_document_keeps_order() {
        let doc = "web:\n  image: nginx\n  links: [db]\ndb:\n  image: postgres\n";
        let services = parse_services(doc).unwrap();
        let names: Vec<_> = services.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["web", "db"]);
        assert_eq!(services[0].1.links, vec!["db"]);
    }

    #[test]
    fn versioned_document_reads_services_section() {
        let doc = "version: '2'\nservices:\n  cache:\n    image: redis\n";
        let services = parse_services(doc).unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].1.image, "redis");
    }

    #[test]
    fn empty_document_has_no_services() {
        assert!(parse_services("").unwrap().is_empty());
    }

    #[test]
    fn null_definition_defaults() {
        let services = parse_services("idle:\n").unwrap();
        assert_eq!(services[0].1, ServiceConfig::default());
    }

    #[test]
    fn scalar_document_is_rejected() {
        let err = parse_services("garbage").unwrap_err();
        assert!(err.to_string().contains("must be a mapping"), "got: {err}");
    }

    #[test]
    fn load_file_reads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("convoy.yml");
        std::fs::write(&path, "db:\n  image: postgres\n").expect("write");
        let services = load_file(&path).unwrap();
        assert_eq!(services[0].0, "db");
    }

    #[test]
    fn hash_changes_with_definition() {
        let a = ServiceConfig::with_image("nginx:1");
        let b = ServiceConfig::with_image("nginx:2");
        assert_eq!(service_hash("web", &a).unwrap(), service_hash("web", &a).unwrap());
        assert_ne!(service_hash("web", &a).unwrap(), service_hash("web", &b).unwrap());
        assert_ne!(service_hash("web", &a).unwrap(), service_hash("api", &a).unwrap());
    }
}
