//! Errors surfaced by project verbs.

use std::sync::Arc;

use convoy_common::error::ConvoyError;
use thiserror::Error;

/// Error returned by a project verb.
///
/// The restart sentinel never appears here: it is consumed by the
/// traversal, which reloads and runs the round again.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// A selected service has no definition.
    #[error("no such service: {0}")]
    NoSuchService(String),

    /// A dependency cycle without any optional edge.
    #[error("cycle detected in path {path}")]
    Cycle {
        /// The offending path, `a->b->a`.
        path: String,
    },

    /// The factory could not construct a service.
    #[error("failed to create service {service}: {source}")]
    ServiceCreate {
        /// Service being constructed.
        service: String,
        /// Factory error.
        source: ConvoyError,
    },

    /// A service action failed. When several fail in one round, this is the first.
    #[error("service {service} failed: {source}")]
    Action {
        /// Service whose action failed.
        service: String,
        /// Error reported by the service, shared with every waiter.
        source: Arc<ConvoyError>,
    },
}

impl ProjectError {
    /// Returns the service the error is about, if any.
    #[must_use]
    pub fn service(&self) -> Option<&str> {
        match self {
            Self::NoSuchService(service)
            | Self::ServiceCreate { service, .. }
            | Self::Action { service, .. } => Some(service),
            Self::Cycle { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_error_names_service() {
        let err = ProjectError::Action {
            service: "db".into(),
            source: Arc::new(ConvoyError::Backend {
                message: "boom".into(),
            }),
        };
        assert_eq!(err.service(), Some("db"));
        assert_eq!(err.to_string(), "service db failed: backend error: boom");
    }

    #[test]
    fn cycle_error_reports_path() {
        let err = ProjectError::Cycle {
            path: "a->b->a".into(),
        };
        assert!(err.service().is_none());
        assert_eq!(err.to_string(), "cycle detected in path a->b->a");
    }
}
