//! Factory producing [`ContainerService`]s for a project.

use std::sync::Arc;

use convoy_common::config::ConvoyConfig;
use convoy_common::error::Result;
use convoy_compose::relationship::ordering_dependencies;
use convoy_compose::service::ServiceConfig;
use convoy_project::{Project, ServiceFactory, SharedService};

use crate::backend::SharedBackend;
use crate::service::{ContainerService, LogSink, tracing_log_sink};

/// Builds container-backed services on a shared backend.
///
/// Ordering labels across the whole project are turned into optional edges
/// each time a service is built, so reloaded definitions take effect.
pub struct ContainerServiceFactory {
    backend: SharedBackend,
    config: ConvoyConfig,
    log_sink: LogSink,
}

impl ContainerServiceFactory {
    /// Creates a factory over `backend`.
    #[must_use]
    pub fn new(backend: SharedBackend, config: ConvoyConfig) -> Self {
        Self {
            backend,
            config,
            log_sink: tracing_log_sink(),
        }
    }

    /// Sets the sink every built service writes logs to.
    #[must_use]
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = sink;
        self
    }
}

impl ServiceFactory for ContainerServiceFactory {
    fn create(&self, project: &Project, name: &str, config: ServiceConfig) -> Result<SharedService> {
        let ordering = ordering_dependencies(&project.configs())
            .remove(name)
            .unwrap_or_default();
        tracing::debug!(service = name, ?ordering, "building container service");

        let service = ContainerService::new(
            name,
            config,
            project.name(),
            Arc::clone(&self.backend),
            project.events().clone(),
        )
        .disabled(self.config.is_disabled(name))
        .with_ordering(ordering)
        .with_log_sink(Arc::clone(&self.log_sink));
        Ok(Arc::new(service))
    }
}
