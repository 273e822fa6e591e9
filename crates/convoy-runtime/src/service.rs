//! Service implementation backed by a [`ContainerBackend`].
//!
//! Each service owns at most one container, found through its project and
//! service labels. Backend calls run on Tokio's blocking pool.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use convoy_common::constants::{
    CONTAINER_ID, LABEL_CREATE_ONLY, LABEL_PROJECT, LABEL_RELOAD_CONFIG, LABEL_SERVICE,
    STOP_GRACE_PERIOD_SECS,
};
use convoy_common::error::{ConvoyError, Result};
use convoy_common::types::{ContainerId, ContainerState};
use convoy_compose::relationship::{
    ServiceRelationship, append_optional_link, default_dependent_services,
};
use convoy_compose::service::ServiceConfig;
use convoy_project::{Container, EventBus, EventType, Service};

use crate::backend::{ContainerBackend, ContainerConfig, ContainerInfo, SharedBackend};

/// Receives log output as `(service, line)`.
pub type LogSink = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Returns a sink that forwards each line to `tracing`.
#[must_use]
pub fn tracing_log_sink() -> LogSink {
    Arc::new(|service: &str, line: &str| tracing::info!(service, "{line}"))
}

/// A service whose lifecycle is carried out by a container backend.
pub struct ContainerService {
    name: String,
    config: ServiceConfig,
    project: String,
    backend: SharedBackend,
    events: EventBus,
    disabled: bool,
    ordering: Vec<String>,
    log_sink: LogSink,
}

impl ContainerService {
    /// Creates a service for `name` in `project`.
    pub fn new(
        name: impl Into<String>,
        config: ServiceConfig,
        project: impl Into<String>,
        backend: SharedBackend,
        events: EventBus,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            project: project.into(),
            backend,
            events,
            disabled: false,
            ordering: Vec::new(),
            log_sink: tracing_log_sink(),
        }
    }

    /// Marks the service disabled: `create` and `up` only pretend.
    #[must_use]
    pub const fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Adds optional ordering edges on top of those in the definition.
    #[must_use]
    pub fn with_ordering(mut self, ordering: Vec<String>) -> Self {
        self.ordering = ordering;
        self
    }

    /// Sets where `log` writes to.
    #[must_use]
    pub fn with_log_sink(mut self, sink: LogSink) -> Self {
        self.log_sink = sink;
        self
    }

    /// Name of the backing container.
    pub fn container_name(&self) -> String {
        self.config
            .container_name
            .clone()
            .unwrap_or_else(|| format!("{}_{}", self.project, self.name))
    }

    fn container_config(&self) -> ContainerConfig {
        let mut labels = self.config.labels.clone();
        let _ = labels.insert(LABEL_PROJECT.to_string(), self.project.clone());
        let _ = labels.insert(LABEL_SERVICE.to_string(), self.name.clone());
        ContainerConfig {
            name: self.container_name(),
            image: self.config.image.clone(),
            command: self.config.command.clone(),
            env: self.config.environment_pairs(),
            labels,
        }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ContainerBackend) -> Result<T> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || f(backend.as_ref()))
            .await
            .map_err(|e| ConvoyError::Backend {
                message: format!("backend task failed: {e}"),
            })?
    }

    async fn own_containers(&self) -> Result<Vec<ContainerInfo>> {
        let project = self.project.clone();
        let name = self.name.clone();
        self.blocking(move |backend| {
            Ok(backend
                .list()?
                .into_iter()
                .filter(|c| c.has_label(LABEL_PROJECT, &project) && c.has_label(LABEL_SERVICE, &name))
                .collect())
        })
        .await
    }

    /// Returns the service's container, creating it if needed.
    async fn ensure_created(&self) -> Result<(ContainerId, ContainerState)> {
        if let Some(existing) = self.own_containers().await?.into_iter().next() {
            return Ok((existing.id, existing.state));
        }

        let config = self.container_config();
        let id = self.blocking(move |backend| backend.create(&config)).await?;
        self.events
            .notify(EventType::ContainerCreated, &self.name, Some(container_data(&id)));
        Ok((id, ContainerState::Created))
    }

    async fn start(&self, id: ContainerId) -> Result<()> {
        let started = id.clone();
        let _ = self.blocking(move |backend| backend.start(&started)).await?;
        self.events
            .notify(EventType::ContainerStarted, &self.name, Some(container_data(&id)));
        Ok(())
    }

    async fn stop(&self, id: ContainerId) -> Result<()> {
        let grace = Duration::from_secs(STOP_GRACE_PERIOD_SECS);
        self.blocking(move |backend| backend.stop(&id, grace)).await
    }

    /// Succeeds, or asks for a project reload when the service is so labelled.
    fn finish(&self) -> Result<()> {
        if self.config.label_is_true(LABEL_RELOAD_CONFIG) {
            tracing::info!(service = %self.name, "service requests a configuration reload");
            return Err(ConvoyError::RestartRequested);
        }
        Ok(())
    }
}

#[async_trait]
impl Service for ContainerService {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &ServiceConfig {
        &self.config
    }

    async fn create(&self) -> Result<()> {
        if self.disabled {
            tracing::info!(service = %self.name, "service is disabled, not creating");
            return Ok(());
        }
        let _ = self.ensure_created().await?;
        self.finish()
    }

    async fn up(&self) -> Result<()> {
        if self.disabled {
            tracing::info!(service = %self.name, "service is disabled, not starting");
            return Ok(());
        }
        let (id, state) = self.ensure_created().await?;
        if !self.config.label_is_true(LABEL_CREATE_ONLY) && !state.is_running() {
            self.start(id).await?;
        }
        self.finish()
    }

    async fn down(&self) -> Result<()> {
        for container in self.own_containers().await? {
            if container.state.is_running() {
                self.stop(container.id).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        for container in self.own_containers().await? {
            let id = container.id;
            self.blocking(move |backend| backend.remove(&id)).await?;
        }
        Ok(())
    }

    async fn restart(&self) -> Result<()> {
        let containers = self.own_containers().await?;
        if containers.is_empty() {
            return self.up().await;
        }
        for container in containers {
            if container.state.is_running() {
                self.stop(container.id.clone()).await?;
            }
            self.start(container.id).await?;
        }
        Ok(())
    }

    async fn kill(&self) -> Result<()> {
        for container in self.own_containers().await? {
            if container.state.is_running() {
                let id = container.id;
                self.blocking(move |backend| backend.kill(&id)).await?;
            }
        }
        Ok(())
    }

    async fn log(&self) -> Result<()> {
        for container in self.own_containers().await? {
            let id = container.id;
            let output = self.blocking(move |backend| backend.logs(&id)).await?;
            for line in output.lines() {
                (self.log_sink)(&self.name, line);
            }
        }
        Ok(())
    }

    async fn pull(&self) -> Result<()> {
        if self.config.image.is_empty() {
            return Ok(());
        }
        let image = self.config.image.clone();
        self.blocking(move |backend| backend.pull(&image)).await
    }

    async fn containers(&self) -> Result<Vec<Container>> {
        Ok(self
            .own_containers()
            .await?
            .into_iter()
            .map(|c| Container {
                id: c.id,
                name: c.name,
                state: c.state,
            })
            .collect())
    }

    fn dependent_services(&self) -> Vec<ServiceRelationship> {
        let mut rels = default_dependent_services(&self.config);
        for target in &self.ordering {
            append_optional_link(&mut rels, target);
        }
        rels
    }
}

fn container_data(id: &ContainerId) -> BTreeMap<String, String> {
    BTreeMap::from([(CONTAINER_ID.to_string(), id.to_string())])
}
