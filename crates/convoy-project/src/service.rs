//! The capability set a backend implements for one named service.

use std::sync::Arc;

use async_trait::async_trait;
use convoy_common::error::Result;
use convoy_common::types::{ContainerId, ContainerState};
use convoy_compose::relationship::{ServiceRelationship, default_dependent_services};
use convoy_compose::service::ServiceConfig;
use futures::FutureExt;
use futures::future::BoxFuture;

/// A container backing a service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Backend identifier.
    pub id: ContainerId,
    /// Container name.
    pub name: String,
    /// Last known lifecycle state.
    pub state: ContainerState,
}

/// Lifecycle operations on one named service.
///
/// Any operation may return [`ConvoyError::RestartRequested`] after doing
/// its work to ask the project to reload and run the round again.
///
/// [`ConvoyError::RestartRequested`]: convoy_common::error::ConvoyError::RestartRequested
#[async_trait]
pub trait Service: Send + Sync {
    /// Service name.
    fn name(&self) -> &str;

    /// Definition this service was built from.
    fn config(&self) -> &ServiceConfig;

    /// Creates the service's containers without starting them.
    async fn create(&self) -> Result<()>;

    /// Creates and starts the service.
    async fn up(&self) -> Result<()>;

    /// Stops the service.
    async fn down(&self) -> Result<()>;

    /// Removes the service's containers.
    async fn delete(&self) -> Result<()>;

    /// Restarts the service.
    async fn restart(&self) -> Result<()>;

    /// Forcibly stops the service.
    async fn kill(&self) -> Result<()>;

    /// Emits the service's logs.
    async fn log(&self) -> Result<()>;

    /// Fetches the service's image.
    async fn pull(&self) -> Result<()>;

    /// Lists the service's containers.
    async fn containers(&self) -> Result<Vec<Container>>;

    /// Edges to the services this one depends on.
    fn dependent_services(&self) -> Vec<ServiceRelationship>;
}

/// Shared handle to a service.
pub type SharedService = Arc<dyn Service>;

/// An operation applied to a service during traversal, e.g. `up`.
pub type ServiceAction = Arc<dyn Fn(SharedService) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Wraps an async closure into a [`ServiceAction`].
pub fn action<F, Fut>(f: F) -> ServiceAction
where
    F: Fn(SharedService) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |service| f(service).boxed())
}

/// A service whose every operation succeeds without doing anything.
///
/// Its dependencies are still derived from its definition, so it takes part
/// in ordering like any other service.
#[derive(Debug, Clone)]
pub struct EmptyService {
    name: String,
    config: ServiceConfig,
}

impl EmptyService {
    /// Creates a no-op service.
    #[must_use]
    pub fn new(name: impl Into<String>, config: ServiceConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

#[async_trait]
impl Service for EmptyService {
    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &ServiceConfig {
        &self.config
    }

    async fn create(&self) -> Result<()> {
        Ok(())
    }

    async fn up(&self) -> Result<()> {
        Ok(())
    }

    async fn down(&self) -> Result<()> {
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        Ok(())
    }

    async fn restart(&self) -> Result<()> {
        Ok(())
    }

    async fn kill(&self) -> Result<()> {
        Ok(())
    }

    async fn log(&self) -> Result<()> {
        Ok(())
    }

    async fn pull(&self) -> Result<()> {
        Ok(())
    }

    async fn containers(&self) -> Result<Vec<Container>> {
        Ok(Vec::new())
    }

    fn dependent_services(&self) -> Vec<ServiceRelationship> {
        default_dependent_services(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_service_is_a_no_op() {
        let cfg = ServiceConfig {
            links: vec!["db".into()],
            ..ServiceConfig::default()
        };
        let service: SharedService = Arc::new(EmptyService::new("web", cfg));

        service.up().await.unwrap();
        service.kill().await.unwrap();
        assert!(service.containers().await.unwrap().is_empty());
        assert_eq!(service.name(), "web");
        assert_eq!(service.dependent_services()[0].target, "db");
    }

    #[tokio::test]
    async fn action_wraps_closure() {
        let up = action(|service: SharedService| async move { service.up().await });
        let service: SharedService = Arc::new(EmptyService::new("web", ServiceConfig::default()));
        up(service).await.unwrap();
    }
}
