//! Construction of services from definitions.

use convoy_common::error::Result;
use convoy_compose::service::ServiceConfig;

use crate::project::Project;
use crate::service::SharedService;

/// Builds a [`Service`](crate::service::Service) for a named definition.
///
/// The project passes itself so a factory can read sibling definitions or
/// publish on the project's event bus.
pub trait ServiceFactory: Send + Sync {
    /// Creates the service `name` from `config`.
    ///
    /// `config` has already had its environment resolved.
    fn create(&self, project: &Project, name: &str, config: ServiceConfig) -> Result<SharedService>;
}

impl<F> ServiceFactory for F
where
    F: Fn(&Project, &str, ServiceConfig) -> Result<SharedService> + Send + Sync,
{
    fn create(&self, project: &Project, name: &str, config: ServiceConfig) -> Result<SharedService> {
        self(project, name, config)
    }
}
