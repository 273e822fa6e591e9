//! The project: service definitions plus the lifecycle verbs run over them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use convoy_common::error::Result;
use convoy_compose::environment::{EnvironmentLookup, resolve_environment};
use convoy_compose::loader;
use convoy_compose::service::ServiceConfig;

use crate::error::ProjectError;
use crate::events::{EventBus, EventSender, EventType};
use crate::factory::ServiceFactory;
use crate::service::{Container, SharedService, action};
use crate::traverse::Task;

/// Invoked when a round ends with a restart request.
///
/// Expected to re-read configuration and [`Project::add_config`] whatever
/// changed; those services are rebuilt in the next round.
pub type ReloadCallback = Arc<dyn Fn(&Project) -> Result<()> + Send + Sync>;

/// A named set of service definitions and the machinery to run them.
pub struct Project {
    name: String,
    configs: RwLock<BTreeMap<String, ServiceConfig>>,
    reload: Mutex<Vec<String>>,
    factory: Arc<dyn ServiceFactory>,
    environment: Option<Arc<dyn EnvironmentLookup>>,
    reload_callback: Option<ReloadCallback>,
    events: EventBus,
}

impl Project {
    /// Creates an empty project.
    ///
    /// Until a listener is added, events are logged by a default listener
    /// that starts with the first event published inside a Tokio runtime.
    pub fn new(name: impl Into<String>, factory: impl ServiceFactory + 'static) -> Self {
        let name = name.into();
        Self {
            events: EventBus::new(name.clone()),
            name,
            configs: RwLock::new(BTreeMap::new()),
            reload: Mutex::new(Vec::new()),
            factory: Arc::new(factory),
            environment: None,
            reload_callback: None,
        }
    }

    /// Resolves bare environment names through `lookup` when services are built.
    #[must_use]
    pub fn with_environment_lookup(mut self, lookup: impl EnvironmentLookup + 'static) -> Self {
        self.environment = Some(Arc::new(lookup));
        self
    }

    /// Sets the callback run before a restart round.
    #[must_use]
    pub fn with_reload_callback(
        mut self,
        callback: impl Fn(&Self) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.reload_callback = Some(Arc::new(callback));
        self
    }

    /// Project name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The project's event bus.
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Registers an event listener. See [`EventBus::add_listener`].
    pub fn add_listener(&self, sender: EventSender) {
        self.events.add_listener(sender);
    }

    /// Publishes an event on the project's bus.
    pub fn notify(&self, event: EventType, service_name: &str, data: Option<BTreeMap<String, String>>) {
        self.events.notify(event, service_name, data);
    }

    /// Adds or replaces a service definition and queues it for rebuilding.
    pub fn add_config(&self, name: &str, config: ServiceConfig) {
        self.notify(EventType::ServiceAdd, name, None);

        let count = {
            let mut configs = self.configs_mut();
            let _ = configs.insert(name.to_string(), config);
            configs.len()
        };
        self.events.set_service_count(count);

        let mut reload = self.reload_queue();
        if !reload.iter().any(|pending| pending == name) {
            reload.push(name.to_string());
        }
    }

    /// Parses a compose document and adds every service it defines.
    pub fn load(&self, content: &str) -> Result<()> {
        for (name, config) in loader::parse_services(content)? {
            self.add_config(&name, config);
        }
        Ok(())
    }

    /// Returns a copy of one definition.
    pub fn config(&self, name: &str) -> Option<ServiceConfig> {
        self.configs_read().get(name).cloned()
    }

    /// Returns a copy of every definition.
    pub fn configs(&self) -> BTreeMap<String, ServiceConfig> {
        self.configs_read().clone()
    }

    /// Names of all defined services, sorted.
    pub fn service_names(&self) -> Vec<String> {
        self.configs_read().keys().cloned().collect()
    }

    /// Builds a service from a copy of its definition.
    ///
    /// Bare environment names are resolved on the copy before the factory
    /// sees it; the stored definition is never modified.
    pub fn create_service(&self, name: &str) -> std::result::Result<SharedService, ProjectError> {
        let mut config = self
            .config(name)
            .ok_or_else(|| ProjectError::NoSuchService(name.to_string()))?;

        if let Some(lookup) = &self.environment {
            resolve_environment(lookup.as_ref(), name, &mut config);
        }

        self.factory
            .create(self, name, config)
            .map_err(|source| ProjectError::ServiceCreate {
                service: name.to_string(),
                source,
            })
    }

    /// Lists the containers of the selected services (all when empty).
    pub async fn containers(
        &self,
        services: &[&str],
    ) -> std::result::Result<BTreeMap<String, Vec<Container>>, ProjectError> {
        let names: Vec<String> = if services.is_empty() {
            self.service_names()
        } else {
            services.iter().map(ToString::to_string).collect()
        };

        let mut out = BTreeMap::new();
        for name in names {
            let service = self.create_service(&name)?;
            let containers = service
                .containers()
                .await
                .map_err(|source| ProjectError::Action {
                    service: name.clone(),
                    source: Arc::new(source),
                })?;
            let _ = out.insert(name, containers);
        }
        Ok(out)
    }

    /// Creates and starts the selected services in dependency order.
    pub async fn up(&self, services: &[&str]) -> std::result::Result<(), ProjectError> {
        let task = Task::ordered(
            EventType::ServiceUpStart,
            EventType::ServiceUp,
            action(|service| async move { service.up().await }),
        )
        .with_cycle_action(action(|service| async move { service.create().await }));
        self.perform(EventType::ProjectUpStart, EventType::ProjectUpDone, services, task)
            .await
    }

    /// Creates the selected services in dependency order without starting them.
    pub async fn create(&self, services: &[&str]) -> std::result::Result<(), ProjectError> {
        let task = Task::ordered(
            EventType::ServiceCreateStart,
            EventType::ServiceCreate,
            action(|service| async move { service.create().await }),
        );
        self.perform(
            EventType::ProjectCreateStart,
            EventType::ProjectCreateDone,
            services,
            task,
        )
        .await
    }

    /// Restarts the selected services in dependency order.
    pub async fn restart(&self, services: &[&str]) -> std::result::Result<(), ProjectError> {
        let task = Task::ordered(
            EventType::ServiceRestartStart,
            EventType::ServiceRestart,
            action(|service| async move { service.restart().await }),
        );
        self.perform(
            EventType::ProjectRestartStart,
            EventType::ProjectRestartDone,
            services,
            task,
        )
        .await
    }

    /// Stops the selected services, all at once.
    pub async fn down(&self, services: &[&str]) -> std::result::Result<(), ProjectError> {
        let task = Task::unordered(
            EventType::ServiceDownStart,
            EventType::ServiceDown,
            action(|service| async move { service.down().await }),
        );
        self.perform(EventType::ProjectDownStart, EventType::ProjectDownDone, services, task)
            .await
    }

    /// Removes the selected services' containers, all at once.
    pub async fn delete(&self, services: &[&str]) -> std::result::Result<(), ProjectError> {
        let task = Task::unordered(
            EventType::ServiceDeleteStart,
            EventType::ServiceDelete,
            action(|service| async move { service.delete().await }),
        );
        self.perform(
            EventType::ProjectDeleteStart,
            EventType::ProjectDeleteDone,
            services,
            task,
        )
        .await
    }

    /// Kills the selected services, all at once.
    pub async fn kill(&self, services: &[&str]) -> std::result::Result<(), ProjectError> {
        let task = Task::unordered(
            EventType::ServiceKillStart,
            EventType::ServiceKill,
            action(|service| async move { service.kill().await }),
        );
        self.perform(EventType::ProjectKillStart, EventType::ProjectKillDone, services, task)
            .await
    }

    /// Emits the selected services' logs.
    pub async fn log(&self, services: &[&str]) -> std::result::Result<(), ProjectError> {
        let task = Task::unordered(
            EventType::NoEvent,
            EventType::NoEvent,
            action(|service| async move { service.log().await }),
        );
        self.for_each(services, &task).await
    }

    /// Pulls the selected services' images.
    pub async fn pull(&self, services: &[&str]) -> std::result::Result<(), ProjectError> {
        let task = Task::unordered(
            EventType::ServicePullStart,
            EventType::ServicePull,
            action(|service| async move { service.pull().await }),
        );
        self.for_each(services, &task).await
    }

    async fn perform(
        &self,
        start: EventType,
        done: EventType,
        services: &[&str],
        task: Task,
    ) -> std::result::Result<(), ProjectError> {
        self.notify(start, "", None);
        let result = self.for_each(services, &task).await;
        self.notify(done, "", None);
        result
    }

    pub(crate) fn take_reload(&self) -> Vec<String> {
        std::mem::take(&mut *self.reload_queue())
    }

    pub(crate) fn run_reload_callback(&self) {
        if let Some(callback) = &self.reload_callback {
            if let Err(e) = callback(self) {
                tracing::error!(project = %self.name, error = %e, "reload callback failed");
            }
        }
    }

    fn configs_read(&self) -> RwLockReadGuard<'_, BTreeMap<String, ServiceConfig>> {
        self.configs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn configs_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<String, ServiceConfig>> {
        self.configs.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn reload_queue(&self) -> MutexGuard<'_, Vec<String>> {
        self.reload.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("name", &self.name)
            .field("services", &self.service_names())
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use convoy_compose::environment::MapEnvironmentLookup;

    use super::*;
    use crate::service::EmptyService;

    fn empty_factory(_: &Project, name: &str, config: ServiceConfig) -> Result<SharedService> {
        Ok(Arc::new(EmptyService::new(name, config)))
    }

    #[test]
    fn add_config_queues_reload_once() {
        let project = Project::new("p", empty_factory);
        project.add_config("web", ServiceConfig::with_image("nginx"));
        project.add_config("web", ServiceConfig::with_image("nginx:2"));
        project.add_config("db", ServiceConfig::with_image("postgres"));

        assert_eq!(project.take_reload(), vec!["web", "db"]);
        assert!(project.take_reload().is_empty());
        assert_eq!(project.config("web").unwrap().image, "nginx:2");
        assert_eq!(project.service_names(), vec!["db", "web"]);
    }

    #[test]
    fn load_adds_every_service() {
        let project = Project::new("p", empty_factory);
        project
            .load("db:\n  image: postgres\nweb:\n  image: nginx\n  links: [db]\n")
            .unwrap();
        assert_eq!(project.service_names(), vec!["db", "web"]);
        assert_eq!(project.config("web").unwrap().links, vec!["db"]);
    }

    #[test]
    fn create_service_resolves_environment_on_a_copy() {
        let mut lookup = MapEnvironmentLookup::default();
        lookup.set("A", "a");
        lookup.set("web/B", "scoped");
        let project = Project::new("p", empty_factory).with_environment_lookup(lookup);

        let cfg = ServiceConfig {
            environment: vec!["A".into(), "B=".into(), "C=c".into(), "MISSING".into()],
            ..ServiceConfig::default()
        };
        project.add_config("web", cfg.clone());

        let service = project.create_service("web").unwrap();
        assert_eq!(service.config().environment, vec!["A=a", "B=scoped", "C=c"]);
        assert_eq!(project.config("web").unwrap(), cfg);
    }

    #[test]
    fn create_service_unknown_name() {
        let project = Project::new("p", empty_factory);
        assert!(matches!(
            project.create_service("ghost"),
            Err(ProjectError::NoSuchService(name)) if name == "ghost"
        ));
    }

    #[test]
    fn factory_errors_are_wrapped() {
        let project = Project::new("p", |_: &Project, _: &str, _: ServiceConfig| -> Result<SharedService> {
            Err(convoy_common::error::ConvoyError::Backend {
                message: "nope".into(),
            })
        });
        project.add_config("web", ServiceConfig::default());
        assert!(matches!(
            project.create_service("web"),
            Err(ProjectError::ServiceCreate { service, .. }) if service == "web"
        ));
    }
}
