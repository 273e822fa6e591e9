//! Lifecycle events and the non-blocking event bus.
//!
//! Every [`EventBus::notify`] call is logged and then offered to each
//! listener with `try_send`. A full or closed listener loses the event;
//! the orchestrator never waits on a slow consumer.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use convoy_common::constants::EVENT_CHANNEL_CAPACITY;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Kind of lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum EventType {
    /// Placeholder event; never delivered.
    NoEvent,

    ContainerCreated,
    ContainerStarted,

    ServiceAdd,
    ServiceUpStart,
    ServiceUpIgnored,
    ServiceUp,
    ServiceCreateStart,
    ServiceCreate,
    ServiceDeleteStart,
    ServiceDelete,
    ServiceDownStart,
    ServiceDown,
    ServiceRestartStart,
    ServiceRestart,
    ServiceKillStart,
    ServiceKill,
    ServicePullStart,
    ServicePull,

    ProjectDownStart,
    ProjectDownDone,
    ProjectCreateStart,
    ProjectCreateDone,
    ProjectUpStart,
    ProjectUpDone,
    ProjectDeleteStart,
    ProjectDeleteDone,
    ProjectRestartStart,
    ProjectRestartDone,
    ProjectKillStart,
    ProjectKillDone,
    /// A service saw its dependency request a reload.
    ProjectReload,
    /// A service itself requested a reload.
    ProjectReloadTrigger,
}

impl EventType {
    /// Human readable description.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoEvent => "",
            Self::ContainerCreated => "Created container",
            Self::ContainerStarted => "Started container",
            Self::ServiceAdd => "Adding",
            Self::ServiceUpStart => "Starting",
            Self::ServiceUpIgnored => "Ignoring",
            Self::ServiceUp => "Started",
            Self::ServiceCreateStart => "Creating",
            Self::ServiceCreate => "Created",
            Self::ServiceDeleteStart => "Deleting",
            Self::ServiceDelete => "Deleted",
            Self::ServiceDownStart => "Stopping",
            Self::ServiceDown => "Stopped",
            Self::ServiceRestartStart => "Restarting",
            Self::ServiceRestart => "Restarted",
            Self::ServiceKillStart => "Killing",
            Self::ServiceKill => "Killed",
            Self::ServicePullStart => "Pulling",
            Self::ServicePull => "Pulled",
            Self::ProjectDownStart => "Stopping project",
            Self::ProjectDownDone => "Project stopped",
            Self::ProjectCreateStart => "Creating project",
            Self::ProjectCreateDone => "Project created",
            Self::ProjectUpStart => "Starting project",
            Self::ProjectUpDone => "Project started",
            Self::ProjectDeleteStart => "Deleting project",
            Self::ProjectDeleteDone => "Project deleted",
            Self::ProjectRestartStart => "Restarting project",
            Self::ProjectRestartDone => "Project restarted",
            Self::ProjectKillStart => "Killing project",
            Self::ProjectKillDone => "Project killed",
            Self::ProjectReload => "Reloading project",
            Self::ProjectReloadTrigger => "Triggering project reload",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single event as delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectEvent {
    /// What happened.
    pub event: EventType,
    /// Service the event is about; empty for project-wide events.
    pub service_name: String,
    /// Extra key/value data such as the container id.
    pub data: BTreeMap<String, String>,
}

impl ProjectEvent {
    /// Returns `true` for events not tied to a single service.
    #[must_use]
    pub fn is_project_event(&self) -> bool {
        self.service_name.is_empty()
    }
}

/// Listener end of the bus.
pub type EventSender = mpsc::Sender<ProjectEvent>;

/// Cloneable handle to a project's event fan-out.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    project: String,
    listeners: Mutex<Listeners>,
    service_count: AtomicUsize,
    up_count: AtomicUsize,
}

#[derive(Default)]
struct Listeners {
    senders: Vec<EventSender>,
    /// Set once a caller registers a listener; the default one is then dropped.
    user_registered: bool,
    /// The logging listener still has to be started inside a runtime.
    default_pending: bool,
}

impl EventBus {
    /// Creates a bus for `project`.
    ///
    /// A default listener that logs each event is started by the first
    /// [`notify`](Self::notify) made inside a Tokio runtime, unless
    /// [`add_listener`](Self::add_listener) was called before.
    #[must_use]
    pub fn new(project: impl Into<String>) -> Self {
        let bus = Self::with_default_listeners(project, Vec::new());
        bus.listeners().default_pending = true;
        bus
    }

    /// Creates a bus whose default listeners are the given senders.
    #[must_use]
    pub fn with_default_listeners(project: impl Into<String>, senders: Vec<EventSender>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                project: project.into(),
                listeners: Mutex::new(Listeners {
                    senders,
                    user_registered: false,
                    default_pending: false,
                }),
                service_count: AtomicUsize::new(0),
                up_count: AtomicUsize::new(0),
            }),
        }
    }

    /// Registers a listener.
    ///
    /// The first registration replaces the default listeners, closing their
    /// channels; later registrations are appended.
    pub fn add_listener(&self, sender: EventSender) {
        let mut listeners = self.listeners();
        if !listeners.user_registered {
            listeners.senders.clear();
            listeners.user_registered = true;
            listeners.default_pending = false;
        }
        listeners.senders.push(sender);
    }

    /// Number of currently registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners().senders.len()
    }

    /// Records how many services the project defines, for progress logging.
    pub fn set_service_count(&self, count: usize) {
        self.inner.service_count.store(count, Ordering::Relaxed);
    }

    /// Publishes an event. Never blocks.
    pub fn notify(&self, event: EventType, service_name: &str, data: Option<BTreeMap<String, String>>) {
        if event == EventType::NoEvent {
            return;
        }

        self.log(event, service_name);

        let event = ProjectEvent {
            event,
            service_name: service_name.to_string(),
            data: data.unwrap_or_default(),
        };

        let mut listeners = self.listeners();
        if listeners.default_pending {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
                drop(handle.spawn(default_listener(self.inner.project.clone(), rx)));
                listeners.senders.push(tx);
                listeners.default_pending = false;
            }
        }
        listeners.senders.retain(|sender| match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                tracing::trace!(event = %dropped.event, "listener full, event dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }

    fn log(&self, event: EventType, service_name: &str) {
        let project = self.inner.project.as_str();
        if event == EventType::ServiceUp {
            let up = self.inner.up_count.fetch_add(1, Ordering::Relaxed) + 1;
            let total = self.inner.service_count.load(Ordering::Relaxed);
            tracing::info!(project, service = service_name, "[{up}/{total}] {event}");
        } else if event == EventType::ProjectUpStart {
            self.inner.up_count.store(0, Ordering::Relaxed);
            tracing::debug!(project, "{event}");
        } else {
            tracing::debug!(project, service = service_name, "{event}");
        }
    }

    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("project", &self.inner.project)
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

async fn default_listener(project: String, mut rx: mpsc::Receiver<ProjectEvent>) {
    while let Some(event) = rx.recv().await {
        if event.is_project_event() {
            tracing::info!(project = %project, "{}", event.event);
        } else {
            tracing::info!(project = %project, service = %event.service_name, "{}", event.event);
        }
    }
}
