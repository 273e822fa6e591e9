//! Per-service execution state for one traversal round.
//!
//! A [`ServiceWrapper`] pairs a service with a [`Latch`] that is released
//! exactly once per round, whether the service ran, was skipped, or failed.
//! Dependents wait on that latch and then read the recorded [`Outcome`].

use std::collections::{BTreeMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use convoy_common::error::ConvoyError;
use futures::FutureExt;

use crate::error::ProjectError;
use crate::events::{EventBus, EventType};
use crate::latch::Latch;
use crate::project::Project;
use crate::service::{ServiceAction, SharedService};

/// All wrappers of a round, keyed by service name.
pub type WrapperMap = BTreeMap<String, Arc<ServiceWrapper>>;

/// Whether a wrapper has already run in the current traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperState {
    /// Not yet run.
    Unknown,
    /// Ran, or was deliberately skipped.
    Executed,
}

/// Result of the last round for one wrapper.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The action succeeded, or nothing needed to run.
    Success,
    /// The service, or one of its dependencies, asked for a reload.
    Restart,
    /// The action failed.
    Failed(Arc<ConvoyError>),
}

/// Execution state for one service.
pub struct ServiceWrapper {
    name: String,
    events: EventBus,
    inner: Mutex<Inner>,
}

struct Inner {
    service: SharedService,
    state: WrapperState,
    outcome: Outcome,
    ignored: HashSet<String>,
    latch: Arc<Latch>,
}

impl ServiceWrapper {
    /// Builds the service through the project's factory and arms the wrapper.
    pub fn new(name: &str, project: &Project) -> Result<Arc<Self>, ProjectError> {
        let service = project.create_service(name)?;
        Ok(Arc::new(Self {
            name: name.to_string(),
            events: project.events().clone(),
            inner: Mutex::new(Inner {
                service,
                state: WrapperState::Unknown,
                outcome: Outcome::Success,
                ignored: HashSet::new(),
                latch: Arc::new(Latch::new()),
            }),
        }))
    }

    /// Service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current service instance.
    #[must_use]
    pub fn service(&self) -> SharedService {
        Arc::clone(&self.lock().service)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> WrapperState {
        self.lock().state
    }

    /// Outcome recorded by the last run.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        self.lock().outcome.clone()
    }

    /// Re-arms the wrapper for another round.
    ///
    /// A wrapper that has not executed gets a freshly built service, so it
    /// picks up reloaded configuration. A pending restart outcome is cleared.
    pub fn reset(&self, project: &Project) -> Result<(), ProjectError> {
        if self.state() != WrapperState::Executed {
            let service = project.create_service(&self.name).inspect_err(|e| {
                tracing::error!(service = %self.name, error = %e, "failed to rebuild service");
            })?;
            self.lock().service = service;
        }

        let mut inner = self.lock();
        if matches!(inner.outcome, Outcome::Restart) {
            inner.outcome = Outcome::Success;
        }
        inner.latch = Arc::new(Latch::new());
        Ok(())
    }

    /// Marks the wrapper executed without running anything and releases it.
    pub fn ignore(&self) {
        let latch = {
            let mut inner = self.lock();
            inner.state = WrapperState::Executed;
            Arc::clone(&inner.latch)
        };
        self.events.notify(EventType::ServiceUpIgnored, &self.name, None);
        let _ = latch.release();
    }

    /// Stops this wrapper from waiting on `target`.
    pub fn ignore_dep(&self, target: &str) {
        let _ = self.lock().ignored.insert(target.to_string());
    }

    /// Returns whether the edge to `target` has been broken.
    #[must_use]
    pub fn ignores(&self, target: &str) -> bool {
        self.lock().ignored.contains(target)
    }

    /// Waits for this round to finish and returns the outcome.
    pub async fn wait(&self) -> Outcome {
        let latch = Arc::clone(&self.lock().latch);
        latch.wait().await;
        self.outcome()
    }

    /// Runs `action` once for this round.
    ///
    /// With `wrappers` set, every non-ignored dependency is awaited first; a
    /// dependency that requested a reload aborts this run with a restart
    /// outcome. The latch is released on every path, panics included; a
    /// panic is recorded as a failure.
    pub async fn run(
        &self,
        wrappers: Option<&WrapperMap>,
        start: EventType,
        done: EventType,
        action: &ServiceAction,
    ) {
        let latch = Arc::clone(&self.lock().latch);
        let finished = AssertUnwindSafe(self.execute(wrappers, start, done, action))
            .catch_unwind()
            .await;
        if finished.is_err() {
            tracing::error!(service = %self.name, event = %start, "service task panicked");
            self.lock().outcome = Outcome::Failed(Arc::new(ConvoyError::Backend {
                message: format!("{start} {} panicked", self.name),
            }));
        }
        if !latch.release() {
            tracing::warn!(service = %self.name, "wrapper released twice in one round");
        }
    }

    async fn execute(
        &self,
        wrappers: Option<&WrapperMap>,
        start: EventType,
        done: EventType,
        action: &ServiceAction,
    ) {
        let (service, state) = {
            let inner = self.lock();
            (Arc::clone(&inner.service), inner.state)
        };
        if state == WrapperState::Executed {
            return;
        }

        if let Some(wrappers) = wrappers {
            if !self.wait_for_dependencies(&service, wrappers).await {
                return;
            }
        }

        self.lock().state = WrapperState::Executed;
        self.events.notify(start, &self.name, None);

        let outcome = match action(service).await {
            Ok(()) => {
                self.events.notify(done, &self.name, None);
                Outcome::Success
            }
            Err(e) if e.is_restart() => {
                self.events.notify(done, &self.name, None);
                self.events
                    .notify(EventType::ProjectReloadTrigger, &self.name, None);
                Outcome::Restart
            }
            Err(e) => {
                tracing::error!(service = %self.name, event = %start, error = %e, "service action failed");
                Outcome::Failed(Arc::new(e))
            }
        };
        self.lock().outcome = outcome;
    }

    /// Returns `false` when a dependency requested a reload.
    async fn wait_for_dependencies(&self, service: &SharedService, wrappers: &WrapperMap) -> bool {
        let ignored = self.lock().ignored.clone();
        for dep in service.dependent_services() {
            if ignored.contains(&dep.target) {
                continue;
            }
            let Some(wrapper) = wrappers.get(&dep.target) else {
                tracing::error!(service = %self.name, dependency = %dep.target, "failed to find dependency");
                continue;
            };
            if matches!(wrapper.wait().await, Outcome::Restart) {
                self.events
                    .notify(EventType::ProjectReload, wrapper.name(), None);
                self.lock().outcome = Outcome::Restart;
                return false;
            }
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ServiceWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ServiceWrapper")
            .field("name", &self.name)
            .field("state", &inner.state)
            .field("outcome", &inner.outcome)
            .field("ignored", &inner.ignored)
            .finish_non_exhaustive()
    }
}
