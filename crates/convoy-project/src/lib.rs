//! # convoy-project
//!
//! The orchestration core of Convoy.
//!
//! A [`Project`](project::Project) owns a set of named service definitions
//! and runs lifecycle verbs (`up`, `down`, `create`, `restart`, `delete`,
//! `kill`, `log`, `pull`) across them in dependency order:
//!
//! - **Service**: the [`Service`](service::Service) capability set a backend implements.
//! - **Factory**: [`ServiceFactory`](factory::ServiceFactory) turns a definition into a service.
//! - **Wrapper**: [`ServiceWrapper`](wrapper::ServiceWrapper) runs one service per round and
//!   signals completion through a one-shot [`Latch`](latch::Latch).
//! - **Traversal**: each round walks the dependency edges depth-first, breaks optional
//!   cycles, launches every selected service as a task and collects the results. A
//!   service may answer with the restart sentinel, in which case the project reloads its
//!   configuration and runs the round again.
//! - **Events**: the [`EventBus`](events::EventBus) fans lifecycle events out to listeners
//!   without ever blocking the orchestrator.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod error;
pub mod events;
pub mod factory;
pub mod latch;
pub mod project;
pub mod service;
mod traverse;
pub mod wrapper;

pub use error::ProjectError;
pub use events::{EventBus, EventType, ProjectEvent};
pub use factory::ServiceFactory;
pub use project::{Project, ReloadCallback};
pub use service::{Container, EmptyService, Service, ServiceAction, SharedService};
