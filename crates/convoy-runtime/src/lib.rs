//! Container backends and the container-backed [`Service`](convoy_project::Service).
//!
//! The orchestration core only sees services; this crate supplies the
//! implementation that maps each lifecycle verb onto a [`ContainerBackend`](backend::ContainerBackend).

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod factory;
pub mod logs;
pub mod process;
pub mod service;
pub mod state;

pub use factory::ContainerServiceFactory;
pub use service::{ContainerService, LogSink};
