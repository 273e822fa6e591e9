//! # convoy-compose
//!
//! Service definitions and the static side of the dependency graph.
//!
//! Handles:
//! - **Service**: the immutable per-service [`ServiceConfig`](service::ServiceConfig) record.
//! - **Loader**: compose YAML documents into ordered service definitions, and config hashing.
//! - **Reference**: parsing of `links`, `volumes_from`, `net` and `ipc` references.
//! - **Relationship**: dependency edges between services, including label-derived ordering.
//! - **Environment**: resolution of bare environment names at service construction time.
//! - **Graph**: static deployment order for planning and cycle reporting.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod environment;
pub mod graph;
pub mod loader;
pub mod reference;
pub mod relationship;
pub mod service;
