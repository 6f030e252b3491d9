//! # libgarden: Garden container API backed by Kubernetes pods
//!
//! Concourse talks to its workers through the Garden HTTP API. This crate
//! answers that API for a worker whose containers are pods: a container
//! handle is a pod name in the worker's namespace. Only lookup, list,
//! destroy and stop are meaningful; every other Garden call fails with a
//! fixed "not supported" error.
//!
//! | Module | Purpose |
//! |---|---|
//! | [`config`] | [`GardenConfig`]: namespace and worker ownership label. |
//! | [`error`] | [`GardenError`] and [`ClusterError`]. |
//! | [`cluster`] | [`PodClient`] trait and its `kube` implementation. |
//! | [`container`] | [`ContainerView`] and the closed operation enums. |
//! | [`backend`] | [`GardenBackend`], the container lifecycle rules. |
//! | [`http`] | Garden HTTP routes and the [`GardenServer`] accept loop. |

pub mod backend;
pub mod cluster;
pub mod config;
pub mod container;
pub mod error;
pub mod http;

pub use backend::GardenBackend;
pub use cluster::{KubePodClient, PodClient};
pub use config::GardenConfig;
pub use container::{ContainerOp, ContainerView, UnsupportedOp};
pub use error::{ClusterError, GardenError};
pub use http::GardenServer;
