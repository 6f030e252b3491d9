//! # libcsi: baggageclaim CSI node driver for the rk8s worker
//!
//! `libcsi` implements the Identity and Node services of the
//! [Container Storage Interface][csi] over gRPC (via [`tonic`]). Publishing a
//! volume bind-mounts a baggageclaim volume, or the worker's init binary,
//! onto the target path the kubelet hands us. It follows the rk8s
//! conventions (Tokio async runtime, `tracing` for observability, `thiserror`
//! for structured errors).
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Core data model: volume context keys, capabilities, requests. |
//! | [`error`] | [`CsiError`] enum covering all failure modes. |
//! | [`identity`] | [`CsiIdentity`] trait: plugin discovery & health. |
//! | [`node`] | [`CsiNode`] trait: publish, unpublish, node info. |
//! | [`volume`] | [`VolumeStore`] trait resolving handles to host paths. |
//! | [`mount`] | [`Mounter`] trait and the `mount(2)` implementation. |
//! | [`driver`] | [`BaggageclaimDriver`], the node driver itself. |
//! | [`backend`] | Volume store clients (baggageclaim over HTTP). |
//! | [`transport`] | gRPC server built on `tonic`. |
//!
//! [csi]: https://github.com/container-storage-interface/spec

pub mod backend;
pub mod driver;
pub mod error;
pub mod identity;
pub mod mount;
pub mod node;
pub mod transport;
pub mod types;
pub mod volume;

// Re-export the most commonly used items at crate root for convenience.
pub use backend::baggageclaim::BaggageclaimClient;
pub use driver::BaggageclaimDriver;
pub use error::CsiError;
pub use identity::CsiIdentity;
pub use mount::{Mounter, SystemMounter};
pub use node::CsiNode;
pub use transport::CsiServer;
pub use types::*;
pub use volume::VolumeStore;
