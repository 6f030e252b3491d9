//! gRPC transport for the CSI Identity and Node services.
//!
//! [`proto`] holds the `csi.v1` types generated by `tonic-build`; [`CsiServer`]
//! adapts a [`CsiIdentity`](crate::CsiIdentity) + [`CsiNode`](crate::CsiNode)
//! implementation to them.

pub mod server;

pub use server::CsiServer;

/// Generated `csi.v1` messages, servers and clients.
pub mod proto {
    tonic::include_proto!("csi.v1");
}
