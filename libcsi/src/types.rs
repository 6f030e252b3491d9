//! Core CSI types: driver identity, capabilities, requests and the volume
//! context contract.
//!
//! These are the protocol-neutral shapes the [`CsiIdentity`](crate::CsiIdentity)
//! and [`CsiNode`](crate::CsiNode) traits speak. The gRPC layer converts the
//! generated `csi.v1` messages into them.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use crate::error::CsiError;

// ---------------------------------------------------------------------------
// Volume context contract
// ---------------------------------------------------------------------------

/// Volume context key naming a baggageclaim volume handle.
pub const HANDLE_KEY: &str = "baggageclaim.k8s.concourse-ci.org/handle";

/// Volume context key requesting the worker's init binary.
pub const INIT_BINARY_KEY: &str = "baggageclaim.k8s.concourse-ci.org/init-binary";

/// Opaque handle naming a volume in the volume store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VolumeHandle(pub String);

impl fmt::Display for VolumeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VolumeHandle {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Where the source of a bind mount comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSource {
    /// Resolve the handle through the volume store.
    Handle(VolumeHandle),
    /// Use the configured init binary.
    InitBinary,
}

impl VolumeSource {
    /// Pick the source named by a publish request's volume context.
    ///
    /// Exactly one of [`HANDLE_KEY`] and [`INIT_BINARY_KEY`] must be present.
    /// Keys are matched case-sensitively; unrelated keys are ignored.
    pub fn from_context(ctx: &HashMap<String, String>) -> Result<Self, CsiError> {
        match (ctx.get(HANDLE_KEY), ctx.contains_key(INIT_BINARY_KEY)) {
            (Some(_), true) => Err(CsiError::invalid(format!(
                "volume context must not set both '{HANDLE_KEY}' and '{INIT_BINARY_KEY}'"
            ))),
            (Some(handle), false) if handle.is_empty() => Err(CsiError::invalid(format!(
                "volume context key '{HANDLE_KEY}' has an empty value"
            ))),
            (Some(handle), false) => Ok(Self::Handle(VolumeHandle(handle.clone()))),
            (None, true) => Ok(Self::InitBinary),
            (None, false) => Err(CsiError::invalid(format!(
                "missing '{HANDLE_KEY}' or '{INIT_BINARY_KEY}' keys in volume context"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// How the orchestrator wants the volume exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessType {
    /// Filesystem mount.
    Mount {
        fs_type: String,
        mount_flags: Vec<String>,
    },
    /// Raw block device.
    Block,
}

/// Capability attached to a publish request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeCapability {
    /// `None` when the request left the access type unset.
    pub access_type: Option<AccessType>,
}

impl VolumeCapability {
    /// A plain mount capability with no filesystem type or flags.
    pub fn mount() -> Self {
        Self {
            access_type: Some(AccessType::Mount {
                fs_type: String::new(),
                mount_flags: Vec::new(),
            }),
        }
    }

    pub fn is_mount(&self) -> bool {
        matches!(self.access_type, Some(AccessType::Mount { .. }))
    }
}

/// Optional node-service behaviours a driver may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCapability {
    StageUnstageVolume,
    GetVolumeStats,
    ExpandVolume,
}

/// Optional plugin-level behaviours a driver may advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginCapability {
    ControllerService,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Request to bind-mount a volume onto a target path.
#[derive(Debug, Clone)]
pub struct NodePublishVolumeRequest {
    pub volume_id: String,
    /// Where the source must become visible.
    pub target_path: String,
    pub volume_capability: Option<VolumeCapability>,
    /// Selects the mount source, see [`VolumeSource::from_context`].
    pub volume_context: HashMap<String, String>,
    /// Carried on the wire, not acted upon.
    pub read_only: bool,
}

// ---------------------------------------------------------------------------
// Plugin & node info
// ---------------------------------------------------------------------------

/// Static identity of the running driver.
#[derive(Debug, Clone, Default)]
pub struct DriverConfig {
    /// Plugin name, e.g. `"baggageclaim.worker.k8s.concourse-ci.org"`.
    pub driver_name: String,
    /// Vendor-provided version string.
    pub version: String,
    /// Identifier of the node running the driver.
    pub node_id: String,
    /// Binary bind-mounted for [`VolumeSource::InitBinary`].
    pub init_bin_path: PathBuf,
}

impl DriverConfig {
    /// Reject configurations the identity service could never answer for.
    pub fn validate(&self) -> Result<(), CsiError> {
        if self.driver_name.is_empty() {
            return Err(CsiError::InvalidConfig("no driver name provided".into()));
        }
        if self.version.is_empty() {
            return Err(CsiError::InvalidConfig("no driver version provided".into()));
        }
        Ok(())
    }
}

/// Information about the CSI plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub vendor_version: String,
}

/// Information about the node on which the CSI Node service runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub node_id: String,
}
