//! Container projection and the closed set of Garden operations.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::api::core::v1::Pod;
use serde::Serialize;

/// Read-only view of the pod behind a container handle.
///
/// Built fresh from each cluster response; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerView {
    pub handle: String,
    pub namespace: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub phase: Option<String>,
}

impl From<&Pod> for ContainerView {
    fn from(pod: &Pod) -> Self {
        Self {
            handle: pod.metadata.name.clone().unwrap_or_default(),
            namespace: pod.metadata.namespace.clone(),
            labels: pod.metadata.labels.clone().unwrap_or_default(),
            phase: pod.status.as_ref().and_then(|s| s.phase.clone()),
        }
    }
}

/// Operations the backend actually performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerOp {
    Lookup,
    List,
    Destroy,
    Stop,
}

impl ContainerOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lookup => "lookup",
            Self::List => "list",
            Self::Destroy => "destroy",
            Self::Stop => "stop",
        }
    }
}

impl fmt::Display for ContainerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Garden operations a pod-backed worker refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedOp {
    Create,
    Info,
    StreamIn,
    StreamOut,
    BandwidthLimits,
    CpuLimits,
    DiskLimits,
    MemoryLimits,
    NetIn,
    NetOut,
    BulkNetOut,
    Run,
    Attach,
    Metrics,
    SetGraceTime,
    Properties,
    Property,
    SetProperty,
    RemoveProperty,
}

impl UnsupportedOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Info => "info",
            Self::StreamIn => "stream-in",
            Self::StreamOut => "stream-out",
            Self::BandwidthLimits => "current-bandwidth-limits",
            Self::CpuLimits => "current-cpu-limits",
            Self::DiskLimits => "current-disk-limits",
            Self::MemoryLimits => "current-memory-limits",
            Self::NetIn => "net-in",
            Self::NetOut => "net-out",
            Self::BulkNetOut => "bulk-net-out",
            Self::Run => "run",
            Self::Attach => "attach",
            Self::Metrics => "metrics",
            Self::SetGraceTime => "set-grace-time",
            Self::Properties => "properties",
            Self::Property => "property",
            Self::SetProperty => "set-property",
            Self::RemoveProperty => "remove-property",
        }
    }
}

impl fmt::Display for UnsupportedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    #[test]
    fn view_from_pod() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("c-1".into()),
                namespace: Some("ci".into()),
                labels: Some(BTreeMap::from([("worker".into(), "w1".into())])),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some("Running".into()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let view = ContainerView::from(&pod);
        assert_eq!(view.handle, "c-1");
        assert_eq!(view.namespace.as_deref(), Some("ci"));
        assert_eq!(view.labels["worker"], "w1");
        assert_eq!(view.phase.as_deref(), Some("Running"));
    }

    #[test]
    fn view_from_bare_pod() {
        let view = ContainerView::from(&Pod::default());
        assert!(view.handle.is_empty());
        assert!(view.labels.is_empty());
        assert_eq!(view.phase, None);
    }
}
