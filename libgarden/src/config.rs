//! Garden backend configuration.

/// Label put on pods started for a worker; the value is the worker name.
pub const DEFAULT_OWNER_LABEL: &str = "atc.k8s.concourse-ci.org/worker";

/// Label the worker puts on its own pod at startup.
pub const DEFAULT_WORKER_LABEL: &str = "baggageclaim.worker.k8s.concourse-ci.org/name";

/// Where the backend looks for pods and which of them it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GardenConfig {
    /// Namespace holding the worker's pods.
    pub namespace: String,
    /// Value of the ownership label on this worker's pods.
    pub worker_name: String,
    /// Key of the ownership label used to list containers.
    pub owner_label: String,
    /// Key of the label written on the worker's own pod.
    pub worker_label: String,
}

impl GardenConfig {
    pub fn new(namespace: impl Into<String>, worker_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            worker_name: worker_name.into(),
            owner_label: DEFAULT_OWNER_LABEL.to_owned(),
            worker_label: DEFAULT_WORKER_LABEL.to_owned(),
        }
    }

    /// Label selector matching this worker's containers.
    pub fn owner_selector(&self) -> String {
        format!("{}={}", self.owner_label, self.worker_name)
    }
}
