//! CSI Identity service.

use async_trait::async_trait;

use crate::error::CsiError;
use crate::types::{PluginCapability, PluginInfo};

/// What the orchestrator learns about the plugin before talking to the node
/// service.
#[async_trait]
pub trait CsiIdentity: Send + Sync {
    /// Name and vendor version. Fails with [`CsiError::Unavailable`] when
    /// either is not configured.
    async fn get_plugin_info(&self) -> Result<PluginInfo, CsiError>;

    /// Readiness. A node-only plugin has nothing to warm up.
    async fn probe(&self) -> Result<bool, CsiError> {
        Ok(true)
    }

    /// No controller service is offered, so nothing is advertised.
    async fn get_plugin_capabilities(&self) -> Result<Vec<PluginCapability>, CsiError> {
        Ok(Vec::new())
    }
}
