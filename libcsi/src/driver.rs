//! The baggageclaim node driver.
//!
//! Publishing bind-mounts a host directory onto the pod's target path. The
//! directory is either a baggageclaim volume or the worker's init binary,
//! chosen by the request's volume context. Nothing is staged.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::error::CsiError;
use crate::identity::CsiIdentity;
use crate::mount::Mounter;
use crate::node::CsiNode;
use crate::types::{
    DriverConfig, NodeInfo, NodePublishVolumeRequest, PluginInfo, VolumeSource,
};
use crate::volume::VolumeStore;

const TARGET_PARENT_MODE: u32 = 0o750;

/// CSI identity and node service for baggageclaim volumes.
pub struct BaggageclaimDriver {
    config: DriverConfig,
    volumes: Arc<dyn VolumeStore>,
    mounter: Arc<dyn Mounter>,
}

impl BaggageclaimDriver {
    /// Fails with [`CsiError::InvalidConfig`] when the driver name or
    /// version is empty.
    pub fn new(
        config: DriverConfig,
        volumes: Arc<dyn VolumeStore>,
        mounter: Arc<dyn Mounter>,
    ) -> Result<Self, CsiError> {
        config.validate()?;
        Ok(Self {
            config,
            volumes,
            mounter,
        })
    }

    async fn resolve_source(&self, source: &VolumeSource) -> Result<PathBuf, CsiError> {
        match source {
            VolumeSource::InitBinary => Ok(self.config.init_bin_path.clone()),
            VolumeSource::Handle(handle) => match self.volumes.lookup(handle).await {
                Ok(Some(path)) => Ok(path),
                Ok(None) => {
                    info!(%handle, "volume not found");
                    Err(CsiError::VolumeNotFound(handle.to_string()))
                }
                Err(e) => {
                    warn!(%handle, error = %e, "failed to lookup volume");
                    Err(e)
                }
            },
        }
    }
}

/// Make sure `target` exists as a directory, creating it and its parents.
async fn prepare_target(target: &Path) -> Result<(), CsiError> {
    if let Some(parent) = target.parent() {
        tokio::fs::DirBuilder::new()
            .recursive(true)
            .mode(TARGET_PARENT_MODE)
            .create(parent)
            .await
            .map_err(|e| CsiError::invalid(format!("unable to create mount directory: {e}")))?;
    }

    match tokio::fs::metadata(target).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(CsiError::NotADirectory(target.display().to_string())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            match tokio::fs::DirBuilder::new()
                .mode(TARGET_PARENT_MODE)
                .create(target)
                .await
            {
                Ok(()) => Ok(()),
                // Lost a race with a concurrent publish of the same target.
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
                Err(e) => Err(CsiError::io(
                    format!("unable to create mount point '{}'", target.display()),
                    e,
                )),
            }
        }
        Err(e) => Err(CsiError::io("failed to check target path", e)),
    }
}

/// Remove `target`, whatever it is. A missing path is fine.
async fn remove_target(target: &Path) -> Result<(), CsiError> {
    let removed = match tokio::fs::symlink_metadata(target).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(target).await,
        Ok(_) => tokio::fs::remove_file(target).await,
        Err(e) => Err(e),
    };
    match removed {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            Err(CsiError::io("remove target path", e))
        }
        _ => Ok(()),
    }
}

#[async_trait]
impl CsiIdentity for BaggageclaimDriver {
    async fn get_plugin_info(&self) -> Result<PluginInfo, CsiError> {
        if self.config.driver_name.is_empty() {
            return Err(CsiError::Unavailable("driver name not configured".into()));
        }
        if self.config.version.is_empty() {
            return Err(CsiError::Unavailable("driver is missing version".into()));
        }
        Ok(PluginInfo {
            name: self.config.driver_name.clone(),
            vendor_version: self.config.version.clone(),
        })
    }
}

#[async_trait]
impl CsiNode for BaggageclaimDriver {
    #[instrument(skip_all, fields(volume_id = %req.volume_id, target = %req.target_path))]
    async fn publish_volume(&self, req: NodePublishVolumeRequest) -> Result<(), CsiError> {
        let capability = req
            .volume_capability
            .as_ref()
            .ok_or_else(|| CsiError::invalid("volume capability missing in request"))?;
        if !capability.is_mount() {
            return Err(CsiError::invalid("driver only supports mount access type"));
        }
        if req.target_path.is_empty() {
            return Err(CsiError::invalid("target path missing in request"));
        }
        let target = Path::new(&req.target_path);

        if let Ok(true) = self.mounter.is_mount_point(target) {
            debug!("target already mounted, assuming idempotent retry");
            return Ok(());
        }

        prepare_target(target).await?;

        let source_kind = VolumeSource::from_context(&req.volume_context)?;
        let source = self.resolve_source(&source_kind).await?;

        debug!(source = %source.display(), "binding path to pod");
        self.mounter
            .bind_mount(&source, target)
            .map_err(|e| CsiError::MountFailed {
                source_path: source.display().to_string(),
                target: req.target_path.clone(),
                reason: e.to_string(),
            })?;

        info!(source = %source.display(), "volume published");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn unpublish_volume(&self, volume_id: &str, target_path: &str) -> Result<(), CsiError> {
        if target_path.is_empty() {
            return Err(CsiError::invalid("target path missing in request"));
        }
        let target = Path::new(target_path);

        match self.mounter.is_mount_point(target) {
            Ok(true) => {
                self.mounter
                    .unmount(target)
                    .map_err(|e| CsiError::UnmountFailed {
                        path: target_path.to_owned(),
                        reason: e.to_string(),
                    })?;
            }
            Ok(false) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CsiError::io("check target path", e)),
        }

        remove_target(target).await?;
        debug!("volume has been unpublished");
        Ok(())
    }

    async fn get_info(&self) -> Result<NodeInfo, CsiError> {
        Ok(NodeInfo {
            node_id: self.config.node_id.clone(),
        })
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::testing::{FakeMounter, FakeVolumes};
    use super::*;
    use crate::types::{AccessType, HANDLE_KEY, INIT_BINARY_KEY, VolumeCapability};

    fn config() -> DriverConfig {
        DriverConfig {
            driver_name: "baggageclaim.worker.k8s.concourse-ci.org".into(),
            version: "0.1.0".into(),
            node_id: "node-a".into(),
            init_bin_path: PathBuf::from("/usr/local/concourse/bin/init"),
        }
    }

    fn driver_with(volumes: FakeVolumes, mounter: Arc<FakeMounter>) -> BaggageclaimDriver {
        BaggageclaimDriver::new(config(), Arc::new(volumes), mounter).unwrap()
    }

    fn volumes() -> FakeVolumes {
        FakeVolumes {
            paths: HashMap::from([("vol-42".to_owned(), PathBuf::from("/data/vol-42"))]),
            fail: false,
        }
    }

    fn publish(target: &Path, ctx: &[(&str, &str)]) -> NodePublishVolumeRequest {
        NodePublishVolumeRequest {
            volume_id: "pvc-1".into(),
            target_path: target.display().to_string(),
            volume_capability: Some(VolumeCapability::mount()),
            volume_context: ctx
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            read_only: false,
        }
    }

    #[tokio::test]
    async fn publishes_volume_by_handle() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("pods/p1/mount");
        let mounter = Arc::new(FakeMounter::default());
        let driver = driver_with(volumes(), mounter.clone());

        driver
            .publish_volume(publish(&target, &[(HANDLE_KEY, "vol-42")]))
            .await
            .unwrap();

        assert!(target.is_dir());
        let calls = mounter.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(PathBuf::from("/data/vol-42"), target.clone())]);
    }

    #[tokio::test]
    async fn publishes_init_binary() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("init");
        let mounter = Arc::new(FakeMounter::default());
        let driver = driver_with(volumes(), mounter.clone());

        driver
            .publish_volume(publish(&target, &[(INIT_BINARY_KEY, "")]))
            .await
            .unwrap();

        let calls = mounter.calls.lock().unwrap().clone();
        assert_eq!(calls[0].0, PathBuf::from("/usr/local/concourse/bin/init"));
    }

    #[tokio::test]
    async fn publish_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("mount");
        let mounter = Arc::new(FakeMounter::default());
        let driver = driver_with(volumes(), mounter.clone());

        let req = publish(&target, &[(HANDLE_KEY, "vol-42")]);
        driver.publish_volume(req.clone()).await.unwrap();
        driver.publish_volume(req).await.unwrap();

        assert_eq!(mounter.call_count(), 1);
    }

    #[tokio::test]
    async fn missing_volume_is_not_found_and_nothing_mounted() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("mount");
        let mounter = Arc::new(FakeMounter::default());
        let driver = driver_with(FakeVolumes::default(), mounter.clone());

        let err = driver
            .publish_volume(publish(&target, &[(HANDLE_KEY, "vol-404")]))
            .await
            .unwrap_err();

        assert!(matches!(err, CsiError::VolumeNotFound(_)));
        assert_eq!(mounter.call_count(), 0);
    }

    #[tokio::test]
    async fn volume_store_failure_propagates() {
        let tmp = tempfile::tempdir().unwrap();
        let mounter = Arc::new(FakeMounter::default());
        let store = FakeVolumes {
            fail: true,
            ..Default::default()
        };
        let driver = driver_with(store, mounter.clone());

        let err = driver
            .publish_volume(publish(&tmp.path().join("t"), &[(HANDLE_KEY, "vol-42")]))
            .await
            .unwrap_err();
        assert!(matches!(err, CsiError::BackendError(_)));
        assert_eq!(mounter.call_count(), 0);
    }

    #[tokio::test]
    async fn publish_rejects_bad_requests() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("mount");
        let driver = driver_with(volumes(), Arc::new(FakeMounter::default()));

        let mut no_cap = publish(&target, &[(HANDLE_KEY, "vol-42")]);
        no_cap.volume_capability = None;

        let mut block = publish(&target, &[(HANDLE_KEY, "vol-42")]);
        block.volume_capability = Some(VolumeCapability {
            access_type: Some(AccessType::Block),
        });

        let mut unset = publish(&target, &[(HANDLE_KEY, "vol-42")]);
        unset.volume_capability = Some(VolumeCapability { access_type: None });

        let mut no_target = publish(&target, &[(HANDLE_KEY, "vol-42")]);
        no_target.target_path.clear();

        let neither = publish(&target, &[]);
        let both = publish(&target, &[(HANDLE_KEY, "vol-42"), (INIT_BINARY_KEY, "")]);
        let empty_handle = publish(&target, &[(HANDLE_KEY, "")]);

        for req in [no_cap, block, unset, no_target, neither, both, empty_handle] {
            let err = driver.publish_volume(req).await.unwrap_err();
            assert!(matches!(err, CsiError::InvalidArgument(_)), "{err}");
        }
    }

    #[tokio::test]
    async fn publish_onto_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("file");
        std::fs::write(&target, b"x").unwrap();
        let mounter = Arc::new(FakeMounter::default());
        let driver = driver_with(volumes(), mounter.clone());

        let err = driver
            .publish_volume(publish(&target, &[(HANDLE_KEY, "vol-42")]))
            .await
            .unwrap_err();
        assert!(matches!(err, CsiError::NotADirectory(_)));
        assert_eq!(mounter.call_count(), 0);
    }

    #[tokio::test]
    async fn mount_failure_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let mounter = Arc::new(FakeMounter {
            fail_mount: true,
            ..Default::default()
        });
        let driver = driver_with(volumes(), mounter);

        let err = driver
            .publish_volume(publish(&tmp.path().join("t"), &[(HANDLE_KEY, "vol-42")]))
            .await
            .unwrap_err();
        assert!(matches!(err, CsiError::MountFailed { .. }));
    }

    #[tokio::test]
    async fn unpublish_unmounts_and_removes() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("mount");
        let mounter = Arc::new(FakeMounter::default());
        let driver = driver_with(volumes(), mounter.clone());

        driver
            .publish_volume(publish(&target, &[(HANDLE_KEY, "vol-42")]))
            .await
            .unwrap();
        assert!(mounter.mounted(&target));

        let path = target.display().to_string();
        driver.unpublish_volume("pvc-1", &path).await.unwrap();
        assert!(!mounter.mounted(&target));
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn repeated_unpublish_never_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("never-published");
        let driver = driver_with(volumes(), Arc::new(FakeMounter::default()));
        let path = target.display().to_string();

        for _ in 0..3 {
            driver.unpublish_volume("pvc-1", &path).await.unwrap();
            assert!(!target.exists());
        }
    }

    #[tokio::test]
    async fn failed_unmount_keeps_target_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("mount");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("artifact"), b"build output").unwrap();
        let mounter = Arc::new(FakeMounter {
            fail_unmount: true,
            ..Default::default()
        });
        mounter.mounts.lock().unwrap().insert(target.clone());
        let driver = driver_with(volumes(), mounter.clone());

        let err = driver
            .unpublish_volume("pvc-1", &target.display().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, CsiError::UnmountFailed { .. }), "{err}");
        assert!(mounter.mounted(&target));
        assert_eq!(std::fs::read(target.join("artifact")).unwrap(), b"build output");
    }

    #[tokio::test]
    async fn unpublish_probe_error_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("mount");
        std::fs::create_dir(&target).unwrap();
        let mounter = Arc::new(FakeMounter {
            probe_error: Some(io::ErrorKind::PermissionDenied),
            ..Default::default()
        });
        let driver = driver_with(volumes(), mounter);

        let err = driver
            .unpublish_volume("pvc-1", &target.display().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, CsiError::Io { .. }), "{err}");
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn uncreatable_parent_is_invalid() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let mounter = Arc::new(FakeMounter::default());
        let driver = driver_with(volumes(), mounter.clone());

        let err = driver
            .publish_volume(publish(&blocker.join("pod/mount"), &[(HANDLE_KEY, "vol-42")]))
            .await
            .unwrap_err();
        assert!(matches!(err, CsiError::InvalidArgument(_)), "{err}");
        assert_eq!(mounter.call_count(), 0);
    }

    #[tokio::test]
    async fn unpublish_requires_target() {
        let driver = driver_with(volumes(), Arc::new(FakeMounter::default()));
        let err = driver.unpublish_volume("pvc-1", "").await.unwrap_err();
        assert!(matches!(err, CsiError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn identity_reports_config() {
        let driver = driver_with(volumes(), Arc::new(FakeMounter::default()));
        let info = driver.get_plugin_info().await.unwrap();
        assert_eq!(info.name, "baggageclaim.worker.k8s.concourse-ci.org");
        assert_eq!(info.vendor_version, "0.1.0");
        assert!(driver.probe().await.unwrap());
        assert!(driver.get_plugin_capabilities().await.unwrap().is_empty());
        assert_eq!(driver.get_info().await.unwrap().node_id, "node-a");
        assert!(driver.get_capabilities().await.unwrap().is_empty());
    }

    #[test]
    fn construction_requires_name_and_version() {
        let mut no_version = config();
        no_version.version.clear();
        let mut no_name = config();
        no_name.driver_name.clear();

        for cfg in [no_version, no_name] {
            let err = BaggageclaimDriver::new(
                cfg,
                Arc::new(FakeVolumes::default()),
                Arc::new(FakeMounter::default()),
            )
            .err()
            .unwrap();
            assert!(matches!(err, CsiError::InvalidConfig(_)));
        }
    }

    #[tokio::test]
    async fn identity_unavailable_without_name_or_version() {
        let unnamed = |cfg: DriverConfig| BaggageclaimDriver {
            config: cfg,
            volumes: Arc::new(FakeVolumes::default()),
            mounter: Arc::new(FakeMounter::default()),
        };

        let mut cfg = config();
        cfg.version.clear();
        let err = unnamed(cfg).get_plugin_info().await.unwrap_err();
        assert!(matches!(err, CsiError::Unavailable(_)));

        let mut cfg = config();
        cfg.driver_name.clear();
        let err = unnamed(cfg).get_plugin_info().await.unwrap_err();
        assert!(matches!(err, CsiError::Unavailable(_)));
    }

    #[tokio::test]
    async fn unused_node_rpcs_are_unimplemented() {
        let driver = driver_with(volumes(), Arc::new(FakeMounter::default()));
        assert!(matches!(
            driver.stage_volume().await,
            Err(CsiError::Unimplemented(_))
        ));
        assert!(matches!(
            driver.unstage_volume().await,
            Err(CsiError::Unimplemented(_))
        ));
        assert!(matches!(
            driver.volume_stats().await,
            Err(CsiError::Unimplemented(_))
        ));
        assert!(matches!(
            driver.expand_volume().await,
            Err(CsiError::Unimplemented(_))
        ));
    }
}
