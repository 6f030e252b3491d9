use std::sync::Arc;

use anyhow::{Context, Result};
use libgarden::{GardenBackend, GardenConfig, GardenServer, KubePodClient};
use tracing::info;

use crate::cli::GardenArgs;

pub async fn run(args: GardenArgs) -> Result<()> {
    info!("initializing");

    let pods = KubePodClient::try_default(&args.namespace)
        .await
        .context("failed to initialize api client")?;

    let config = GardenConfig {
        namespace: args.namespace,
        worker_name: args.worker_name,
        owner_label: args.owner_label_name,
        worker_label: args.worker_label_name,
    };
    let backend = Arc::new(GardenBackend::new(config, Arc::new(pods)));

    backend
        .label_worker_pod(&args.pod_name)
        .await
        .context("failed to patch worker label")?;

    let server = Arc::new(GardenServer::new(backend));
    super::serve("garden", server, &args.bind_address).await
}
