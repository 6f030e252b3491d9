use std::sync::Arc;

use anyhow::{Context, Result};
use libcsi::{BaggageclaimClient, BaggageclaimDriver, CsiServer, DriverConfig, SystemMounter};
use tracing::info;

use crate::cli::CsiArgs;

pub async fn run(args: CsiArgs) -> Result<()> {
    info!("initializing");

    let volumes = BaggageclaimClient::new(&args.baggageclaim_url)
        .context("failed to create baggageclaim client")?;

    let config = DriverConfig {
        driver_name: args.csi_driver_name,
        version: env!("CARGO_PKG_VERSION").to_owned(),
        node_id: args.node_id,
        init_bin_path: args.init_bin_path,
    };
    let driver = BaggageclaimDriver::new(config, Arc::new(volumes), Arc::new(SystemMounter))
        .context("failed to create baggageclaim csi driver")?;
    let server = Arc::new(CsiServer::new(Arc::new(driver)));
    super::serve("csi driver", server, &args.csi_socket).await
}
