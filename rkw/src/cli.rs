//! Command line surface.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use libserve::BindAddress;

use crate::logging::LogFormat;

/// Kubernetes worker adapters for Concourse.
#[derive(Debug, Parser)]
#[command(name = "rkw", version, about)]
pub struct Cli {
    /// Log level or filter directive; `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the Garden API backed by pods.
    Garden(GardenArgs),
    /// Serve the baggageclaim CSI node driver.
    Csi(CsiArgs),
    /// Wait for a client to attach, then exec a command.
    Init(InitArgs),
}

#[derive(Debug, Args)]
pub struct GardenArgs {
    /// Address on which to serve the Garden API.
    #[arg(long, default_value = "tcp://:7777")]
    pub bind_address: BindAddress,

    /// Kubernetes namespace holding the worker's pods.
    #[arg(long)]
    pub namespace: String,

    /// Name of this pod.
    #[arg(long)]
    pub pod_name: String,

    /// Name of this worker.
    #[arg(long)]
    pub worker_name: String,

    /// Label added to this pod with the worker's name.
    #[arg(long, default_value = libgarden::config::DEFAULT_WORKER_LABEL)]
    pub worker_label_name: String,

    /// Label identifying the pods that belong to this worker.
    #[arg(long, default_value = libgarden::config::DEFAULT_OWNER_LABEL)]
    pub owner_label_name: String,
}

#[derive(Debug, Args)]
pub struct CsiArgs {
    /// Baggageclaim API of this node, e.g. `http://127.0.0.1:7788`.
    #[arg(long)]
    pub baggageclaim_url: String,

    /// Name of the CSI driver.
    #[arg(long, default_value = "baggageclaim.worker.k8s.concourse-ci.org")]
    pub csi_driver_name: String,

    /// Socket path or address to serve the CSI gRPC services on.
    #[arg(long, default_value = "/tmp/csi.sock")]
    pub csi_socket: BindAddress,

    /// Binary that keeps a pod alive while steps run in it.
    #[arg(long, default_value = "/usr/local/concourse/bin/init")]
    pub init_bin_path: PathBuf,

    /// ID of the node running the driver.
    #[arg(long)]
    pub node_id: String,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Line expected on stdin once the client has attached.
    #[arg(long, default_value = "client-attached")]
    pub signal_message: String,

    /// How often to log that we are still waiting.
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration)]
    pub interval: Duration,

    /// Exec the command immediately.
    #[arg(long)]
    pub skip_waiting: bool,

    /// Command to exec, with its arguments.
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}
