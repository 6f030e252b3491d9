//! `rkw`: the rk8s worker adapters.
//!
//! `rkw garden` answers the Garden API with pods, `rkw csi` serves the
//! baggageclaim CSI node driver and `rkw init` is the keep-alive entrypoint
//! of step pods.

mod cli;
mod commands;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::{Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level, cli.log_format)?;

    match cli.command {
        // Runs without a runtime: it ends in exec.
        Command::Init(args) => commands::init::run(args),
        Command::Garden(args) => runtime()?.block_on(commands::garden::run(args)),
        Command::Csi(args) => runtime()?.block_on(commands::csi::run(args)),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")
}
