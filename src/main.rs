//! CC2531 Sniffer - IEEE 802.15.4 capture to ZEP
//!
//! Reads frames from a CC2531 USB dongle and streams them to a remote
//! analyzer (e.g. Wireshark) as ZEP v2 datagrams.

use std::thread;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tokio::sync::oneshot;
use tracing::{error, info};

use cc2531_sniffer::capture;
use cc2531_sniffer::cli::Cli;
use cc2531_sniffer::config::Config;
use cc2531_sniffer::device::CaptureStats;
use cc2531_sniffer::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose);

    let config = Config::from_env().with_cli(&cli);
    if let Err(e) = config.validate() {
        Cli::command()
            .error(clap::error::ErrorKind::ValueValidation, e)
            .exit();
    }

    info!("===========================================");
    info!("   CC2531 Sniffer - IEEE 802.15.4 to ZEP");
    info!("===========================================");
    info!("Configuration:");
    info!("  Channel: {}", config.channel);
    info!("  Remote: {}:{}", config.remote, config.zep_port);
    info!("  Mode: {}", config.mode);

    let stats = CaptureStats::new();
    let (done_tx, done_rx) = oneshot::channel();

    // USB reads block indefinitely, so capture runs on its own thread
    {
        let config = config.clone();
        let stats = stats.clone();
        thread::Builder::new()
            .name("cc2531-capture".to_string())
            .spawn(move || {
                let result = capture::run_capture(&config, stats);
                let _ = done_tx.send(result);
            })
            .context("Failed to spawn capture thread")?;
    }

    info!("Press Ctrl+C to stop.");

    let result = tokio::select! {
        outcome = done_rx => outcome.context("Capture thread exited without a result")?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    };

    if let Err(e) = &result {
        error!("Sniffer stopped: {:#}", e);
    }
    info!("Shutdown complete. {}", stats);

    result
}
