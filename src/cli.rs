//! Command line interface

use clap::Parser;

use crate::device::protocol::{MAX_CHANNEL, MIN_CHANNEL};

/// Capture IEEE 802.15.4 traffic with a CC2531 dongle and forward it as ZEP
#[derive(Parser, Debug)]
#[command(name = "cc2531-sniffer", version, about)]
pub struct Cli {
    /// IEEE 802.15.4 channel to capture (11-26) [env: SNIFFER_CHANNEL]
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(MIN_CHANNEL as i64..=MAX_CHANNEL as i64))]
    pub channel: Option<u8>,

    /// IPv4 address of the analyzer receiving ZEP [env: SNIFFER_REMOTE]
    #[arg(short, long, value_parser = parse_remote_literal)]
    pub remote: Option<String>,

    /// Decode each frame's MAC header and log a one-line summary
    #[arg(short, long)]
    pub decode: bool,

    /// Destination UDP port [env: SNIFFER_ZEP_PORT, default: 17754]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

fn parse_remote_literal(s: &str) -> Result<String, String> {
    crate::zep::parse_remote(s, crate::zep::ZEP_PORT)
        .map(|_| s.to_string())
        .map_err(|e| e.to_string())
}
