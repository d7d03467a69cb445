//! Configuration loaded from environment variables and the command line

use std::time::Duration;

use thiserror::Error;

use crate::capture::ForwardMode;
use crate::cli::Cli;
use crate::device::protocol::is_valid_channel;
use crate::zep::{parse_remote, ZEP_PORT};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing IEEE 802.15.4 channel")]
    MissingChannel,

    #[error("Channel {0} out of range. Must be from 11 to 26.")]
    ChannelOutOfRange(u8),

    #[error("Missing remote address")]
    MissingRemote,

    #[error(transparent)]
    InvalidRemote(#[from] crate::zep::ForwardError),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// IEEE 802.15.4 channel, 0 when unset
    pub channel: u8,

    /// IPv4 address of the analyzer receiving ZEP
    pub remote: String,

    /// Destination UDP port
    pub zep_port: u16,

    /// Raw forwarding or decode + summary
    pub mode: ForwardMode,

    /// Capture statistics logging interval
    pub stats_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            channel: var("SNIFFER_CHANNEL")
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),

            remote: var("SNIFFER_REMOTE").unwrap_or_default(),

            zep_port: var("SNIFFER_ZEP_PORT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(ZEP_PORT),

            mode: var("SNIFFER_MODE")
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),

            stats_interval: var("SNIFFER_STATS_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(10)),
        }
    }

    /// Command line values take precedence over the environment.
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(channel) = cli.channel {
            self.channel = channel;
        }
        if let Some(remote) = &cli.remote {
            self.remote = remote.clone();
        }
        if let Some(port) = cli.port {
            self.zep_port = port;
        }
        if cli.decode {
            self.mode = ForwardMode::Decode;
        }
        self
    }

    /// Reject configurations before any device I/O happens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel == 0 {
            return Err(ConfigError::MissingChannel);
        }
        if !is_valid_channel(self.channel) {
            return Err(ConfigError::ChannelOutOfRange(self.channel));
        }
        if self.remote.is_empty() {
            return Err(ConfigError::MissingRemote);
        }
        parse_remote(&self.remote, self.zep_port)?;
        Ok(())
    }
}
