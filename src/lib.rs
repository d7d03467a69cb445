//! CC2531 sniffer - IEEE 802.15.4 capture forwarded as ZEP
//!
//! Captures frames with a TI CC2531 USB dongle running the sniffer firmware,
//! optionally decodes the MAC header, and streams every frame to a remote
//! analyzer as ZEP v2 over UDP.

pub mod capture;
pub mod cli;
pub mod config;
pub mod device;
pub mod ieee802154;
pub mod logging;
pub mod zep;
