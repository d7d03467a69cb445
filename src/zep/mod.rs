//! ZEP (Zigbee Encapsulation Protocol) v2 forwarding

pub mod header;
mod session;

pub use header::ZepTimestamp;
pub use session::{
    parse_remote, DatagramSocket, ForwardError, ForwardSession, SendFailure, MAX_REMOTE_LEN,
    ZEP_PORT,
};

#[cfg(test)]
pub(crate) use session::tests::MockSocket;

use crate::device::RawFrame;

/// Fields the encapsulator needs from a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZepPacket<'a> {
    pub channel: u8,
    pub device: u16,
    pub length: u8,
    pub lqi: u8,
    pub data: &'a [u8],
}

impl<'a> ZepPacket<'a> {
    /// Forward the captured bytes unmodified; LQI carries the calibrated RSSI.
    pub fn from_raw(channel: u8, frame: &'a RawFrame) -> Self {
        Self {
            channel,
            device: frame.device_id,
            length: frame.length,
            lqi: frame.rssi as u8,
            data: &frame.data,
        }
    }
}
