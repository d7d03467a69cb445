//! IEEE 802.15.4 MAC header types

use std::fmt;

use crate::zep::ZepPacket;

/// MAC command names, indexed by command identifier
pub const COMMAND_NAMES: [&str; 10] = [
    "",
    "Association Request",
    "Association Response",
    "Disassociation Notification",
    "Data Request",
    "PAN ID Conflict",
    "Orphan Notification",
    "Beacon Request",
    "Coordinator Realignment",
    "GTS Request",
];

pub const BROADCAST: &str = "Broadcast";
pub const BROADCAST_ADDR: u16 = 0xFFFF;

/// Frame type, low 3 bits of the frame control field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Beacon,
    Data,
    Ack,
    MacCommand,
    Reserved(u8),
}

impl From<u8> for FrameType {
    fn from(fcf: u8) -> Self {
        match fcf & 0x07 {
            0 => Self::Beacon,
            1 => Self::Data,
            2 => Self::Ack,
            3 => Self::MacCommand,
            other => Self::Reserved(other),
        }
    }
}

impl FrameType {
    /// Summary text; MAC commands are described by their command name instead.
    pub fn description(self) -> &'static str {
        match self {
            Self::Beacon => "Beacon",
            Self::Data => "Data",
            Self::Ack => "Ack",
            Self::MacCommand | Self::Reserved(_) => "",
        }
    }
}

/// Addressing mode, 2 bits of the second frame control byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    None,
    Reserved,
    Short,
    /// 64-bit addresses are not rendered and consume no bytes
    Extended,
}

impl From<u8> for AddressMode {
    fn from(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::None,
            1 => Self::Reserved,
            2 => Self::Short,
            _ => Self::Extended,
        }
    }
}

/// Captured frame with its decoded header summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedPacket {
    pub channel: u8,
    pub device: u16,
    pub length: u8,
    pub lqi: u8,
    pub data: Vec<u8>,
    pub src_addr: String,
    pub dst_addr: String,
    pub pan_addr: String,
    pub seq: u8,
    pub desc: String,
}

impl DecodedPacket {
    pub fn as_zep(&self) -> ZepPacket<'_> {
        ZepPacket {
            channel: self.channel,
            device: self.device,
            length: self.length,
            lqi: self.lqi,
            data: &self.data,
        }
    }
}

impl fmt::Display for DecodedPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
        write!(
            f,
            "ch={} seq={:3} type={} pan={} dst={} src={} len={} lqi={}",
            self.channel,
            self.seq,
            or_dash(&self.desc),
            or_dash(&self.pan_addr),
            or_dash(&self.dst_addr),
            or_dash(&self.src_addr),
            self.length,
            self.lqi as i8
        )
    }
}
