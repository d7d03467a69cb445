//! CC2531 sniffer firmware USB protocol
//!
//! Vendor control requests used to configure the radio, and the layout of
//! the frames delivered on the bulk IN endpoint:
//!
//! ```text
//! offset 0  info        u8      0 = captured frame, anything else = status
//! offset 1  length      u16 LE  informational only
//! offset 3  timestamp   u32 LE
//! offset 7  payload len u8      authoritative
//! offset 8  payload     [len]
//! offset 8+len rssi     u8      raw, dBm = raw - 73
//! ```

use std::time::Duration;

pub const USB_VID: u16 = 0x0451;
pub const USB_PID: u16 = 0x16AE;
pub const INTERFACE: u8 = 0;

pub const BULK_ENDPOINT: u8 = 0x83;
pub const BUFFER_SIZE: usize = 256;

/// Timeout for control transfers. Bulk reads wait forever.
pub const CONTROL_TIMEOUT: Duration = Duration::from_millis(1000);

pub const REQUEST_TYPE_OUT: u8 = 0x00;
pub const REQUEST_TYPE_VENDOR_IN: u8 = 0xC0;
pub const REQUEST_TYPE_VENDOR_OUT: u8 = 0x40;

/// Standard request carrying the configuration value (0 idle, 1 active)
pub const REQUEST_SET_CONFIG: u8 = 9;
pub const CONFIG_IDLE: u16 = 0;
pub const CONFIG_ACTIVE: u16 = 1;

pub const REG_CALIBRATION: u8 = 192;
pub const CALIBRATION_LEN: usize = 256;
pub const REG_CHANNEL_SETUP: u8 = 197;
pub const CHANNEL_SETUP_INDEX: u16 = 4;
pub const REG_STATUS: u8 = 198;
pub const STATUS_READY: u8 = 4;
pub const REG_ACTIVATE: u8 = 201;
pub const REG_CAPTURE_ENABLE: u8 = 208;
pub const REG_CHANNEL: u8 = 210;
pub const CHANNEL_INDEX_SELECT: u16 = 0;
pub const CHANNEL_INDEX_ARM: u16 = 1;

pub const ACK_POLL_ATTEMPTS: u32 = 20;
pub const ACK_POLL_INTERVAL: Duration = Duration::from_micros(62_400);

pub const MIN_CHANNEL: u8 = 11;
pub const MAX_CHANNEL: u8 = 26;

/// Calibration offset of the RSSI byte reported by the firmware
pub const RSSI_OFFSET: u8 = 73;

const HEADER_LEN: usize = 7;
const PAYLOAD_LEN_OFFSET: usize = 7;
const PAYLOAD_OFFSET: usize = 8;

pub fn is_valid_channel(channel: u8) -> bool {
    (MIN_CHANNEL..=MAX_CHANNEL).contains(&channel)
}

/// Calibrated RSSI in dBm, with the firmware's 8-bit wraparound.
pub fn rssi_from_raw(raw: u8) -> i8 {
    raw.wrapping_sub(RSSI_OFFSET) as i8
}

/// One captured IEEE 802.15.4 frame, copied out of the transfer buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub length: u8,
    pub data: Vec<u8>,
    pub rssi: i8,
    pub device_id: u16,
}

/// Fixed header at the start of every bulk transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferHeader {
    pub info: u8,
    pub length: u16,
    pub timestamp: u32,
}

/// What a single bulk transfer turned out to contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transfer {
    /// Device status or ack; never surfaced as a frame
    Status(TransferHeader),
    /// Captured radio frame
    Data {
        header: TransferHeader,
        payload: Vec<u8>,
        raw_rssi: u8,
    },
    /// Too short to hold the header, the payload it announces, or the RSSI byte
    Truncated { transferred: usize },
}

impl TransferHeader {
    fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            info: buf[0],
            length: u16::from_le_bytes([buf[1], buf[2]]),
            timestamp: u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]),
        })
    }
}

/// Parse the bytes actually transferred into an owned result.
pub fn parse_transfer(buf: &[u8]) -> Transfer {
    let Some(header) = TransferHeader::parse(buf) else {
        return Transfer::Truncated { transferred: buf.len() };
    };

    if header.info != 0 {
        return Transfer::Status(header);
    }

    let Some(&len) = buf.get(PAYLOAD_LEN_OFFSET) else {
        return Transfer::Truncated { transferred: buf.len() };
    };
    let end = PAYLOAD_OFFSET + len as usize;
    match buf.get(end) {
        Some(&raw_rssi) => Transfer::Data {
            header,
            payload: buf[PAYLOAD_OFFSET..end].to_vec(),
            raw_rssi,
        },
        None => Transfer::Truncated { transferred: buf.len() },
    }
}
