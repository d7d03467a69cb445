//! IEEE 802.15.4 MAC header decoding

mod decoder;
mod types;

pub use decoder::{decode, format_address};
pub use types::{AddressMode, DecodedPacket, FrameType, COMMAND_NAMES};
