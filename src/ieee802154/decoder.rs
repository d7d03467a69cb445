//! IEEE 802.15.4 MAC header decoder
//!
//! Decodes just enough of the header for a one-line summary. Never fails:
//! fields that are unknown or missing from a short frame render as "".

use crate::device::RawFrame;

use super::types::{AddressMode, DecodedPacket, FrameType, BROADCAST, BROADCAST_ADDR, COMMAND_NAMES};

/// Byte cursor over the frame payload
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn take_byte(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    /// Format an address and advance past the bytes its mode occupies.
    fn address(&mut self, mode: AddressMode) -> String {
        let (text, consumed) = format_address(mode, &self.data[self.pos.min(self.data.len())..]);
        self.pos += consumed;
        text
    }
}

/// Format one address field. Returns the text and the number of bytes consumed.
pub fn format_address(mode: AddressMode, bytes: &[u8]) -> (String, usize) {
    match (mode, bytes) {
        (AddressMode::Short, [lo, hi, ..]) => {
            let addr = u16::from_le_bytes([*lo, *hi]);
            if addr == BROADCAST_ADDR {
                (BROADCAST.to_string(), 2)
            } else {
                (format!("0x{:04X}", addr), 2)
            }
        }
        _ => (String::new(), 0),
    }
}

/// Decode the MAC header of a captured frame.
pub fn decode(channel: u8, frame: &RawFrame) -> DecodedPacket {
    let data = &frame.data[..(frame.length as usize).min(frame.data.len())];

    let mut packet = DecodedPacket {
        channel,
        device: frame.device_id,
        length: frame.length,
        lqi: frame.rssi as u8,
        data: data.to_vec(),
        ..Default::default()
    };

    let Some(&fcf0) = data.first() else {
        return packet;
    };
    let fcf1 = data.get(1).copied().unwrap_or(0);

    let frame_type = FrameType::from(fcf0);
    packet.desc = frame_type.description().to_string();

    let dst_mode = AddressMode::from(fcf1 >> 2);
    let src_mode = AddressMode::from(fcf1 >> 6);

    let mut cursor = Cursor::new(data, 2);
    packet.seq = cursor.take_byte().unwrap_or(0);

    // PAN id follows the sequence number whenever a source address is present
    let pan_mode = match src_mode {
        AddressMode::Short | AddressMode::Extended => AddressMode::Short,
        _ => AddressMode::None,
    };
    packet.pan_addr = cursor.address(pan_mode);
    packet.dst_addr = cursor.address(dst_mode);
    packet.src_addr = cursor.address(src_mode);

    if frame_type == FrameType::MacCommand {
        if let Some(name) = cursor.peek().and_then(|id| COMMAND_NAMES.get(id as usize)) {
            packet.desc = name.to_string();
        }
    }

    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(bytes: &[u8]) -> RawFrame {
        RawFrame {
            length: bytes.len() as u8,
            data: bytes.to_vec(),
            rssi: -30,
            device_id: 0x0200,
        }
    }

    #[test]
    fn test_format_short_address() {
        assert_eq!(
            format_address(AddressMode::Short, &[0xFF, 0xFF]),
            ("Broadcast".to_string(), 2)
        );
        assert_eq!(
            format_address(AddressMode::Short, &[0x34, 0x12]),
            ("0x1234".to_string(), 2)
        );
        assert_eq!(
            format_address(AddressMode::Short, &[0x0A, 0x00, 0x99]),
            ("0x000A".to_string(), 2)
        );
    }

    #[test]
    fn test_format_none_and_extended() {
        assert_eq!(format_address(AddressMode::None, &[0x34, 0x12]), (String::new(), 0));
        assert_eq!(
            format_address(AddressMode::Extended, &[1, 2, 3, 4, 5, 6, 7, 8]),
            (String::new(), 0)
        );
        assert_eq!(format_address(AddressMode::Short, &[0x34]), (String::new(), 0));
    }

    #[test]
    fn test_decode_data_frame() {
        // Data, dst short, src short, seq 42, PAN 0x1A62, dst 0x0001, src broadcast
        let bytes = hex::decode("41882A621A0100FFFFDEADBE").unwrap();
        let packet = decode(20, &frame(&bytes));

        assert_eq!(packet.channel, 20);
        assert_eq!(packet.device, 0x0200);
        assert_eq!(packet.length, 12);
        assert_eq!(packet.lqi, (-30i8) as u8);
        assert_eq!(packet.desc, "Data");
        assert_eq!(packet.seq, 42);
        assert_eq!(packet.pan_addr, "0x1A62");
        assert_eq!(packet.dst_addr, "0x0001");
        assert_eq!(packet.src_addr, "Broadcast");
        assert_eq!(packet.data, bytes);
    }

    #[test]
    fn test_decode_ack() {
        let packet = decode(11, &frame(&[0x02, 0x00, 0x17]));
        assert_eq!(packet.desc, "Ack");
        assert_eq!(packet.seq, 0x17);
        assert_eq!(packet.pan_addr, "");
        assert_eq!(packet.dst_addr, "");
        assert_eq!(packet.src_addr, "");
    }

    #[test]
    fn test_decode_beacon_request_command() {
        // MAC command, dst short broadcast, no source, command id 7
        let bytes = hex::decode("0308C5FFFF07").unwrap();
        let packet = decode(15, &frame(&bytes));
        assert_eq!(packet.desc, "Beacon Request");
        assert_eq!(packet.seq, 0xC5);
        assert_eq!(packet.pan_addr, "");
        assert_eq!(packet.dst_addr, "Broadcast");
    }

    #[test]
    fn test_decode_unknown_command_keeps_description() {
        let bytes = hex::decode("0308C5FFFF0A").unwrap();
        let packet = decode(15, &frame(&bytes));
        assert_eq!(packet.desc, "");
        assert_eq!(packet.dst_addr, "Broadcast");
    }

    #[test]
    fn test_decode_extended_source_consumes_nothing() {
        // Data, dst short, src extended: PAN formatted, src left empty
        let bytes = hex::decode("41C801341278560102030405060708").unwrap();
        let packet = decode(25, &frame(&bytes));
        assert_eq!(packet.pan_addr, "0x1234");
        assert_eq!(packet.dst_addr, "0x5678");
        assert_eq!(packet.src_addr, "");
    }

    #[test]
    fn test_decode_truncated_frames() {
        let empty = decode(11, &frame(&[]));
        assert_eq!(empty.desc, "");
        assert_eq!(empty.seq, 0);

        let short = decode(11, &frame(&[0x41, 0x88, 0x05, 0x62]));
        assert_eq!(short.desc, "Data");
        assert_eq!(short.seq, 5);
        assert_eq!(short.pan_addr, "");
        assert_eq!(short.dst_addr, "");
        assert_eq!(short.src_addr, "");
    }
}
