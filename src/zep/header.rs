//! ZEP v2 data header encoding
//!
//! ```text
//!  0  "EX"         2
//!  2  version      1  = 2
//!  3  type         1  = 1 (data)
//!  4  channel      1
//!  5  device id    2  BE
//!  7  lqi mode     1  = 0
//!  8  lqi          1
//!  9  seconds      4  BE, since 1900-01-01
//! 13  nanoseconds  4  BE
//! 17  sequence     4  BE
//! 21  reserved    10
//! 31  length       1
//! 32  payload
//! ```

use chrono::{DateTime, Utc};

use super::ZepPacket;

pub const PREAMBLE: &[u8; 2] = b"EX";
pub const VERSION: u8 = 2;
pub const TYPE_DATA: u8 = 1;
pub const HEADER_LEN: usize = 32;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970)
pub const NTP_EPOCH_OFFSET: i64 = 2_208_988_800;

const RESERVED_LEN: usize = 10;

/// Capture time in ZEP (NTP-style) representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZepTimestamp {
    pub seconds: u32,
    pub nanoseconds: u32,
}

impl ZepTimestamp {
    pub fn now() -> Self {
        Self::from(Utc::now())
    }
}

impl From<DateTime<Utc>> for ZepTimestamp {
    fn from(t: DateTime<Utc>) -> Self {
        // The 32-bit seconds field wraps; only the low bits are kept
        Self {
            seconds: (t.timestamp() + NTP_EPOCH_OFFSET) as u32,
            nanoseconds: t.timestamp_subsec_micros() * 1000,
        }
    }
}

/// Encode one data datagram into `out`, replacing its contents.
pub fn encode(packet: &ZepPacket<'_>, timestamp: ZepTimestamp, sequence: u32, out: &mut Vec<u8>) {
    let payload = &packet.data[..(packet.length as usize).min(packet.data.len())];

    out.clear();
    out.reserve(HEADER_LEN + payload.len());
    out.extend_from_slice(PREAMBLE);
    out.push(VERSION);
    out.push(TYPE_DATA);
    out.push(packet.channel);
    out.extend_from_slice(&packet.device.to_be_bytes());
    out.push(0); // lqi mode: LQI
    out.push(packet.lqi);
    out.extend_from_slice(&timestamp.seconds.to_be_bytes());
    out.extend_from_slice(&timestamp.nanoseconds.to_be_bytes());
    out.extend_from_slice(&sequence.to_be_bytes());
    out.extend_from_slice(&[0; RESERVED_LEN]);
    out.push(payload.len() as u8);
    out.extend_from_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn packet(data: &[u8]) -> ZepPacket<'_> {
        ZepPacket {
            channel: 15,
            device: 0x1234,
            length: data.len() as u8,
            lqi: 200,
            data,
        }
    }

    #[test]
    fn test_header_layout() {
        let ts = ZepTimestamp {
            seconds: 0xE000_0001,
            nanoseconds: 500_000,
        };
        let mut out = Vec::new();
        encode(&packet(&[0xDE, 0xAD]), ts, 0, &mut out);

        assert_eq!(out.len(), HEADER_LEN + 2);
        assert_eq!(&out[0..2], b"EX");
        assert_eq!(out[2], 2);
        assert_eq!(out[3], 1);
        assert_eq!(out[4], 15);
        assert_eq!(out[7], 0);
        assert_eq!(out[8], 200);
        assert_eq!(&out[9..13], &[0xE0, 0x00, 0x00, 0x01]);
        assert_eq!(&out[13..17], &500_000u32.to_be_bytes());
        assert_eq!(&out[17..21], &[0, 0, 0, 0]);
        assert_eq!(&out[21..31], &[0u8; 10]);
        assert_eq!(out[31], 2);
        assert_eq!(&out[32..], &[0xDE, 0xAD]);
    }

    #[test]
    fn test_device_id_is_16_bit_big_endian() {
        // The field is two bytes wide; the id must not spill into lqi mode / lqi
        let mut out = Vec::new();
        encode(&packet(&[0x01]), ZepTimestamp::now(), 7, &mut out);
        assert_eq!(&out[5..7], &[0x12, 0x34]);
        assert_eq!(out[7], 0);
        assert_eq!(out[8], 200);
        assert_eq!(&out[17..21], &[0, 0, 0, 7]);
    }

    #[test]
    fn test_timestamp_ntp_epoch() {
        let unix_epoch = Utc.timestamp_opt(0, 250_000_000).unwrap();
        let ts = ZepTimestamp::from(unix_epoch);
        assert_eq!(ts.seconds, 2_208_988_800);
        assert_eq!(ts.nanoseconds, 250_000_000);

        // Past 2036 the seconds field wraps like the 32-bit NTP era counter
        let late = Utc.timestamp_opt(2_100_000_000, 0).unwrap();
        assert_eq!(
            ZepTimestamp::from(late).seconds,
            ((2_100_000_000i64 + NTP_EPOCH_OFFSET) % (1i64 << 32)) as u32
        );
    }

    #[test]
    fn test_payload_limited_to_length() {
        let data = [1, 2, 3, 4];
        let p = ZepPacket {
            length: 3,
            ..packet(&data)
        };
        let mut out = Vec::new();
        encode(&p, ZepTimestamp::now(), 0, &mut out);
        assert_eq!(out[31], 3);
        assert_eq!(&out[32..], &[1, 2, 3]);
    }
}
