//! Capture loop: configure the radio, then read, decode and forward forever
//!
//! ```text
//! Init -> Configuring -> Capturing -> Failed
//! ```
//!
//! Device errors are fatal. Forwarding errors drop the current frame and
//! replace the UDP session; the loop keeps capturing.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::device::{CaptureStats, DeviceError, RadioDevice, RawFrame, UsbTransport};
use crate::ieee802154;
use crate::zep::{DatagramSocket, ForwardError, ForwardSession, ZepPacket};

/// What gets logged and forwarded for each captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardMode {
    /// Forward captured bytes as-is
    #[default]
    Raw,
    /// Decode the MAC header, log a summary line, then forward
    Decode,
}

impl FromStr for ForwardMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "decode" => Ok(Self::Decode),
            other => Err(format!("unknown forward mode '{}', expected raw or decode", other)),
        }
    }
}

impl fmt::Display for ForwardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::Decode => f.write_str("decode"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Configuring,
    Capturing,
    Failed,
}

/// Opens a fresh forwarding session (new socket, sequence 0)
pub type SessionOpener<S> = Box<dyn FnMut() -> Result<ForwardSession<S>, ForwardError>>;

pub struct CaptureLoop<T: UsbTransport, S: DatagramSocket> {
    device: RadioDevice<T>,
    channel: u8,
    mode: ForwardMode,
    open_session: SessionOpener<S>,
    session: Option<ForwardSession<S>>,
    stats: Arc<CaptureStats>,
    state: LoopState,
    stats_interval: Duration,
}

impl<T: UsbTransport, S: DatagramSocket> CaptureLoop<T, S> {
    /// Finish initialization by opening the first forwarding session.
    pub fn new(
        device: RadioDevice<T>,
        channel: u8,
        mode: ForwardMode,
        mut open_session: SessionOpener<S>,
        stats: Arc<CaptureStats>,
    ) -> Result<Self, ForwardError> {
        let session = open_session()?;
        info!("Forwarding ZEP to {} ({} mode)", session.remote(), mode);

        Ok(Self {
            device,
            channel,
            mode,
            open_session,
            session: Some(session),
            stats,
            state: LoopState::Init,
            stats_interval: Duration::from_secs(10),
        })
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Configure the radio and capture until the device fails.
    ///
    /// Only returns on a fatal device error.
    pub fn run(&mut self) -> Result<(), DeviceError> {
        if let Err(e) = self.configure() {
            return Err(self.fail(e));
        }

        let mut last_stats = Instant::now();
        loop {
            let frame = match self.device.read_next_frame() {
                Ok(frame) => frame,
                Err(e) => return Err(self.fail(e)),
            };

            self.handle_frame(&frame);

            if last_stats.elapsed() >= self.stats_interval {
                info!("[Stats] {}", self.stats);
                last_stats = Instant::now();
            }
        }
    }

    fn configure(&mut self) -> Result<(), DeviceError> {
        self.transition(LoopState::Configuring);
        self.device.set_channel(self.channel)?;
        self.device.start_capture()?;
        self.transition(LoopState::Capturing);
        Ok(())
    }

    fn handle_frame(&mut self, frame: &RawFrame) {
        debug!("Frame {} bytes rssi {} dBm: {}", frame.length, frame.rssi, hex::encode(&frame.data));

        match self.mode {
            ForwardMode::Raw => {
                let packet = ZepPacket::from_raw(self.channel, frame);
                self.forward(&packet);
            }
            ForwardMode::Decode => {
                let decoded = ieee802154::decode(self.channel, frame);
                info!("{}", decoded);
                self.forward(&decoded.as_zep());
            }
        }
    }

    fn forward(&mut self, packet: &ZepPacket<'_>) {
        if self.session.is_none() {
            self.reconnect();
        }
        let Some(session) = self.session.as_mut() else {
            debug!("No forwarding session, dropping frame");
            return;
        };

        match session.send(packet) {
            Ok(n) => {
                self.stats.record_sent();
                debug!("Sent {} byte ZEP datagram", n);
            }
            Err(e) => {
                self.stats.record_send_failure();
                error!("{}", e);
                self.reconnect();
            }
        }
    }

    /// Replace the session with a brand-new one. No backoff.
    fn reconnect(&mut self) {
        self.session = None;
        match (self.open_session)() {
            Ok(session) => {
                self.stats.record_reconnect();
                warn!("Reopened ZEP session to {}", session.remote());
                self.session = Some(session);
            }
            Err(e) => error!("Failed to reopen ZEP session: {}", e),
        }
    }

    fn transition(&mut self, next: LoopState) {
        debug!("Capture loop {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, e: DeviceError) -> DeviceError {
        error!("{}", e);
        self.transition(LoopState::Failed);
        e
    }
}

/// Open the dongle and the forwarder, then capture until the device fails.
pub fn run_capture(config: &Config, stats: Arc<CaptureStats>) -> Result<()> {
    let device = RadioDevice::open(stats.clone()).context("Failed to open CC2531")?;
    info!("Opened CC2531, device id {:04x}", device.device_id());

    let remote = config.remote.clone();
    let port = config.zep_port;
    let opener: SessionOpener<std::net::UdpSocket> = Box::new(move || ForwardSession::open(&remote, port));

    let mut capture = CaptureLoop::new(device, config.channel, config.mode, opener, stats)
        .context("Failed to open ZEP forwarder")?
        .with_stats_interval(config.stats_interval);

    capture.run().context("Capture stopped")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io;
    use std::rc::Rc;

    use crate::device::mock::{data_transfer, MockTransport};
    use crate::zep::MockSocket;

    // Data frame: dst 0x0001, src broadcast, seq 42, PAN 0x1A62, 3 payload bytes
    const FRAME: &str = "41882A621A0100FFFFDEADBE";

    fn device_with(transport: MockTransport) -> RadioDevice<MockTransport> {
        RadioDevice::with_transport(transport, 0x0200, CaptureStats::new())
            .unwrap()
            .with_ack_poll_interval(Duration::ZERO)
    }

    fn device(frames: &[Vec<u8>]) -> RadioDevice<MockTransport> {
        let mut transport = MockTransport::default();
        for f in frames {
            transport.bulk.push_back(Ok(f.clone()));
        }
        device_with(transport)
    }

    fn opener(socket: &MockSocket, opens: &Rc<Cell<u32>>) -> SessionOpener<MockSocket> {
        let socket = socket.clone();
        let opens = opens.clone();
        Box::new(move || {
            opens.set(opens.get() + 1);
            Ok(ForwardSession::with_socket(
                socket.clone(),
                "127.0.0.1:17754".parse().unwrap(),
            ))
        })
    }

    fn seq_of(datagram: &[u8]) -> u32 {
        u32::from_be_bytes([datagram[17], datagram[18], datagram[19], datagram[20]])
    }

    #[test]
    fn test_forward_mode_from_str() {
        assert_eq!("raw".parse::<ForwardMode>().unwrap(), ForwardMode::Raw);
        assert_eq!("Decode".parse::<ForwardMode>().unwrap(), ForwardMode::Decode);
        assert!("pcap".parse::<ForwardMode>().is_err());
    }

    #[test]
    fn test_raw_forwarding_until_device_error() {
        let payload = hex::decode(FRAME).unwrap();
        let socket = MockSocket::default();
        let opens = Rc::new(Cell::new(0));
        let stats = CaptureStats::new();

        let mut capture = CaptureLoop::new(
            device(&[data_transfer(&payload, 33)]),
            20,
            ForwardMode::Raw,
            opener(&socket, &opens),
            stats.clone(),
        )
        .unwrap();
        assert_eq!(capture.state(), LoopState::Init);

        let err = capture.run().unwrap_err();
        assert!(matches!(err, DeviceError::Disconnected));
        assert_eq!(capture.state(), LoopState::Failed);

        let sent = socket.sent.borrow();
        assert_eq!(sent.len(), 1);
        let datagram = &sent[0];
        assert_eq!(datagram[4], 20);
        assert_eq!(&datagram[5..7], &[0x02, 0x00]);
        assert_eq!(datagram[8], (-40i8) as u8);
        assert_eq!(datagram[31], payload.len() as u8);
        assert_eq!(&datagram[32..], &payload[..]);
        assert_eq!(stats.get_sent(), 1);
        assert_eq!(opens.get(), 1);
    }

    #[test]
    fn test_send_failure_reconnects_with_fresh_sequence() {
        let payload = hex::decode(FRAME).unwrap();
        let socket = MockSocket::default();
        socket.failures.borrow_mut().push_back(io::ErrorKind::PermissionDenied);
        let opens = Rc::new(Cell::new(0));
        let stats = CaptureStats::new();

        let mut capture = CaptureLoop::new(
            device(&[
                data_transfer(&payload, 73),
                data_transfer(&payload, 73),
                data_transfer(&payload, 73),
            ]),
            11,
            ForwardMode::Raw,
            opener(&socket, &opens),
            stats.clone(),
        )
        .unwrap();

        assert!(capture.run().is_err());

        // First frame dropped, the next two go out on a new session
        let sent = socket.sent.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(seq_of(&sent[0]), 0);
        assert_eq!(seq_of(&sent[1]), 1);
        assert_eq!(opens.get(), 2);
        assert_eq!(stats.get_send_failures(), 1);
        assert_eq!(stats.get_reconnects(), 1);
    }

    #[test]
    fn test_failed_reopen_keeps_capturing() {
        let payload = hex::decode(FRAME).unwrap();
        let socket = MockSocket::default();
        socket.failures.borrow_mut().push_back(io::ErrorKind::Other);
        let opens = Rc::new(Cell::new(0u32));

        let opener: SessionOpener<MockSocket> = {
            let socket = socket.clone();
            let opens = opens.clone();
            Box::new(move || {
                opens.set(opens.get() + 1);
                if opens.get() == 2 {
                    return Err(ForwardError::Socket(io::Error::from(io::ErrorKind::AddrInUse)));
                }
                Ok(ForwardSession::with_socket(
                    socket.clone(),
                    "127.0.0.1:17754".parse().unwrap(),
                ))
            })
        };

        let mut capture = CaptureLoop::new(
            device(&[data_transfer(&payload, 73), data_transfer(&payload, 73)]),
            11,
            ForwardMode::Raw,
            opener,
            CaptureStats::new(),
        )
        .unwrap();

        assert!(matches!(capture.run(), Err(DeviceError::Disconnected)));
        assert_eq!(opens.get(), 3);
        let sent = socket.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(seq_of(&sent[0]), 0);
    }

    #[test]
    fn test_decode_mode_forwards_same_payload() {
        let payload = hex::decode(FRAME).unwrap();
        let socket = MockSocket::default();
        let opens = Rc::new(Cell::new(0));

        let mut capture = CaptureLoop::new(
            device(&[data_transfer(&payload, 80)]),
            20,
            ForwardMode::Decode,
            opener(&socket, &opens),
            CaptureStats::new(),
        )
        .unwrap();
        assert!(capture.run().is_err());

        let sent = socket.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0][8], 7);
        assert_eq!(&sent[0][32..], &payload[..]);
    }

    #[test]
    fn test_configure_failure_is_fatal() {
        // Radio never acknowledges the channel setup
        let mut transport = MockTransport::default();
        transport.status_replies.extend([0u8; 20]);
        let dev = device_with(transport);
        let socket = MockSocket::default();
        let opens = Rc::new(Cell::new(0));

        let mut capture =
            CaptureLoop::new(dev, 15, ForwardMode::Raw, opener(&socket, &opens), CaptureStats::new())
                .unwrap();

        assert!(matches!(capture.run(), Err(DeviceError::NoAck { .. })));
        assert_eq!(capture.state(), LoopState::Failed);
        assert!(socket.sent.borrow().is_empty());
    }

    #[test]
    fn test_init_fails_without_session() {
        let opener: SessionOpener<MockSocket> =
            Box::new(|| Err(ForwardError::InvalidAddress("nowhere".into())));
        let result = CaptureLoop::new(device(&[]), 15, ForwardMode::Raw, opener, CaptureStats::new());
        assert!(matches!(result, Err(ForwardError::InvalidAddress(_))));
    }
}
