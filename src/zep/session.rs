//! UDP forwarding session

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use thiserror::Error;
use tracing::debug;

use super::header::{encode, ZepTimestamp};
use super::ZepPacket;

/// Default UDP port Wireshark listens on for ZEP
pub const ZEP_PORT: u16 = 17754;

/// Longest accepted remote address literal
pub const MAX_REMOTE_LEN: usize = 15;

/// Why a datagram could not be sent. Only used for the log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    PermissionDenied,
    BadDescriptor,
    Interrupted,
    InvalidArgument,
    MessageTooLarge,
    OutOfMemory,
    NotConnected,
    Other,
}

impl SendFailure {
    pub fn classify(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => return Self::PermissionDenied,
            io::ErrorKind::Interrupted => return Self::Interrupted,
            io::ErrorKind::InvalidInput => return Self::InvalidArgument,
            io::ErrorKind::OutOfMemory => return Self::OutOfMemory,
            io::ErrorKind::NotConnected => return Self::NotConnected,
            _ => {}
        }
        match err.raw_os_error() {
            Some(code) if code == errno::EBADF => Self::BadDescriptor,
            Some(code) if code == errno::EMSGSIZE => Self::MessageTooLarge,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for SendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::PermissionDenied => "Access denied while trying to send to UDP socket",
            Self::BadDescriptor => "Invalid descriptor for UDP socket",
            Self::Interrupted => "Signal occurred before transmitting data via UDP socket",
            Self::InvalidArgument => "Invalid argument",
            Self::MessageTooLarge => "UDP packet too large to send",
            Self::OutOfMemory => "No memory to send UDP packet",
            Self::NotConnected => "UDP socket not connected",
            Self::Other => "Error sending UDP packet",
        };
        f.write_str(text)
    }
}

#[cfg(target_os = "linux")]
mod errno {
    pub const EBADF: i32 = 9;
    pub const EMSGSIZE: i32 = 90;
}

#[cfg(not(target_os = "linux"))]
mod errno {
    pub const EBADF: i32 = 9;
    pub const EMSGSIZE: i32 = 40;
}

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("Invalid remote address '{0}', expected an IPv4 literal")]
    InvalidAddress(String),

    #[error("Unable to open UDP socket: {0}")]
    Socket(#[source] io::Error),

    #[error("{kind}: {source}")]
    Send {
        kind: SendFailure,
        #[source]
        source: io::Error,
    },
}

/// Datagram transmit half of a socket
pub trait DatagramSocket {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize>;
}

impl DatagramSocket for UdpSocket {
    fn send_to(&self, buf: &[u8], addr: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, addr)
    }
}

/// Parse the remote host, which must be a dotted IPv4 literal.
pub fn parse_remote(remote_host: &str, port: u16) -> Result<SocketAddr, ForwardError> {
    if remote_host.len() > MAX_REMOTE_LEN {
        return Err(ForwardError::InvalidAddress(remote_host.to_string()));
    }
    let ip: Ipv4Addr = remote_host
        .parse()
        .map_err(|_| ForwardError::InvalidAddress(remote_host.to_string()))?;
    Ok(SocketAddr::V4(SocketAddrV4::new(ip, port)))
}

/// One socket plus its datagram sequence counter.
///
/// The sequence starts at 0 and advances on every send attempt; a new session
/// is the only way to reset it.
pub struct ForwardSession<S: DatagramSocket = UdpSocket> {
    remote: SocketAddr,
    socket: S,
    sequence: u32,
    buf: Vec<u8>,
}

impl ForwardSession<UdpSocket> {
    pub fn open(remote_host: &str, port: u16) -> Result<Self, ForwardError> {
        let remote = parse_remote(remote_host, port)?;
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(ForwardError::Socket)?;
        debug!("Opened ZEP session to {}", remote);
        Ok(Self::with_socket(socket, remote))
    }
}

impl<S: DatagramSocket> ForwardSession<S> {
    pub fn with_socket(socket: S, remote: SocketAddr) -> Self {
        Self {
            remote,
            socket,
            sequence: 0,
            buf: Vec::with_capacity(super::header::HEADER_LEN + 256),
        }
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    /// Sequence number the next datagram will carry
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Encapsulate and transmit one packet as a single datagram.
    pub fn send(&mut self, packet: &ZepPacket<'_>) -> Result<usize, ForwardError> {
        debug!(
            "Sending ZEP packet for channel {}, device {:04x}, length {}",
            packet.channel, packet.device, packet.length
        );

        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        encode(packet, ZepTimestamp::now(), sequence, &mut self.buf);

        self.socket
            .send_to(&self.buf, self.remote)
            .map_err(|source| ForwardError::Send {
                kind: SendFailure::classify(&source),
                source,
            })
    }
}
