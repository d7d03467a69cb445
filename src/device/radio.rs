//! CC2531 radio control: handshake, channel selection and frame capture

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::DeviceError;
use super::protocol::{self, parse_transfer, rssi_from_raw, RawFrame, Transfer};
use super::state::{CaptureSession, CaptureState, CaptureStats};
use super::transport::{UsbHandle, UsbTransport};

/// Owns the USB transport and the capture session of one dongle.
pub struct RadioDevice<T: UsbTransport> {
    transport: T,
    session: CaptureSession,
    buf: [u8; protocol::BUFFER_SIZE],
    stats: Arc<CaptureStats>,
    ack_poll_interval: Duration,
    closed: bool,
}

impl RadioDevice<UsbHandle> {
    /// Open the first attached dongle and put it in the idle configuration.
    pub fn open(stats: Arc<CaptureStats>) -> Result<Self, DeviceError> {
        let (handle, info) = UsbHandle::open()?;
        Self::with_transport(handle, info.release, stats)
    }
}

impl<T: UsbTransport> RadioDevice<T> {
    /// Run the open-time handshake over an already claimed transport.
    pub fn with_transport(
        transport: T,
        device_id: u16,
        stats: Arc<CaptureStats>,
    ) -> Result<Self, DeviceError> {
        let mut device = Self {
            transport,
            session: CaptureSession::new(device_id),
            buf: [0; protocol::BUFFER_SIZE],
            stats,
            ack_poll_interval: protocol::ACK_POLL_INTERVAL,
            closed: false,
        };

        device.set_config(protocol::CONFIG_IDLE)?;
        // Calibration block; only the transfer succeeding matters
        device.get_ctrl(protocol::REG_CALIBRATION, protocol::CALIBRATION_LEN)?;

        Ok(device)
    }

    /// Override the delay between acknowledgment polls.
    pub fn with_ack_poll_interval(mut self, interval: Duration) -> Self {
        self.ack_poll_interval = interval;
        self
    }

    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    pub fn device_id(&self) -> u16 {
        self.session.device_id
    }

    /// Tune the radio to an IEEE 802.15.4 channel (11-26).
    pub fn set_channel(&mut self, channel: u8) -> Result<(), DeviceError> {
        if !protocol::is_valid_channel(channel) {
            return Err(DeviceError::InvalidChannel(channel));
        }
        info!("Setting CC2531 to channel {}", channel);

        self.set_config(protocol::CONFIG_ACTIVE)?;
        self.set_ctrl(protocol::REG_CHANNEL_SETUP, protocol::CHANNEL_SETUP_INDEX, &[])?;
        self.wait_for_ack()?;
        self.set_ctrl(protocol::REG_ACTIVATE, 0, &[])?;
        self.set_ctrl(protocol::REG_CHANNEL, protocol::CHANNEL_INDEX_SELECT, &[channel])?;

        self.session.channel = channel;
        self.session.advance(CaptureState::Configured);
        Ok(())
    }

    pub fn start_capture(&mut self) -> Result<(), DeviceError> {
        if self.session.state < CaptureState::Configured {
            return Err(DeviceError::NotConfigured);
        }

        self.set_ctrl(protocol::REG_CHANNEL, protocol::CHANNEL_INDEX_ARM, &[0])?;
        self.set_ctrl(protocol::REG_CAPTURE_ENABLE, 0, &[])?;

        self.session.advance(CaptureState::Capturing);
        info!("Capture started on channel {}", self.session.channel);
        Ok(())
    }

    /// Block until the next captured radio frame arrives.
    ///
    /// Status frames and truncated transfers are skipped here and never
    /// reach the caller.
    pub fn read_next_frame(&mut self) -> Result<RawFrame, DeviceError> {
        loop {
            let transferred = self
                .transport
                .read_bulk(protocol::BULK_ENDPOINT, &mut self.buf, Duration::ZERO)
                .map_err(|e| log_transfer_error("bulk read", e))?;
            debug!("Bulk read {} bytes", transferred);

            match parse_transfer(&self.buf[..transferred]) {
                Transfer::Status(header) => {
                    self.stats.record_status_frame();
                    debug!("Skipping status frame with info {:02x}", header.info);
                }
                Transfer::Truncated { transferred } => {
                    self.stats.record_malformed();
                    warn!("Skipping truncated transfer of {} bytes", transferred);
                }
                Transfer::Data {
                    header,
                    payload,
                    raw_rssi,
                } => {
                    debug!(
                        "Received frame with info {:02x} and length {} and timestamp {}",
                        header.info, header.length, header.timestamp
                    );
                    self.stats.record_frame();
                    return Ok(RawFrame {
                        length: payload.len() as u8,
                        data: payload,
                        rssi: rssi_from_raw(raw_rssi),
                        device_id: self.session.device_id,
                    });
                }
            }
        }
    }

    /// Release the claimed interface. Later calls are no-ops.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.transport.release() {
            warn!("Failed to release CC2531 interface: {}", e);
        }
    }

    fn set_config(&mut self, config: u16) -> Result<usize, DeviceError> {
        self.transport
            .write_control(
                protocol::REQUEST_TYPE_OUT,
                protocol::REQUEST_SET_CONFIG,
                config,
                0,
                &[],
                protocol::CONTROL_TIMEOUT,
            )
            .map(log_transfer)
            .map_err(|e| log_transfer_error("set configuration", e))
    }

    fn get_ctrl(&mut self, request: u8, length: usize) -> Result<usize, DeviceError> {
        self.transport
            .read_control(
                protocol::REQUEST_TYPE_VENDOR_IN,
                request,
                0,
                0,
                &mut self.buf[..length],
                protocol::CONTROL_TIMEOUT,
            )
            .map(log_transfer)
            .map_err(|e| log_transfer_error("control read", e))
    }

    fn set_ctrl(&mut self, request: u8, index: u16, data: &[u8]) -> Result<usize, DeviceError> {
        self.transport
            .write_control(
                protocol::REQUEST_TYPE_VENDOR_OUT,
                request,
                0,
                index,
                data,
                protocol::CONTROL_TIMEOUT,
            )
            .map(log_transfer)
            .map_err(|e| log_transfer_error("control write", e))
    }

    fn wait_for_ack(&mut self) -> Result<(), DeviceError> {
        for attempt in 1..=protocol::ACK_POLL_ATTEMPTS {
            let n = self.get_ctrl(protocol::REG_STATUS, 1)?;
            if n >= 1 && self.buf[0] == protocol::STATUS_READY {
                debug!("CC2531 acknowledged after {} polls", attempt);
                return Ok(());
            }
            if attempt < protocol::ACK_POLL_ATTEMPTS {
                thread::sleep(self.ack_poll_interval);
            }
        }
        Err(DeviceError::NoAck {
            attempts: protocol::ACK_POLL_ATTEMPTS,
        })
    }
}

impl<T: UsbTransport> Drop for RadioDevice<T> {
    fn drop(&mut self) {
        self.close();
    }
}

fn log_transfer(n: usize) -> usize {
    debug!("USB transfer: {} bytes", n);
    n
}

fn log_transfer_error(op: &str, e: rusb::Error) -> DeviceError {
    let err = DeviceError::from(e);
    debug!("USB {} failed: {}", op, err);
    err
}
