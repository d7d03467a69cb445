//! Device error taxonomy

use thiserror::Error;

/// Failures talking to the CC2531 dongle.
///
/// All of these are fatal to the capture loop: the radio has no reset
/// request, so its state after a partial failure is unknown.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("Failed to find CC2531 (USB {vendor:04x}:{product:04x})")]
    NotFound { vendor: u16, product: u16 },

    #[error("The USB device is in use by another program or driver")]
    Busy,

    #[error("Insufficient privileges to open USB device")]
    AccessDenied,

    #[error("CC2531 has been disconnected")]
    Disconnected,

    #[error("USB transfer timeout")]
    Timeout,

    #[error("Control request not supported or endpoint halted")]
    Pipe,

    #[error("CC2531 overflow")]
    Overflow,

    #[error("Didn't receive acknowledgment from CC2531 dongle after {attempts} polls")]
    NoAck { attempts: u32 },

    #[error("Channel {0} out of range, must be from 11 to 26")]
    InvalidChannel(u8),

    #[error("Capture cannot start before a channel is configured")]
    NotConfigured,

    #[error("USB error during transfer: {0}")]
    Transfer(rusb::Error),
}

impl From<rusb::Error> for DeviceError {
    fn from(e: rusb::Error) -> Self {
        match e {
            rusb::Error::NotFound => Self::NotFound {
                vendor: super::protocol::USB_VID,
                product: super::protocol::USB_PID,
            },
            rusb::Error::Busy => Self::Busy,
            rusb::Error::Access => Self::AccessDenied,
            rusb::Error::NoDevice => Self::Disconnected,
            rusb::Error::Timeout => Self::Timeout,
            rusb::Error::Pipe => Self::Pipe,
            rusb::Error::Overflow => Self::Overflow,
            other => Self::Transfer(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_mapping() {
        assert!(matches!(DeviceError::from(rusb::Error::Busy), DeviceError::Busy));
        assert!(matches!(DeviceError::from(rusb::Error::Access), DeviceError::AccessDenied));
        assert!(matches!(DeviceError::from(rusb::Error::NoDevice), DeviceError::Disconnected));
        assert!(matches!(DeviceError::from(rusb::Error::Pipe), DeviceError::Pipe));
        assert!(matches!(
            DeviceError::from(rusb::Error::NotFound),
            DeviceError::NotFound { vendor: 0x0451, product: 0x16AE }
        ));
        assert!(matches!(
            DeviceError::from(rusb::Error::Io),
            DeviceError::Transfer(rusb::Error::Io)
        ));
    }
}
