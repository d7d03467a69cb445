//! CC2531 USB dongle driver
//!
//! Drives the TI sniffer firmware:
//! 1. Open the dongle and put it in its idle configuration
//! 2. Select a channel and wait for the radio to acknowledge
//! 3. Start capture
//! 4. Read framed captures from the bulk endpoint

mod error;
pub mod protocol;
mod radio;
mod state;
mod transport;

pub use error::DeviceError;
pub use protocol::RawFrame;
pub use radio::RadioDevice;
pub use state::{CaptureSession, CaptureState, CaptureStats};
pub use transport::{DeviceInfo, UsbHandle, UsbTransport};

#[cfg(test)]
pub(crate) use radio::tests as mock;
