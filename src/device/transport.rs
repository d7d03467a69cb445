//! USB transport for the dongle
//!
//! `RadioDevice` talks to the hardware only through [`UsbTransport`], so the
//! firmware protocol can be driven by a scripted transport in tests.

use std::time::Duration;

use rusb::{DeviceHandle, GlobalContext};
use tracing::{debug, info, warn};

use super::error::DeviceError;
use super::protocol::{INTERFACE, USB_PID, USB_VID};

/// Minimal set of USB operations the sniffer firmware needs
pub trait UsbTransport {
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;

    /// A zero timeout blocks until data arrives.
    fn read_bulk(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize>;

    fn release(&mut self) -> rusb::Result<()>;
}

/// Descriptor details logged when the dongle is opened
#[derive(Debug, Clone, Default)]
pub struct DeviceInfo {
    pub bus: u8,
    pub address: u8,
    pub manufacturer: String,
    pub product: String,
    /// bcdDevice, used as the ZEP device id
    pub release: u16,
}

/// Claimed handle on a physical CC2531
pub struct UsbHandle {
    handle: DeviceHandle<GlobalContext>,
    claimed: bool,
}

impl UsbHandle {
    /// Find the first attached CC2531, open it and claim its data interface.
    pub fn open() -> Result<(Self, DeviceInfo), DeviceError> {
        let devices = rusb::devices()?;

        let mut found = None;
        for device in devices.iter() {
            let desc = device.device_descriptor()?;
            if desc.vendor_id() == USB_VID && desc.product_id() == USB_PID {
                found = Some((device, desc));
                break;
            }
        }
        let (device, desc) = found.ok_or(DeviceError::NotFound {
            vendor: USB_VID,
            product: USB_PID,
        })?;

        let mut handle = device.open()?;

        let manufacturer = handle.read_manufacturer_string_ascii(&desc)?;
        let product = handle.read_product_string_ascii(&desc)?;

        let info = DeviceInfo {
            bus: device.bus_number(),
            address: device.address(),
            manufacturer,
            product,
            release: bcd_from_version(desc.device_version()),
        };
        info!(
            "Using CC2531 on USB bus {:03} device {:03}. Manufacturer: \"{}\" Product: \"{}\" Serial: {:04x}",
            info.bus, info.address, info.manufacturer, info.product, info.release
        );

        handle.claim_interface(INTERFACE)?;
        debug!("Claimed USB interface {}", INTERFACE);

        Ok((
            Self {
                handle,
                claimed: true,
            },
            info,
        ))
    }
}

/// rusb splits bcdDevice into decimal major/minor/sub-minor; rebuild the raw word.
fn bcd_from_version(version: rusb::Version) -> u16 {
    let major = version.major() as u16;
    ((major / 10) << 12)
        | ((major % 10) << 8)
        | ((version.minor() as u16 & 0x0F) << 4)
        | (version.sub_minor() as u16 & 0x0F)
}

impl UsbTransport for UsbHandle {
    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle
            .write_control(request_type, request, value, index, data, timeout)
    }

    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.handle
            .read_control(request_type, request, value, index, buf, timeout)
    }

    fn read_bulk(&mut self, endpoint: u8, buf: &mut [u8], timeout: Duration) -> rusb::Result<usize> {
        self.handle.read_bulk(endpoint, buf, timeout)
    }

    fn release(&mut self) -> rusb::Result<()> {
        if !self.claimed {
            return Ok(());
        }
        self.claimed = false;
        self.handle.release_interface(INTERFACE)
    }
}

impl Drop for UsbHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release USB interface: {}", e);
        }
    }
}
