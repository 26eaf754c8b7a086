//! libusb transport for the real camera.
//!
//! Every DSI model presents the same vendor/product pair both before and
//! after renumeration, so enumeration cannot tell the models apart; that
//! happens later by reading the chip name out of EEPROM.

use super::{Transport, TransportError};
use core::fmt;
use rusb::{Context, DeviceHandle, UsbContext};
use std::time::Duration;

pub const VENDOR_ID: u16 = 0x156c;
pub const PRODUCT_ID: u16 = 0x0101;

/// Clearing these after claiming the interface keeps the device from
/// hanging on a reconnect. Not all of them are strictly necessary, but
/// leaving any command endpoint halted wedges the firmware.
const HALT_ENDPOINTS: [u8; 6] = [0x01, 0x81, 0x86, 0x02, 0x04, 0x88];

/// Bus/address pair identifying one camera on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLocation {
    pub bus: u8,
    pub address: u8,
}

impl DeviceLocation {
    /// Parses a `"usb:BUS,ADDR"` selector.
    pub fn parse(selector: &str) -> Option<DeviceLocation> {
        let rest = selector.strip_prefix("usb:")?;
        let (bus, address) = rest.split_once(',')?;
        Some(DeviceLocation {
            bus: bus.trim().parse().ok()?,
            address: address.trim().parse().ok()?,
        })
    }
}

impl fmt::Display for DeviceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "usb:{},{}", self.bus, self.address)
    }
}

pub struct UsbTransport {
    handle: DeviceHandle<Context>,
}

impl UsbTransport {
    /// Lists the bus locations of all attached DSI cameras.
    pub fn enumerate() -> Result<Vec<DeviceLocation>, TransportError> {
        let context = Context::new()?;
        let mut found = Vec::new();
        for device in context.devices()?.iter() {
            let descriptor = device.device_descriptor()?;
            if descriptor.vendor_id() == VENDOR_ID && descriptor.product_id() == PRODUCT_ID {
                found.push(DeviceLocation {
                    bus: device.bus_number(),
                    address: device.address(),
                });
            }
        }
        Ok(found)
    }

    /// Opens the camera at `location`, or the first one found when `None`.
    ///
    /// Claims interface 0 on configuration 1 and clears all endpoint
    /// halts, matching the bring-up sequence captured from the vendor
    /// driver.
    pub fn open(location: Option<DeviceLocation>) -> Result<UsbTransport, TransportError> {
        let context = Context::new()?;
        for device in context.devices()?.iter() {
            let descriptor = device.device_descriptor()?;
            if descriptor.vendor_id() != VENDOR_ID || descriptor.product_id() != PRODUCT_ID {
                continue;
            }
            if let Some(want) = location {
                if device.bus_number() != want.bus || device.address() != want.address {
                    continue;
                }
            }
            log::debug!(
                "found device {:04x}:{:04x} at usb:{},{}",
                VENDOR_ID,
                PRODUCT_ID,
                device.bus_number(),
                device.address()
            );
            let mut handle = device.open()?;
            handle.set_active_configuration(1)?;
            handle.claim_interface(0)?;
            for endpoint in HALT_ENDPOINTS {
                handle.clear_halt(endpoint)?;
            }
            return Ok(UsbTransport { handle });
        }
        Err(TransportError::NoDevice)
    }
}

impl Transport for UsbTransport {
    fn bulk_write(
        &mut self,
        endpoint: u8,
        bytes: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        Ok(self.handle.write_bulk(endpoint, bytes, timeout)?)
    }

    fn bulk_read(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        Ok(self.handle.read_bulk(endpoint, buf, timeout)?)
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(0);
    }
}
