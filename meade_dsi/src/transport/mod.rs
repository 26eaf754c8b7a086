//! Bulk-transfer seam between the camera session and the USB stack.
//!
//! The session never touches libusb directly; everything goes through the
//! [`Transport`] trait so tests can substitute a mock or a simulated
//! camera.

#[cfg(feature = "usb")]
pub mod usb;

use std::time::Duration;
use thiserror::Error;

/// Endpoint carrying command requests to the camera.
pub const EP_COMMAND_OUT: u8 = 0x01;
/// Endpoint carrying command replies from the camera.
pub const EP_COMMAND_IN: u8 = 0x81;
/// Endpoint carrying raw half-frame image data.
pub const EP_IMAGE_IN: u8 = 0x86;

#[derive(Debug, Error)]
pub enum TransportError {
    #[cfg(feature = "usb")]
    #[error("USB transfer failed: {0}")]
    Usb(#[from] rusb::Error),
    #[error("transfer timed out")]
    Timeout,
    #[error("device disconnected")]
    Disconnected,
    #[error("no DSI camera found on the bus")]
    NoDevice,
}

pub trait Transport {
    /// Writes `bytes` to the OUT endpoint, returning the count transferred.
    fn bulk_write(
        &mut self,
        endpoint: u8,
        bytes: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    /// Reads up to `buf.len()` bytes from the IN endpoint, returning the
    /// count transferred.
    fn bulk_read(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;
}
