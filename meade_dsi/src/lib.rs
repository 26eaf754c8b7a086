//! Host-side driver for the Meade Deep Sky Imager (DSI) family of USB CCD
//! cameras.
//!
//! The protocol is reverse engineered from USB captures of the vendor
//! software; there is no official documentation. All models share one
//! vendor/product pair, so the attached sensor is identified by reading
//! the chip name out of the camera's EEPROM after bring-up.

pub mod command;
pub mod eeprom;
pub mod protocol;
pub mod transport;

mod camera;
mod error;
mod flags;
mod geometry;
mod image;
mod snoop;
mod version;

pub use camera::{DsiCamera, ImageView, ReadMode, TICKS_PER_SECOND};
pub use error::{Error, Result};
pub use flags::{
    FirmwareDebug, FlushMode, ImagingState, ReadoutMode, ReadoutSpeed, UsbSpeed, VddMode,
};
pub use geometry::{for_chip, model_name, Geometry, BYTES_PER_PIXEL};
pub use image::deinterlace;
pub use snoop::parse_capture;
pub use version::FirmwareVersion;

#[cfg(feature = "usb")]
pub use transport::usb::{DeviceLocation, UsbTransport};
