use crate::error::{Error, Result};
use crate::flags::{FirmwareDebug, UsbSpeed};
use core::fmt;
use num_traits::FromPrimitive;

/// Firmware revision quad reported by GET_VERSION.
///
/// The 32-bit reply is decoded unsigned even though the revision byte has
/// been seen with its high bit set; interpreting the sign is left to the
/// caller.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct FirmwareVersion {
    pub family: u8,
    pub model: u8,
    pub version: u8,
    pub revision: u8,
}

impl From<u32> for FirmwareVersion {
    fn from(raw: u32) -> FirmwareVersion {
        FirmwareVersion {
            family: (raw & 0xff) as u8,
            model: (raw >> 8 & 0xff) as u8,
            version: (raw >> 16 & 0xff) as u8,
            revision: (raw >> 24 & 0xff) as u8,
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.family, self.model, self.version, self.revision
        )
    }
}

/// Link speed and firmware debug flag, packed into one GET_STATUS reply.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Status {
    pub usb_speed: UsbSpeed,
    pub fw_debug: FirmwareDebug,
}

impl Status {
    pub(crate) fn from_raw(raw: u32) -> Result<Status> {
        let usb_speed = UsbSpeed::from_u32(raw & 0xff).ok_or(Error::UnknownCode {
            what: "USB speed",
            code: raw & 0xff,
        })?;
        let fw_debug = FirmwareDebug::from_u32(raw >> 8 & 0xff).ok_or(Error::UnknownCode {
            what: "firmware debug flag",
            code: raw >> 8 & 0xff,
        })?;
        Ok(Status { usb_speed, fw_debug })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{assert_err, assert_ok};

    #[test]
    fn decode_version_quad() {
        let v = FirmwareVersion::from(0x0001010a);
        assert_eq!(
            v,
            FirmwareVersion {
                family: 10,
                model: 1,
                version: 1,
                revision: 0
            }
        );
        assert_eq!(v.to_string(), "10.1.1.0");
    }

    #[test]
    fn high_bit_stays_unsigned() {
        let v = FirmwareVersion::from(0x8001010a);
        assert_eq!(v.revision, 0x80);
    }

    #[test]
    fn decode_status() {
        let status = assert_ok!(Status::from_raw(0x0001));
        assert_eq!(status.usb_speed, UsbSpeed::High);
        assert_eq!(status.fw_debug, FirmwareDebug::Off);
        assert_err!(Status::from_raw(0x0005));
    }
}
