//! The camera session: bring-up, identity, exposure control and image
//! acquisition.
//!
//! One session owns one device handle and is strictly request/response;
//! it must not be shared between threads without external serialization.

use crate::command::Command;
use crate::eeprom;
use crate::error::{Error, Result};
use crate::flags::{
    FirmwareDebug, FlushMode, ImagingState, ReadoutMode, ReadoutSpeed, UsbSpeed, VddMode,
};
use crate::geometry::{self, Geometry};
use crate::image::FrameStore;
use crate::protocol::CommandChannel;
use crate::transport::{Transport, EP_IMAGE_IN};
use crate::version::{FirmwareVersion, Status};
use num_traits::FromPrimitive;
use scopeguard::guard;
use std::thread;
use std::time::Duration;

/// Device exposure clock rate: one tick is 0.1 ms.
pub const TICKS_PER_SECOND: u32 = 10_000;

/// Below one second the amplifier stays on and readout runs in the fast
/// dual mode; at or above it the driver polls for completion instead of
/// holding the bulk read open.
const ONE_SECOND_TICKS: u32 = TICKS_PER_SECOND;

const POLL_INTERVAL: Duration = Duration::from_millis(1005);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_millis(1000);
const DEFAULT_IMAGE_TIMEOUT: Duration = Duration::from_millis(5000);
const DEFAULT_EXPOSURE_TICKS: u32 = 10;

/// Whether `read_image` may sleep while the exposure finishes.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ReadMode {
    Blocking,
    NonBlocking,
}

/// One decoded image, borrowed from the session's reusable buffer.
#[derive(Debug)]
pub struct ImageView<'a> {
    pub data: &'a [u16],
    pub width: usize,
    pub height: usize,
}

pub struct DsiCamera<T: Transport> {
    transport: T,
    seq: u8,
    trace_frames: bool,

    geometry: &'static Geometry,
    chip_name: String,
    firmware: FirmwareVersion,
    usb_speed: UsbSpeed,
    fw_debug: FirmwareDebug,

    eeprom_length: Option<u8>,
    camera_name: Option<String>,
    serial_number: Option<String>,

    amp_gain_pct: u8,
    amp_offset_pct: u8,
    exposure_ticks: u32,
    state: ImagingState,

    command_timeout: Duration,
    image_timeout: Duration,

    frames: FrameStore,
}

impl<T: Transport> DsiCamera<T> {
    pub fn new(transport: T) -> Result<DsiCamera<T>> {
        DsiCamera::with_options(transport, false)
    }

    /// Opens a session over an already-connected transport.
    ///
    /// `trace_frames` also covers the bring-up dialogue, which runs before
    /// the session exists and so cannot be enabled through
    /// [`DsiCamera::set_verbose`].
    ///
    /// The sequence follows USB captures of the vendor software: wake and
    /// reset the device, query firmware version and link status, then read
    /// the chip name to pick the geometry. An unrecognized chip is fatal
    /// here; there is nothing sensible a session without a geometry could
    /// do.
    pub fn with_options(mut transport: T, trace_frames: bool) -> Result<DsiCamera<T>> {
        let mut seq: u8 = 0;
        let mut chan = CommandChannel {
            transport: &mut transport,
            seq: &mut seq,
            trace: trace_frames,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        };

        chan.send(Command::Ping, 0)?;
        chan.send(Command::Reset, 0)?;
        let firmware = FirmwareVersion::from(chan.send(Command::GetVersion, 0)?);
        let status = Status::from_raw(chan.send(Command::GetStatus, 0)?)?;
        chan.send(Command::GetReadoutMode, 0)?;

        let eeprom_length = chan.send(Command::GetEepromLength, 0)? as u8;
        let mut raw = [0u8; eeprom::CHIP_NAME_LEN];
        for (i, slot) in raw.iter_mut().enumerate() {
            let offset = eeprom::CHIP_NAME_OFFSET + i as u8;
            *slot = chan.send(Command::GetEepromByte, offset.into())? as u8;
        }
        let chip_name = eeprom::decode_string(&raw);

        let geometry = geometry::for_chip(&chip_name)
            .ok_or_else(|| Error::UnsupportedChip(chip_name.clone()))?;
        if geometry.program_rows {
            chan.send(Command::SetRowCountEven, geometry.rows_even as u32)?;
            chan.send(Command::SetRowCountOdd, geometry.rows_odd as u32)?;
        }
        for value in geometry.ad_calibration {
            chan.send(Command::AdWrite, u32::from(*value))?;
        }
        drop(chan);

        Ok(DsiCamera {
            transport,
            seq,
            trace_frames,
            geometry,
            chip_name,
            firmware,
            usb_speed: status.usb_speed,
            fw_debug: status.fw_debug,
            eeprom_length: Some(eeprom_length),
            camera_name: None,
            serial_number: None,
            amp_gain_pct: 100,
            amp_offset_pct: 50,
            exposure_ticks: DEFAULT_EXPOSURE_TICKS,
            state: ImagingState::Idle,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            image_timeout: DEFAULT_IMAGE_TIMEOUT,
            frames: FrameStore::for_geometry(geometry),
        })
    }

    /// Escape hatch to the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Consumes the session and hands back the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Sends one command and decodes its reply.
    pub(crate) fn command(&mut self, command: Command, param: u32) -> Result<u32> {
        CommandChannel {
            transport: &mut self.transport,
            seq: &mut self.seq,
            trace: self.trace_frames,
            timeout: self.command_timeout,
        }
        .send(command, param)
    }

    // --- identity ---

    pub fn chip_name(&self) -> &str {
        &self.chip_name
    }

    pub fn model_name(&self) -> &'static str {
        geometry::model_name(&self.chip_name)
    }

    pub fn firmware_version(&self) -> FirmwareVersion {
        self.firmware
    }

    pub fn usb_speed(&self) -> UsbSpeed {
        self.usb_speed
    }

    pub fn firmware_debug(&self) -> FirmwareDebug {
        self.fw_debug
    }

    /// User-assigned display name, read from EEPROM on first access.
    pub fn camera_name(&mut self) -> Result<&str> {
        if self.camera_name.is_none() {
            let name =
                self.eeprom_read_string(eeprom::CAMERA_NAME_OFFSET, eeprom::CAMERA_NAME_LEN)?;
            self.camera_name = Some(name);
        }
        Ok(self.camera_name.as_deref().unwrap_or(eeprom::NONE_SENTINEL))
    }

    /// Stores a new display name in EEPROM. Names longer than the region
    /// allows are truncated, exactly as a subsequent read will report them.
    pub fn set_camera_name(&mut self, name: &str) -> Result<()> {
        self.eeprom_write_string(eeprom::CAMERA_NAME_OFFSET, eeprom::CAMERA_NAME_LEN, name)?;
        self.camera_name = Some(eeprom::decode_string(&eeprom::encode_string(
            name,
            eeprom::CAMERA_NAME_LEN,
        )));
        Ok(())
    }

    pub fn serial_number(&mut self) -> Result<&str> {
        if self.serial_number.is_none() {
            let mut serial = String::with_capacity(2 * eeprom::SERIAL_LEN);
            for i in 0..eeprom::SERIAL_LEN {
                let byte = self.eeprom_read_byte(eeprom::SERIAL_OFFSET + i as u8)?;
                serial.push_str(&format!("{byte:02x}"));
            }
            self.serial_number = Some(serial);
        }
        Ok(self.serial_number.as_deref().unwrap_or(""))
    }

    /// Sensor temperature in degrees Celsius. The raw code is decoded
    /// unsigned like every other reply; the scaling matches the vendor
    /// software.
    pub fn temperature(&mut self) -> Result<f64> {
        let raw = self.command(Command::GetTemp, 0)?;
        Ok((f64::from(raw) / 25.6).floor() / 10.0)
    }

    // --- persistent memory ---

    /// Total EEPROM length, queried once and cached.
    pub fn eeprom_length(&mut self) -> Result<u8> {
        if let Some(length) = self.eeprom_length {
            return Ok(length);
        }
        let length = self.command(Command::GetEepromLength, 0)? as u8;
        self.eeprom_length = Some(length);
        Ok(length)
    }

    pub fn eeprom_read_byte(&mut self, offset: u8) -> Result<u8> {
        self.eeprom_check_offset(offset)?;
        Ok(self.command(Command::GetEepromByte, offset.into())? as u8)
    }

    pub fn eeprom_write_byte(&mut self, offset: u8, value: u8) -> Result<()> {
        self.eeprom_check_offset(offset)?;
        self.command(
            Command::SetEepromByte,
            u32::from(offset) | u32::from(value) << 8,
        )?;
        Ok(())
    }

    /// Reads a string region, applying the length-prefix/0xFF convention
    /// and the `"None"` sentinel for never-written regions.
    pub fn eeprom_read_string(&mut self, offset: u8, length: usize) -> Result<String> {
        let mut raw = Vec::with_capacity(length);
        for i in 0..length {
            raw.push(self.eeprom_read_byte(region_cell(offset, i)?)?);
        }
        Ok(eeprom::decode_string(&raw))
    }

    /// Writes a string region under the same convention, truncating
    /// content to `length - 1` bytes.
    pub fn eeprom_write_string(&mut self, offset: u8, length: usize, text: &str) -> Result<()> {
        for (i, byte) in eeprom::encode_string(text, length).iter().enumerate() {
            self.eeprom_write_byte(region_cell(offset, i)?, *byte)?;
        }
        Ok(())
    }

    fn eeprom_check_offset(&mut self, offset: u8) -> Result<()> {
        let length = self.eeprom_length()?;
        if offset >= length {
            return Err(Error::OutOfRange {
                what: "EEPROM offset",
                value: offset.into(),
                max: u32::from(length).saturating_sub(1),
            });
        }
        Ok(())
    }

    // --- configuration ---

    pub fn amp_gain(&self) -> u8 {
        self.amp_gain_pct
    }

    /// Sets the amplifier gain as a percentage; values above 100 clamp.
    /// Takes effect at the next exposure.
    pub fn set_amp_gain(&mut self, pct: u8) {
        self.amp_gain_pct = pct.min(100);
    }

    pub fn amp_offset(&self) -> u8 {
        self.amp_offset_pct
    }

    /// Sets the amplifier offset as a percentage; 50 is neutral, values
    /// above 100 clamp. Takes effect at the next exposure.
    pub fn set_amp_offset(&mut self, pct: u8) {
        self.amp_offset_pct = pct.min(100);
    }

    pub fn verbose(&self) -> bool {
        self.trace_frames
    }

    pub fn set_verbose(&mut self, on: bool) {
        self.trace_frames = on;
    }

    pub fn geometry(&self) -> &Geometry {
        self.geometry
    }

    pub fn image_width(&self) -> usize {
        self.geometry.image_width
    }

    pub fn image_height(&self) -> usize {
        self.geometry.image_height
    }

    pub fn imaging_state(&self) -> ImagingState {
        self.state
    }

    // --- raw device commands ---

    pub fn wake(&mut self) -> Result<()> {
        self.command(Command::Ping, 0).map(drop)
    }

    /// Resets the device. Required after an abort before the next
    /// exposure, since an aborted readout leaves the firmware in an
    /// undefined state.
    pub fn reset(&mut self) -> Result<()> {
        self.command(Command::Reset, 0)?;
        self.state = ImagingState::Idle;
        Ok(())
    }

    /// Raw gain register, 0..=63. The firmware rejects anything larger,
    /// so it is refused here without device traffic.
    pub fn set_gain(&mut self, gain: u8) -> Result<()> {
        if gain > 63 {
            return Err(Error::OutOfRange {
                what: "gain",
                value: gain.into(),
                max: 63,
            });
        }
        self.command(Command::SetGain, gain.into()).map(drop)
    }

    pub fn get_gain(&mut self) -> Result<u8> {
        Ok(self.command(Command::GetGain, 0)? as u8)
    }

    /// Raw offset register: 8-bit magnitude plus sign bit 0x100.
    pub fn set_offset(&mut self, offset: u16) -> Result<()> {
        if offset > 0x1ff {
            return Err(Error::OutOfRange {
                what: "offset",
                value: offset.into(),
                max: 0x1ff,
            });
        }
        self.command(Command::SetOffset, offset.into()).map(drop)
    }

    pub fn get_offset(&mut self) -> Result<u16> {
        Ok(self.command(Command::GetOffset, 0)? as u16)
    }

    pub fn set_readout_speed(&mut self, speed: ReadoutSpeed) -> Result<()> {
        self.command(Command::SetReadoutSpeed, speed as u32).map(drop)
    }

    pub fn get_readout_speed(&mut self) -> Result<ReadoutSpeed> {
        let raw = self.command(Command::GetReadoutSpeed, 0)?;
        ReadoutSpeed::from_u32(raw).ok_or(Error::UnknownCode {
            what: "readout speed",
            code: raw,
        })
    }

    pub fn set_readout_mode(&mut self, mode: ReadoutMode) -> Result<()> {
        self.command(Command::SetReadoutMode, mode as u32).map(drop)
    }

    pub fn get_readout_mode(&mut self) -> Result<ReadoutMode> {
        let raw = self.command(Command::GetReadoutMode, 0)?;
        ReadoutMode::from_u32(raw).ok_or(Error::UnknownCode {
            what: "readout mode",
            code: raw,
        })
    }

    pub fn set_readout_delay(&mut self, delay: u16) -> Result<()> {
        self.command(Command::SetReadoutDelay, delay.into()).map(drop)
    }

    pub fn get_readout_delay(&mut self) -> Result<u16> {
        Ok(self.command(Command::GetReadoutDelay, 0)? as u16)
    }

    pub fn set_vdd_mode(&mut self, mode: VddMode) -> Result<()> {
        self.command(Command::SetVddMode, mode as u32).map(drop)
    }

    pub fn get_vdd_mode(&mut self) -> Result<VddMode> {
        let raw = self.command(Command::GetVddMode, 0)?;
        VddMode::from_u32(raw).ok_or(Error::UnknownCode {
            what: "VDD mode",
            code: raw,
        })
    }

    pub fn set_flush_mode(&mut self, mode: FlushMode) -> Result<()> {
        self.command(Command::SetFlushMode, mode as u32).map(drop)
    }

    pub fn get_flush_mode(&mut self) -> Result<FlushMode> {
        let raw = self.command(Command::GetFlushMode, 0)?;
        FlushMode::from_u32(raw).ok_or(Error::UnknownCode {
            what: "flush mode",
            code: raw,
        })
    }

    /// Programs the exposure duration in device ticks.
    pub fn set_exposure_ticks(&mut self, ticks: u32) -> Result<()> {
        self.command(Command::SetExpTime, ticks)?;
        self.exposure_ticks = ticks;
        Ok(())
    }

    pub fn get_exposure_ticks(&mut self) -> Result<u32> {
        self.command(Command::GetExpTime, 0)
    }

    /// Ticks left on the running exposure timer.
    pub fn exposure_ticks_left(&mut self) -> Result<u32> {
        self.command(Command::GetExpTimerCount, 0)
    }

    pub fn get_row_count_even(&mut self) -> Result<u16> {
        Ok(self.command(Command::GetRowCountEven, 0)? as u16)
    }

    pub fn get_row_count_odd(&mut self) -> Result<u16> {
        Ok(self.command(Command::GetRowCountOdd, 0)? as u16)
    }

    // --- exposure ---

    /// Configures and triggers one exposure of `seconds`.
    ///
    /// Readout speed, delay, mode and amplifier power are chosen from the
    /// duration: exposures under one second read out fast with the
    /// amplifier held on; longer ones read out slowly with the amplifier
    /// managed by the firmware. A transport failure leaves the session in
    /// its prior state.
    pub fn start_exposure(&mut self, seconds: f64) -> Result<()> {
        let ticks = (seconds * f64::from(TICKS_PER_SECOND)) as u32;
        let gain = gain_command_value(self.amp_gain_pct);
        let offset = offset_command_value(self.amp_offset_pct);

        self.command(Command::SetExpTime, ticks)?;
        self.exposure_ticks = ticks;
        if ticks < ONE_SECOND_TICKS {
            self.command(Command::SetReadoutSpeed, ReadoutSpeed::High as u32)?;
            self.command(Command::SetReadoutDelay, 3)?;
            self.command(Command::SetReadoutMode, ReadoutMode::Dual as u32)?;
            self.command(Command::SetVddMode, VddMode::On as u32)?;
        } else {
            self.command(Command::SetReadoutSpeed, ReadoutSpeed::Low as u32)?;
            self.command(Command::SetReadoutDelay, 5)?;
            self.command(Command::SetReadoutMode, ReadoutMode::Single as u32)?;
            self.command(Command::SetVddMode, VddMode::Auto as u32)?;
        }
        self.command(Command::SetGain, gain)?;
        self.command(Command::SetOffset, offset)?;
        self.command(Command::SetFlushMode, FlushMode::Continuous as u32)?;

        self.command(Command::Trigger, 0)?;
        self.state = ImagingState::Exposing;
        Ok(())
    }

    /// Tells the device to stop the running exposure. The device must be
    /// [`reset`](DsiCamera::reset) before the next exposure.
    pub fn abort_exposure(&mut self) -> Result<()> {
        self.state = ImagingState::Aborting;
        self.command(Command::Abort, 0).map(drop)
    }

    /// Reads out the finished exposure and reconstructs the image.
    ///
    /// For long exposures the remaining time is polled first; in
    /// [`ReadMode::NonBlocking`] an unfinished exposure returns
    /// [`Error::WouldBlock`] and the session stays in `Exposing`. Once
    /// readout starts, any failure forces the session back to `Idle` and
    /// the exposure must be restarted from scratch; there is no
    /// partial-frame recovery.
    pub fn read_image(&mut self, mode: ReadMode) -> Result<ImageView<'_>> {
        if self.state != ImagingState::Exposing {
            return Err(Error::NotExposing);
        }

        if self.exposure_ticks >= ONE_SECOND_TICKS {
            // ticks are 0.1 ms and the timeout is in ms, so this waits
            // until roughly a tenth of the read timeout remains. Kept
            // from the vendor traces.
            let threshold = self.image_timeout.as_millis() as u32;
            let mut ticks_left = self.exposure_ticks_left()?;
            while ticks_left > threshold {
                if mode == ReadMode::NonBlocking {
                    return Err(Error::WouldBlock);
                }
                log::debug!("exposure running, {ticks_left} ticks left");
                thread::sleep(POLL_INTERVAL);
                ticks_left = self.exposure_ticks_left()?;
            }
        }

        let timeout = self.image_timeout * 3;
        let DsiCamera {
            transport,
            frames,
            geometry,
            state,
            ..
        } = self;
        // Whatever happens past this point, the exposure is spent.
        let _idle = guard(state, |state| *state = ImagingState::Idle);

        for (label, buf) in [("even", &mut frames.even), ("odd", &mut frames.odd)] {
            let got = transport.bulk_read(EP_IMAGE_IN, buf, timeout)?;
            if got != buf.len() {
                log::warn!("{label} half-frame read returned {got} of {} bytes", buf.len());
                return Err(Error::ShortFrame {
                    expected: buf.len(),
                    got,
                });
            }
        }

        frames.decode(geometry);
        Ok(ImageView {
            data: frames.image(),
            width: geometry.image_width,
            height: geometry.image_height,
        })
    }
}

#[cfg(feature = "usb")]
impl DsiCamera<crate::transport::usb::UsbTransport> {
    /// Opens the camera named by `selector` ("usb:BUS,ADDR"), or the
    /// first DSI found when `None`.
    pub fn open(selector: Option<&str>) -> Result<DsiCamera<crate::transport::usb::UsbTransport>> {
        DsiCamera::open_with_options(selector, false)
    }

    pub fn open_with_options(
        selector: Option<&str>,
        trace_frames: bool,
    ) -> Result<DsiCamera<crate::transport::usb::UsbTransport>> {
        let location = match selector {
            Some(text) => Some(
                crate::transport::usb::DeviceLocation::parse(text)
                    .ok_or_else(|| Error::BadSelector(text.to_string()))?,
            ),
            None => None,
        };
        let transport = crate::transport::usb::UsbTransport::open(location)?;
        DsiCamera::with_options(transport, trace_frames)
    }
}

/// Address of `index` within a region starting at `offset`, refusing
/// regions that run past the end of the address space.
fn region_cell(offset: u8, index: usize) -> Result<u8> {
    let cell = usize::from(offset) + index;
    u8::try_from(cell).map_err(|_| Error::OutOfRange {
        what: "EEPROM offset",
        value: cell as u32,
        max: u32::from(u8::MAX),
    })
}

/// Gain percentage mapped onto the 0..=63 gain register, rounded.
pub(crate) fn gain_command_value(pct: u8) -> u32 {
    (63 * u32::from(pct) + 50) / 100
}

/// Offset percentage mapped onto the offset register: 50% is zero, the
/// distance from 50 scales onto 0..=255, and values below 50% carry the
/// sign bit 0x100.
pub(crate) fn offset_command_value(pct: u8) -> u32 {
    if pct < 50 {
        255 * (50 - u32::from(pct)) / 50 | 0x100
    } else {
        255 * (u32::from(pct) - 50) / 50
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_percentage_rounds_onto_register() {
        assert_eq!(gain_command_value(0), 0);
        assert_eq!(gain_command_value(100), 63);
        assert_eq!(gain_command_value(50), 32); // 31.5 rounds up
        assert_eq!(gain_command_value(1), 1); // 0.63 rounds up
    }

    #[test]
    fn offset_sign_bit_follows_midpoint() {
        for pct in 0..50u8 {
            let value = offset_command_value(pct);
            assert_ne!(value & 0x100, 0, "pct {pct} should carry the sign bit");
            assert!(value <= 0x1ff, "pct {pct} must fit the 9-bit register");
        }
        for pct in 50..=100u8 {
            let value = offset_command_value(pct);
            assert_eq!(value & 0x100, 0, "pct {pct} should not carry the sign bit");
        }
        assert_eq!(offset_command_value(50), 0);
    }

    #[test]
    fn offset_known_points() {
        // Observed in vendor traces: 20% -> 0x199, 80% -> 0x099
        assert_eq!(offset_command_value(20), 0x199);
        assert_eq!(offset_command_value(80), 0x099);
    }
}
