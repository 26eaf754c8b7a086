use core::fmt;
use num_derive::FromPrimitive;

/// Bus speed the camera negotiated. Only high speed is usable for imaging.
#[derive(FromPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
pub enum UsbSpeed {
    Full = 0,
    High = 1,
}

impl fmt::Display for UsbSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsbSpeed::Full => f.write_str("full speed"),
            UsbSpeed::High => f.write_str("high speed"),
        }
    }
}

#[derive(FromPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
pub enum FirmwareDebug {
    Off = 0,
    On = 1,
}

impl fmt::Display for FirmwareDebug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FirmwareDebug::Off => f.write_str("off"),
            FirmwareDebug::On => f.write_str("on"),
        }
    }
}

/// Driver-side bookkeeping of the exposure cycle.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ImagingState {
    Idle,
    Exposing,
    Aborting,
}

#[derive(FromPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
pub enum ReadoutSpeed {
    Low = 0,
    High = 1,
}

/// How the CCD is clocked out. Dual readout is faster but noisier; the
/// driver uses it for exposures under one second.
#[derive(FromPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
pub enum ReadoutMode {
    Dual = 0,
    Single = 1,
    Odd = 2,
    Even = 3,
}

/// Amplifier power mode. Auto powers the amplifier down during long
/// exposures until readout.
#[derive(FromPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
pub enum VddMode {
    Auto = 0,
    On = 1,
    Off = 2,
}

#[derive(FromPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
pub enum FlushMode {
    Continuous = 0,
    BeforeExposure = 1,
    Never = 2,
}
