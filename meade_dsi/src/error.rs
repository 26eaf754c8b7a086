use crate::transport::TransportError;
use core::result::Result as CoreResult;
use thiserror::Error;

pub type Result<T> = CoreResult<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("reply sequence number {got:#04x} does not match request {expected:#04x}")]
    SequenceMismatch { expected: u8, got: u8 },
    #[error("reply acknowledgement byte is {got:#04x}, expected 0x06")]
    BadAck { got: u8 },
    #[error("reply truncated: expected {expected} bytes, got {got}")]
    TruncatedReply { expected: usize, got: usize },
    #[error("half-frame read returned {got} of {expected} bytes")]
    ShortFrame { expected: usize, got: usize },
    #[error("camera chip {0:?} is not supported")]
    UnsupportedChip(String),
    #[error("no exposure in progress")]
    NotExposing,
    #[error("exposure not finished")]
    WouldBlock,
    #[error("{what} {value} is outside the accepted range 0..={max}")]
    OutOfRange {
        what: &'static str,
        value: u32,
        max: u32,
    },
    #[error("device reported unknown {what} code {code:#x}")]
    UnknownCode { what: &'static str, code: u32 },
    #[error("device selector {0:?} is not of the form \"usb:BUS,ADDR\"")]
    BadSelector(String),
}
