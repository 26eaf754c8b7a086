//! Request/reply frame codec and the command round trip.
//!
//! A request is `[total_len, seq, code, param...]` with the parameter in
//! little-endian order; the reply echoes the length and sequence number,
//! carries the 0x06 acknowledgement marker, and ends with the result in
//! little-endian order. Both field widths are fixed per command (see
//! [`crate::command`]). Results are always decoded unsigned, even for
//! commands whose value is logically signed; callers apply their own
//! interpretation.

use crate::command::{Command, Width};
use crate::error::{Error, Result};
use crate::transport::{Transport, EP_COMMAND_IN, EP_COMMAND_OUT};
use nom::combinator::map;
use nom::number::complete::{le_u16, le_u32, u8 as byte};
use nom::IResult;
use std::time::Duration;

/// Acknowledgement marker present in every well-formed reply.
pub const ACK: u8 = 0x06;
/// The command endpoint never returns more than one 64-byte packet.
pub const MAX_REPLY_LEN: usize = 0x40;

/// One encoded request frame.
#[derive(Debug, PartialEq, Eq)]
pub struct Request {
    buf: [u8; 7],
    len: usize,
}

impl Request {
    pub fn new(command: Command, param: u32, seq: u8) -> Request {
        let width = command.param_width();
        let len = 3 + width.bytes();
        let mut buf = [0u8; 7];
        buf[0] = len as u8;
        buf[1] = seq;
        buf[2] = command.code();
        buf[3..len].copy_from_slice(&param.to_le_bytes()[..width.bytes()]);
        Request { buf, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

fn result_field(input: &[u8], width: Width) -> IResult<&[u8], u32> {
    match width {
        Width::None => Ok((input, 0)),
        Width::Byte => map(byte, u32::from)(input),
        Width::Word => map(le_u16, u32::from)(input),
        Width::DWord => le_u32(input),
    }
}

/// Decodes a reply frame, verifying the length byte, the echoed sequence
/// number and the acknowledgement marker. Sequence or marker mismatches
/// mean the driver and firmware have lost frame synchronization; there is
/// no resynchronization procedure, so the session should be abandoned.
pub fn decode_reply(reply: &[u8], seq: u8, width: Width) -> Result<u32> {
    let expected = 3 + width.bytes();
    if reply.len() < expected {
        return Err(Error::TruncatedReply {
            expected,
            got: reply.len(),
        });
    }
    if usize::from(reply[0]) != expected {
        return Err(Error::TruncatedReply {
            expected,
            got: usize::from(reply[0]),
        });
    }
    if reply[1] != seq {
        return Err(Error::SequenceMismatch {
            expected: seq,
            got: reply[1],
        });
    }
    if reply[2] != ACK {
        return Err(Error::BadAck { got: reply[2] });
    }
    let (_, value) = result_field(&reply[3..], width).map_err(
        |_: nom::Err<nom::error::Error<&[u8]>>| Error::TruncatedReply {
            expected,
            got: reply.len(),
        },
    )?;
    Ok(value)
}

/// One-command-in-flight channel over a transport. Increments and embeds
/// the session sequence counter on every request.
pub(crate) struct CommandChannel<'a, T: Transport> {
    pub transport: &'a mut T,
    pub seq: &'a mut u8,
    pub trace: bool,
    pub timeout: Duration,
}

impl<'a, T: Transport> CommandChannel<'a, T> {
    pub fn send(&mut self, command: Command, param: u32) -> Result<u32> {
        *self.seq = self.seq.wrapping_add(1);
        let request = Request::new(command, param, *self.seq);
        if self.trace {
            log::trace!(
                "w {:02x} {:02x?} {:?} param={:#x}",
                EP_COMMAND_OUT,
                request.as_bytes(),
                command,
                param
            );
        }
        self.transport
            .bulk_write(EP_COMMAND_OUT, request.as_bytes(), self.timeout)?;

        let mut buf = [0u8; MAX_REPLY_LEN];
        let n = self
            .transport
            .bulk_read(EP_COMMAND_IN, &mut buf, self.timeout)?;
        let value = decode_reply(&buf[..n], *self.seq, command.reply_width())?;
        if self.trace {
            log::trace!(
                "r {:02x} {:02x?} ACK value={:#x}",
                EP_COMMAND_IN,
                &buf[..n],
                value
            );
        }
        Ok(value)
    }
}
