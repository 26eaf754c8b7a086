//! Parsing of SniffUSB/USBsnoop-style hex captures.
//!
//! Captured bulk data comes as blocks of lines like
//!
//! ```text
//! 00000000: 13 45 13 49 13 4e 12 ac 49 b3 4d f2 52 40 56 67
//! 00000010: 5a 46 5e 31 62 3b 65 98 69 29 6c bb 6f b2 72 9d
//! ```
//!
//! separated by whatever else the sniffer logged. Each contiguous block
//! becomes one byte buffer; feeding the first two blocks of an image
//! capture to [`crate::deinterlace`] reproduces the frame offline.

use nom::bytes::complete::{tag, take_while_m_n};
use nom::character::complete::space0;
use nom::combinator::map_res;
use nom::multi::many1;
use nom::sequence::{delimited, terminated};
use nom::IResult;

/// Decodes a pair of chars formatted as hex into a byte. For example "FF" -> 255
fn hex_byte(input: &str) -> IResult<&str, u8> {
    map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |hex| u8::from_str_radix(hex, 16),
    )(input)
}

fn hex_offset(input: &str) -> IResult<&str, usize> {
    map_res(
        take_while_m_n(1, 8, |c: char| c.is_ascii_hexdigit()),
        |hex| usize::from_str_radix(hex, 16),
    )(input)
}

/// Parses one `OFFSET: bb bb ...` capture line.
fn dump_line(input: &str) -> IResult<&str, (usize, Vec<u8>)> {
    let (input, offset) = delimited(space0, terminated(hex_offset, tag(":")), space0)(input)?;
    let (input, bytes) = many1(delimited(space0, hex_byte, space0))(input)?;
    Ok((input, (offset, bytes)))
}

/// Splits a capture into the contiguous hex blocks it contains. Offsets
/// are relative to the start of each block; gaps read as zero.
pub fn parse_capture(text: &str) -> Vec<Vec<u8>> {
    let mut blocks = Vec::new();
    let mut current: Option<Vec<u8>> = None;
    for line in text.lines() {
        if let Ok((_, (offset, bytes))) = dump_line(line) {
            let block = current.get_or_insert_with(Vec::new);
            if block.len() < offset + bytes.len() {
                block.resize(offset + bytes.len(), 0);
            }
            block[offset..offset + bytes.len()].copy_from_slice(&bytes);
        } else if let Some(done) = current.take() {
            blocks.push(done);
        }
    }
    if let Some(done) = current.take() {
        blocks.push(done);
    }
    blocks
}
