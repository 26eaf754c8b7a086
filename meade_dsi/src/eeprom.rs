//! Encoding conventions for the camera's persistent memory.
//!
//! Strings are stored with their length in the first byte, the content
//! after it, and 0xFF filling the rest of the region. A region that was
//! never written reads back as all 0xFF; those decode to the sentinel
//! `"None"` rather than garbage.

/// Value found in unused EEPROM cells.
pub const FILL: u8 = 0xff;
/// Decoded value of a string region that was never written.
pub const NONE_SENTINEL: &str = "None";

/// Serial number: the first eight raw bytes, rendered as hex.
pub(crate) const SERIAL_OFFSET: u8 = 0x00;
pub(crate) const SERIAL_LEN: usize = 8;
/// Chip identifier string region.
pub(crate) const CHIP_NAME_OFFSET: u8 = 0x08;
pub(crate) const CHIP_NAME_LEN: usize = 20;
/// User-assignable camera name region.
pub(crate) const CAMERA_NAME_OFFSET: u8 = 0x1c;
pub(crate) const CAMERA_NAME_LEN: usize = 0x20;

/// Decodes one string region read out of EEPROM.
pub fn decode_string(raw: &[u8]) -> String {
    if raw.len() < 3 || raw[..3].iter().all(|b| *b == FILL) {
        return NONE_SENTINEL.to_string();
    }
    let n = usize::from(raw[0]).min(raw.len() - 1);
    let content = &raw[1..=n];
    let content = match content.iter().position(|b| *b == FILL) {
        Some(end) => &content[..end],
        None => content,
    };
    String::from_utf8_lossy(content).into_owned()
}

/// Encodes `text` for storage in a region of `length` bytes, truncating
/// content that does not fit in `length - 1` bytes.
pub fn encode_string(text: &str, length: usize) -> Vec<u8> {
    let mut region = vec![FILL; length];
    if length == 0 {
        return region;
    }
    // The length prefix is one byte, so a region can hold at most 255
    // content bytes no matter how large it is.
    let n = text.len().min(length - 1).min(usize::from(u8::MAX));
    region[0] = n as u8;
    region[1..=n].copy_from_slice(&text.as_bytes()[..n]);
    region
}
