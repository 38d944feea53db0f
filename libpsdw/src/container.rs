use std::io::Write;

use crate::error::{PsdError, Result};
use crate::format::{self, ChannelId};

/// PSD file layout written by this crate
///
/// File structure:
/// - Header (26 bytes)
/// - Color mode data section (empty, 4-byte length)
/// - Image resources section (empty, 4-byte length)
/// - Layer and mask information section (length-prefixed)
///   - Layer info (length-prefixed): count, records, channel data, pad to even
///   - Global layer mask info (empty, 4-byte length)
/// - Image data: compression tag + R, G, B planes
///
/// All integers are big-endian.

/// PSD file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Magic bytes: "8BPS"
    pub signature: [u8; 4],
    /// Format version
    pub version: u16,
    /// Number of channels in the composite image
    pub channels: u16,
    pub height: u32,
    pub width: u32,
    /// Bits per channel
    pub depth: u16,
    pub color_mode: u16,
}

impl Header {
    pub const SIZE: usize = 26;

    /// Create an 8-bit RGB header for a `width` x `height` canvas
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            signature: *crate::PSD_SIGNATURE,
            version: crate::PSD_VERSION,
            channels: format::COMPOSITE_CHANNELS,
            height,
            width,
            depth: format::BIT_DEPTH,
            color_mode: format::COLOR_MODE_RGB,
        }
    }

    /// Serialize the header
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buffer = [0u8; Self::SIZE];

        buffer[0..4].copy_from_slice(&self.signature);
        buffer[4..6].copy_from_slice(&self.version.to_be_bytes());
        // 6..12 reserved, zero
        buffer[12..14].copy_from_slice(&self.channels.to_be_bytes());
        buffer[14..18].copy_from_slice(&self.height.to_be_bytes());
        buffer[18..22].copy_from_slice(&self.width.to_be_bytes());
        buffer[22..24].copy_from_slice(&self.depth.to_be_bytes());
        buffer[24..26].copy_from_slice(&self.color_mode.to_be_bytes());

        buffer
    }

    /// Write header to a writer
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }
}

/// Channel entry of a layer record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: ChannelId,
    /// Length of the compressed block, including its 2-byte tag
    pub length: u32,
}

/// One layer record, everything but the channel data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerRecord {
    pub top: i32,
    pub left: i32,
    pub bottom: i32,
    pub right: i32,
    pub channels: Vec<ChannelInfo>,
    pub opacity: u8,
    pub flags: u8,
    /// ASCII name, at most 255 bytes
    pub name: Vec<u8>,
}

impl LayerRecord {
    /// Append the record to `buffer`
    pub fn write_to(&self, buffer: &mut Vec<u8>) -> Result<()> {
        buffer.extend_from_slice(&self.top.to_be_bytes());
        buffer.extend_from_slice(&self.left.to_be_bytes());
        buffer.extend_from_slice(&self.bottom.to_be_bytes());
        buffer.extend_from_slice(&self.right.to_be_bytes());

        buffer.extend_from_slice(&(self.channels.len() as u16).to_be_bytes());
        for channel in &self.channels {
            buffer.extend_from_slice(&channel.id.id().to_be_bytes());
            buffer.extend_from_slice(&channel.length.to_be_bytes());
        }

        buffer.extend_from_slice(format::BLEND_SIGNATURE);
        buffer.extend_from_slice(format::BLEND_MODE_NORMAL);
        buffer.push(self.opacity);
        buffer.push(0); // clipping: base
        buffer.push(self.flags);
        buffer.push(0); // filler

        let mut extra = Vec::with_capacity(8 + 1 + self.name.len() + 3);
        extra.extend_from_slice(&0u32.to_be_bytes()); // layer mask data
        extra.extend_from_slice(&0u32.to_be_bytes()); // blending ranges
        write_pascal_string(&mut extra, &self.name, format::LAYER_NAME_PADDING);

        write_section(buffer, "layer extra data", &extra)
    }
}

/// Map a layer name to at most 255 ASCII bytes.
///
/// Non-ASCII characters become `?`. The flag is true when the name was altered.
pub fn ascii_name(name: &str) -> (Vec<u8>, bool) {
    let mut altered = false;
    let bytes: Vec<u8> = name
        .chars()
        .take(crate::MAX_LAYER_NAME_LEN)
        .map(|c| {
            if c.is_ascii() {
                c as u8
            } else {
                altered = true;
                b'?'
            }
        })
        .collect();

    (bytes, altered || name.chars().count() > crate::MAX_LAYER_NAME_LEN)
}

/// Append a 1-byte length, the bytes, and zero padding so the total is a
/// multiple of `pad_multiple`
pub fn write_pascal_string(buffer: &mut Vec<u8>, bytes: &[u8], pad_multiple: usize) {
    let len = bytes.len().min(u8::MAX as usize);
    let total = 1 + len;
    let padded = total.div_ceil(pad_multiple) * pad_multiple;

    buffer.push(len as u8);
    buffer.extend_from_slice(&bytes[..len]);
    buffer.resize(buffer.len() + (padded - total), 0);
}

/// 32-bit length field for a section of `length` bytes
pub fn section_length(section: &'static str, length: usize) -> Result<u32> {
    u32::try_from(length).map_err(|_| PsdError::SectionTooLarge { section, length })
}

/// Append `body` prefixed with its 32-bit length
pub fn write_section(buffer: &mut Vec<u8>, section: &'static str, body: &[u8]) -> Result<()> {
    let length = section_length(section, body.len())?;
    buffer.extend_from_slice(&length.to_be_bytes());
    buffer.extend_from_slice(body);
    Ok(())
}
