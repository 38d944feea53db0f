//! Fixed values of the PSD container that this writer emits.

/// Signature that opens the blend-mode block of every layer record
pub const BLEND_SIGNATURE: &[u8; 4] = b"8BIM";

/// Blend-mode key for normal (source-over) blending
pub const BLEND_MODE_NORMAL: &[u8; 4] = b"norm";

/// Color mode value for RGB documents
pub const COLOR_MODE_RGB: u16 = 3;

/// Bits per channel
pub const BIT_DEPTH: u16 = 8;

/// Channels declared in the file header and written to the composite section
pub const COMPOSITE_CHANNELS: u16 = 3;

/// Layer record flag bit: layer is hidden
pub const FLAG_HIDDEN: u8 = 1 << 1;

/// Layer names are padded so `1 + len` is a multiple of this
pub const LAYER_NAME_PADDING: usize = 4;

/// Channel identifiers used in layer records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum ChannelId {
    /// Transparency (layer alpha)
    Alpha = -1,
    Red = 0,
    Green = 1,
    Blue = 2,
}

impl ChannelId {
    /// Order in which layer channels are declared and stored
    pub const LAYER_ORDER: [Self; 4] = [Self::Alpha, Self::Red, Self::Green, Self::Blue];

    /// Order of the planes in the composite section
    pub const COMPOSITE_ORDER: [Self; 3] = [Self::Red, Self::Green, Self::Blue];

    /// Signed id as written in the record
    pub fn id(self) -> i16 {
        self as i16
    }

    /// Byte offset of this channel inside an interleaved RGBA pixel
    pub fn rgba_offset(self) -> usize {
        match self {
            Self::Red => 0,
            Self::Green => 1,
            Self::Blue => 2,
            Self::Alpha => 3,
        }
    }
}

/// Build the flags byte of a layer record
pub fn layer_flags(visible: bool) -> u8 {
    if visible {
        0
    } else {
        FLAG_HIDDEN
    }
}
