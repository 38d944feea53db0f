use thiserror::Error;

/// Result type for psdw operations
pub type Result<T> = std::result::Result<T, PsdError>;

/// Errors that can occur while writing a PSD document
#[derive(Error, Debug)]
pub enum PsdError {
    #[error("Invalid canvas size: {width}x{height} (each side must be 1..={max})", max = crate::MAX_DIMENSION)]
    InvalidCanvasSize { width: u32, height: u32 },

    #[error("Invalid geometry for layer {layer}: {reason}")]
    InvalidLayerGeometry { layer: usize, reason: String },

    #[error("Invalid pixel buffer for layer {layer}: expected {expected} bytes, got {actual}")]
    InvalidPixelBufferLength {
        layer: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Layer {layer} has an empty name")]
    InvalidLayerName { layer: usize },

    #[error("Too many layers: {count} (maximum is {max})", max = i16::MAX)]
    TooManyLayers { count: usize },

    #[error("Unsupported compression method: {0}")]
    UnsupportedCompressionMethod(u16),

    #[error("Encoded RLE row {row} is {length} bytes, which does not fit a 16-bit length field")]
    RowTooLarge { row: usize, length: usize },

    #[error("Section '{section}' is {length} bytes, which does not fit a 32-bit length field")]
    SectionTooLarge { section: &'static str, length: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PsdError {
    /// Returns true if this error was detected before any byte was written
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCanvasSize { .. }
                | Self::InvalidLayerGeometry { .. }
                | Self::InvalidPixelBufferLength { .. }
                | Self::InvalidLayerName { .. }
                | Self::TooManyLayers { .. }
                | Self::UnsupportedCompressionMethod(_)
        )
    }

    /// Returns true if the output may already hold a partial, invalid stream
    pub fn is_mid_stream(&self) -> bool {
        matches!(
            self,
            Self::RowTooLarge { .. } | Self::SectionTooLarge { .. } | Self::Io(_)
        )
    }
}
