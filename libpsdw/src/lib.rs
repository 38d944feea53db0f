#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

//! psdw - A layered PSD document writer
//!
//! This library turns a stack of straight-alpha RGBA layers into an 8-bit RGB
//! PSD byte stream: one layer record per layer with its own alpha, red, green
//! and blue channels, plus a flattened composite for readers that ignore
//! layers. Channels can be stored raw, PackBits-encoded, or deflated with or
//! without horizontal prediction.
//!
//! ```no_run
//! use psdw::{Compression, Document, Layer};
//!
//! let red = Layer::new("red", 0, 0, 2, 2, [255, 0, 0, 255].repeat(4));
//! let document = Document::new(2, 2)
//!     .with_compression(Compression::Rle)
//!     .with_layer(red);
//!
//! let file = std::fs::File::create("out.psd")?;
//! psdw::write(&document, std::io::BufWriter::new(file))?;
//! # Ok::<(), psdw::PsdError>(())
//! ```

pub mod channel;
pub mod compositor;
pub mod compression;
pub mod container;
pub mod document;
pub mod encoder;
pub mod error;
pub mod format;
pub mod report;

pub use compositor::composite;
pub use compression::Compression;
pub use document::{Document, Layer, Region};
pub use encoder::{write, Encoder};
pub use error::{PsdError, Result};
pub use report::{EncodeReport, LayerReport};

/// PSD format version written by this crate
pub const PSD_VERSION: u16 = 1;

/// Magic bytes for PSD files
pub const PSD_SIGNATURE: &[u8; 4] = b"8BPS";

/// Maximum canvas width or height for format version 1
pub const MAX_DIMENSION: u32 = 30_000;

/// Maximum length of a layer name in bytes
pub const MAX_LAYER_NAME_LEN: usize = 255;
