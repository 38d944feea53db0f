#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

//! psdw encoder library
//!
//! Decodes ordinary raster images (PNG, JPEG, ...) through the `image` crate
//! and stacks them as layers of a PSD document.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use image::DynamicImage;
use rayon::prelude::*;
use thiserror::Error;

pub use psdw::{Compression, Document, EncodeReport, Encoder, Layer, PsdError};

/// Name given to a layer whose source path has no usable file stem
pub const DEFAULT_LAYER_NAME: &str = "Layer";

/// Error type for image-to-document encoding
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("No input images given and no canvas size set")]
    NoInputs,

    #[error(transparent)]
    Psd(#[from] PsdError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EncodeError {
    /// The document error, if this failure came from the writer
    pub const fn as_psd(&self) -> Option<&PsdError> {
        match self {
            Self::Psd(err) => Some(err),
            _ => None,
        }
    }

    /// True if the failure was caused by bad input rather than the output sink
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::Decode { .. } | Self::NoInputs => true,
            Self::Psd(err) => err.is_validation_error(),
            Self::Io { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EncodeError>;

/// Compression method as spelled on the command line
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompressionArg {
    Raw,
    #[default]
    Rle,
    Zip,
    ZipPrediction,
}

impl From<CompressionArg> for Compression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::Raw => Self::Raw,
            CompressionArg::Rle => Self::Rle,
            CompressionArg::Zip => Self::Zip,
            CompressionArg::ZipPrediction => Self::ZipWithPrediction,
        }
    }
}

/// Size the global worker pool used for decoding and channel compression
pub fn configure_threads(threads: usize) -> std::result::Result<(), rayon::ThreadPoolBuildError> {
    log::debug!("Using {} worker threads", threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
}

/// Parse a `WIDTHxHEIGHT` canvas size such as `1920x1080`
pub fn parse_canvas(value: &str) -> std::result::Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;

    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|e| format!("invalid dimension '{part}': {e}"))
    };

    Ok((parse(width)?, parse(height)?))
}

/// Build a layer at the canvas origin from any decoded image
pub fn layer_from_image(name: impl Into<String>, image: &DynamicImage) -> Layer {
    Layer::from_image(name, 0, 0, image.to_rgba8())
}

/// Layer name for an input path: its file stem
pub fn layer_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LAYER_NAME.to_string())
}

/// Decode one image file into a layer named after the file
pub fn load_layer(path: &Path) -> Result<Layer> {
    let image = image::open(path).map_err(|source| EncodeError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    log::debug!(
        "Decoded {} ({}x{}, {:?})",
        path.display(),
        image.width(),
        image.height(),
        image.color()
    );

    Ok(layer_from_image(layer_name(path), &image))
}

/// Decode every input in parallel, keeping input order
pub fn load_layers<P: AsRef<Path> + Sync>(paths: &[P]) -> Result<Vec<Layer>> {
    paths
        .par_iter()
        .map(|path| load_layer(path.as_ref()))
        .collect()
}

/// Stack `layers` bottom to top on a canvas.
///
/// Without an explicit `canvas` the document is as wide as the widest layer
/// and as tall as the tallest one.
pub fn document_from_layers(
    layers: Vec<Layer>,
    canvas: Option<(u32, u32)>,
    compression: Compression,
) -> Result<Document> {
    let (width, height) = match canvas {
        Some(size) => size,
        None if layers.is_empty() => return Err(EncodeError::NoInputs),
        None => layers.iter().fold((0, 0), |(w, h), layer| {
            (w.max(layer.right() as u32), h.max(layer.bottom() as u32))
        }),
    };

    let mut document = Document::new(width, height).with_compression(compression);
    for layer in layers {
        document.push_layer(layer);
    }
    Ok(document)
}

/// Decode `paths` and stack them, first path at the bottom
pub fn document_from_images<P: AsRef<Path> + Sync>(
    paths: &[P],
    canvas: Option<(u32, u32)>,
    compression: Compression,
) -> Result<Document> {
    document_from_layers(load_layers(paths)?, canvas, compression)
}

/// Convenience function to encode a stack of images as a PSD document
pub fn encode_images_to_psd<W: Write, P: AsRef<Path> + Sync>(
    writer: W,
    paths: &[P],
    canvas: Option<(u32, u32)>,
    compression: Compression,
) -> Result<EncodeReport> {
    let document = document_from_images(paths, canvas, compression)?;
    Ok(Encoder::new(writer).encode(&document)?)
}

/// Write `document` to a file at `path`.
///
/// Validation runs before the file is created. If writing fails part way the
/// partial file is removed.
pub fn write_document_file(path: &Path, document: &Document) -> Result<EncodeReport> {
    document.validate()?;

    let file = File::create(path).map_err(|source| EncodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut encoder = Encoder::new(BufWriter::new(file));
    match encoder.encode(document) {
        Ok(report) => Ok(report),
        Err(err) => {
            drop(encoder);
            if let Err(remove_err) = fs::remove_file(path) {
                log::warn!(
                    "Could not remove partial output {}: {}",
                    path.display(),
                    remove_err
                );
            }
            Err(err.into())
        }
    }
}
