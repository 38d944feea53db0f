//! Per-channel compression: turns planar channel data into the tagged blocks
//! stored in layer records and in the composite section.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::compression::{self, Compression, EncodedRows};
use crate::document::Layer;
use crate::error::Result;
use crate::format::ChannelId;

/// Copy one component out of an interleaved RGBA buffer
pub fn extract_plane(rgba: &[u8], channel: ChannelId) -> Vec<u8> {
    let offset = channel.rgba_offset();
    rgba.chunks_exact(4).map(|pixel| pixel[offset]).collect()
}

/// Deinterleave a layer into owned planes in declaration order:
/// alpha, red, green, blue
pub fn split_channels(layer: &Layer) -> [Vec<u8>; 4] {
    ChannelId::LAYER_ORDER.map(|channel| extract_plane(&layer.pixels, channel))
}

fn push_row_lengths(block: &mut Vec<u8>, rows: &EncodedRows) {
    for length in &rows.row_lengths {
        block.extend_from_slice(&length.to_be_bytes());
    }
}

/// Compress one `width`-wide channel plane into a tagged block.
///
/// For RLE the block is: tag, one big-endian row length per row, row payloads.
pub fn compress_channel(plane: &[u8], width: usize, method: Compression) -> Result<Vec<u8>> {
    let mut block = Vec::with_capacity(2 + plane.len());
    block.extend_from_slice(&method.tag().to_be_bytes());

    match method {
        Compression::Raw => block.extend_from_slice(&compression::encode_raw(plane)),
        Compression::Rle => {
            let rows = compression::encode_rle_rows(plane, width)?;
            push_row_lengths(&mut block, &rows);
            block.extend_from_slice(&rows.payload);
        }
        Compression::Zip => block.extend_from_slice(&compression::deflate(plane)?),
        Compression::ZipWithPrediction => {
            block.extend_from_slice(&compression::deflate_predicted(plane, width)?);
        }
    }

    Ok(block)
}

/// RLE-encode every plane independently
fn encode_planes(planes: &[&[u8]], width: usize) -> Result<Vec<EncodedRows>> {
    #[cfg(feature = "parallel")]
    let planes = planes.par_iter();
    #[cfg(not(feature = "parallel"))]
    let planes = planes.iter();

    planes
        .map(|plane| compression::encode_rle_rows(plane, width))
        .collect()
}

/// Compress the composite planes into the single tagged block of the image
/// data section.
///
/// RLE writes the row length tables of all planes first (plane by plane),
/// then all payloads. Zip methods deflate the planes as one stream; the
/// predictor never crosses a plane or row boundary.
pub fn compress_composite(planes: &[&[u8]], width: usize, method: Compression) -> Result<Vec<u8>> {
    let total: usize = planes.iter().map(|plane| plane.len()).sum();
    let mut block = Vec::with_capacity(2 + total);
    block.extend_from_slice(&method.tag().to_be_bytes());

    match method {
        Compression::Raw => {
            for plane in planes {
                block.extend_from_slice(&compression::encode_raw(plane));
            }
        }
        Compression::Rle => {
            let encoded = encode_planes(planes, width)?;
            for rows in &encoded {
                push_row_lengths(&mut block, rows);
            }
            for rows in &encoded {
                block.extend_from_slice(&rows.payload);
            }
        }
        Compression::Zip | Compression::ZipWithPrediction => {
            let mut combined = Vec::with_capacity(total);
            for plane in planes {
                let start = combined.len();
                combined.extend_from_slice(plane);
                if method == Compression::ZipWithPrediction {
                    compression::predict_rows(&mut combined[start..], width);
                }
            }
            block.extend_from_slice(&compression::deflate(&combined)?);
        }
    }

    Ok(block)
}
