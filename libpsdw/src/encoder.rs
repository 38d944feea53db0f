use std::io::Write;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::channel;
use crate::compositor;
use crate::compression::Compression;
use crate::container::{self, ChannelInfo, Header, LayerRecord};
use crate::document::{Document, Layer};
use crate::error::Result;
use crate::format::{self, ChannelId};
use crate::report::{EncodeReport, LayerReport};

/// A layer with its record built and its channels compressed
struct PreparedLayer {
    record: LayerRecord,
    blocks: Vec<Vec<u8>>,
    report: LayerReport,
}

/// PSD document encoder
pub struct Encoder<W> {
    writer: W,
}

impl<W: Write> Encoder<W> {
    /// Create a new encoder
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Validate, flatten, compress and write `document`.
    ///
    /// Validation failures are reported before any byte reaches the writer.
    /// An I/O failure can leave a partial stream behind; the destination must
    /// then be discarded.
    pub fn encode(&mut self, document: &Document) -> Result<EncodeReport> {
        document.validate()?;

        log::debug!(
            "Encoding {}x{} document with {} layers ({})",
            document.width,
            document.height,
            document.layers.len(),
            document.compression
        );

        let flattened = compositor::composite(document.width, document.height, &document.layers);
        let layers = prepare_layers(document)?;

        let layer_info = build_layer_info(&layers)?;
        let mut layer_and_mask = Vec::with_capacity(layer_info.len() + 8);
        container::write_section(&mut layer_and_mask, "layer info", &layer_info)?;
        layer_and_mask.extend_from_slice(&0u32.to_be_bytes()); // global layer mask info
        let layer_and_mask_length =
            container::section_length("layer and mask information", layer_and_mask.len())?;

        let image_data = build_image_data(&flattened, document)?;

        log::debug!(
            "Layer section {} bytes, image data {} bytes",
            layer_and_mask.len(),
            image_data.len()
        );

        Header::new(document.width, document.height).write_to(&mut self.writer)?;
        self.writer.write_all(&0u32.to_be_bytes())?; // color mode data
        self.writer.write_all(&0u32.to_be_bytes())?; // image resources
        self.writer.write_all(&layer_and_mask_length.to_be_bytes())?;
        self.writer.write_all(&layer_and_mask)?;
        self.writer.write_all(&image_data)?;
        self.writer.flush()?;

        let total_bytes = Header::SIZE + 4 + 4 + 4 + layer_and_mask.len() + image_data.len();

        Ok(EncodeReport {
            width: document.width,
            height: document.height,
            compression: document.compression,
            layers: layers.into_iter().map(|layer| layer.report).collect(),
            layer_info_length: layer_info.len() as u64,
            layer_and_mask_length: u64::from(layer_and_mask_length),
            composite_length: image_data.len() as u64,
            total_bytes: total_bytes as u64,
        })
    }

    /// Borrow the underlying writer
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Write `document` to `output`
pub fn write<W: Write>(document: &Document, output: W) -> Result<()> {
    Encoder::new(output).encode(document).map(|_| ())
}

fn prepare_layers(document: &Document) -> Result<Vec<PreparedLayer>> {
    #[cfg(feature = "parallel")]
    let layers = document.layers.par_iter();
    #[cfg(not(feature = "parallel"))]
    let layers = document.layers.iter();

    layers
        .enumerate()
        .map(|(index, layer)| prepare_layer(index, layer, document.compression))
        .collect()
}

fn prepare_layer(index: usize, layer: &Layer, method: Compression) -> Result<PreparedLayer> {
    let planes = channel::split_channels(layer);
    let width = layer.width as usize;

    let mut channels = Vec::with_capacity(planes.len());
    let mut blocks = Vec::with_capacity(planes.len());
    for (id, plane) in ChannelId::LAYER_ORDER.into_iter().zip(&planes) {
        let block = channel::compress_channel(plane, width, method)?;
        let length = container::section_length("channel data", block.len())?;
        channels.push(ChannelInfo { id, length });
        blocks.push(block);
    }

    let (name, altered) = container::ascii_name(&layer.name);
    let written_name = altered.then(|| String::from_utf8_lossy(&name).into_owned());
    if let Some(written) = &written_name {
        log::warn!(
            "Layer {} name '{}' written as '{}'",
            index,
            layer.name,
            written
        );
    }
    if layer.visible && layer.is_fully_transparent() {
        log::warn!("Layer {} '{}' is visible but fully transparent", index, layer.name);
    }

    // Geometry is bounded by MAX_DIMENSION, so it always fits i32.
    let record = LayerRecord {
        top: layer.top as i32,
        left: layer.left as i32,
        bottom: layer.bottom() as i32,
        right: layer.right() as i32,
        channels,
        opacity: layer.opacity,
        flags: format::layer_flags(layer.visible),
        name,
    };

    log::trace!(
        "Layer {} '{}': channel blocks {:?}",
        index,
        layer.name,
        record.channels.iter().map(|c| c.length).collect::<Vec<_>>()
    );

    let report = LayerReport {
        name: layer.name.clone(),
        bounds: [record.top, record.left, record.bottom, record.right],
        opacity: layer.opacity,
        visible: layer.visible,
        channel_lengths: [
            record.channels[0].length,
            record.channels[1].length,
            record.channels[2].length,
            record.channels[3].length,
        ],
        written_name,
    };

    Ok(PreparedLayer {
        record,
        blocks,
        report,
    })
}

/// Layer count, all records, then all channel blocks in declaration order,
/// padded to an even length
fn build_layer_info(layers: &[PreparedLayer]) -> Result<Vec<u8>> {
    let data_len: usize = layers
        .iter()
        .flat_map(|layer| &layer.blocks)
        .map(Vec::len)
        .sum();
    let mut info = Vec::with_capacity(2 + layers.len() * 96 + data_len + 1);

    // Document::validate bounds the count to i16::MAX.
    info.extend_from_slice(&(layers.len() as i16).to_be_bytes());

    for layer in layers {
        layer.record.write_to(&mut info)?;
    }

    for block in layers.iter().flat_map(|layer| &layer.blocks) {
        info.extend_from_slice(block);
    }

    if info.len() % 2 == 1 {
        info.push(0);
    }

    Ok(info)
}

/// Compression tag plus the R, G, B planes of the flattened canvas. No alpha
/// plane is written: the header declares three channels.
fn build_image_data(flattened: &[u8], document: &Document) -> Result<Vec<u8>> {
    let planes = ChannelId::COMPOSITE_ORDER.map(|channel| channel::extract_plane(flattened, channel));
    let planes: Vec<&[u8]> = planes.iter().map(Vec::as_slice).collect();

    channel::compress_composite(&planes, document.width as usize, document.compression)
}
