use serde::Serialize;

use crate::compression::Compression;

/// Summary of one written layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerReport {
    pub name: String,
    /// top, left, bottom, right
    pub bounds: [i32; 4],
    pub opacity: u8,
    pub visible: bool,
    /// Compressed block lengths in declaration order: alpha, red, green, blue
    pub channel_lengths: [u32; 4],
    /// Name as written, if it had to be truncated or made ASCII
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_name: Option<String>,
}

/// Byte layout of a written document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodeReport {
    pub width: u32,
    pub height: u32,
    pub compression: Compression,
    pub layers: Vec<LayerReport>,
    /// Length field of the layer info block (includes the pad byte)
    pub layer_info_length: u64,
    /// Length field of the layer and mask information section
    pub layer_and_mask_length: u64,
    /// Bytes of the image data section, tag included
    pub composite_length: u64,
    /// Every byte handed to the output
    pub total_bytes: u64,
}

impl EncodeReport {
    /// Sum of all compressed layer channel blocks
    pub fn channel_data_bytes(&self) -> u64 {
        self.layers
            .iter()
            .flat_map(|layer| layer.channel_lengths)
            .map(u64::from)
            .sum()
    }

    /// Number of layers flagged hidden
    pub fn hidden_layers(&self) -> usize {
        self.layers.iter().filter(|layer| !layer.visible).count()
    }
}
