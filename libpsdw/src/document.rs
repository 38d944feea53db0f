use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::compression::Compression;
use crate::error::{PsdError, Result};

/// Solid RGBA rectangle used to paint a layer before it is built.
///
/// Coordinates are relative to the layer and may lie partly outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    /// Straight-alpha RGBA color
    pub color: [u8; 4],
}

impl Region {
    /// Create a new region
    pub fn new(x: i32, y: i32, width: i32, height: i32, color: [u8; 4]) -> Self {
        Self {
            x,
            y,
            width,
            height,
            color,
        }
    }
}

/// One raster layer: a rectangle of straight-alpha RGBA pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub name: String,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    /// Row-major interleaved RGBA, `width * height * 4` bytes
    pub pixels: Vec<u8>,
    pub opacity: u8,
    pub visible: bool,
}

impl Layer {
    /// Create a fully opaque, visible layer
    pub fn new(
        name: impl Into<String>,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            left,
            top,
            width,
            height,
            pixels,
            opacity: u8::MAX,
            visible: true,
        }
    }

    /// Create a layer from an RGBA image placed at `(left, top)`
    pub fn from_image(name: impl Into<String>, left: u32, top: u32, image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(name, left, top, width, height, image.into_raw())
    }

    /// Paint `regions` in order over a fully transparent buffer.
    ///
    /// Regions are clipped to the layer; regions with a non-positive size are
    /// skipped. Later regions overwrite earlier ones.
    pub fn from_regions<'a>(
        name: impl Into<String>,
        left: u32,
        top: u32,
        width: u32,
        height: u32,
        regions: impl IntoIterator<Item = &'a Region>,
    ) -> Self {
        let mut pixels = vec![0u8; width as usize * height as usize * 4];
        let (layer_w, layer_h) = (i64::from(width), i64::from(height));

        for region in regions {
            if region.width <= 0 || region.height <= 0 {
                continue;
            }

            let x0 = i64::from(region.x).max(0);
            let y0 = i64::from(region.y).max(0);
            let x1 = (i64::from(region.x) + i64::from(region.width)).min(layer_w);
            let y1 = (i64::from(region.y) + i64::from(region.height)).min(layer_h);
            if x0 >= x1 || y0 >= y1 {
                continue;
            }

            let row_bytes = width as usize * 4;
            for y in y0 as usize..y1 as usize {
                let row = &mut pixels[y * row_bytes..(y + 1) * row_bytes];
                for pixel in row[x0 as usize * 4..x1 as usize * 4].chunks_exact_mut(4) {
                    pixel.copy_from_slice(&region.color);
                }
            }
        }

        Self::new(name, left, top, width, height, pixels)
    }

    /// Set layer opacity
    pub fn with_opacity(mut self, opacity: u8) -> Self {
        self.opacity = opacity;
        self
    }

    /// Set layer visibility
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Move the layer to `(left, top)`
    pub fn with_position(mut self, left: u32, top: u32) -> Self {
        self.left = left;
        self.top = top;
        self
    }

    /// Exclusive right edge
    pub fn right(&self) -> u64 {
        u64::from(self.left) + u64::from(self.width)
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u64 {
        u64::from(self.top) + u64::from(self.height)
    }

    /// Expected length of the pixel buffer
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// True if every pixel has zero alpha
    pub fn is_fully_transparent(&self) -> bool {
        self.pixels.chunks_exact(4).all(|p| p[3] == 0)
    }

    /// Check this layer against a canvas. `index` is only used for error reporting.
    pub fn validate(&self, index: usize, canvas_width: u32, canvas_height: u32) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PsdError::InvalidLayerName { layer: index });
        }

        if self.width == 0 || self.height == 0 {
            return Err(PsdError::InvalidLayerGeometry {
                layer: index,
                reason: format!(
                    "size {}x{} must be greater than zero",
                    self.width, self.height
                ),
            });
        }

        if self.right() > u64::from(canvas_width) || self.bottom() > u64::from(canvas_height) {
            return Err(PsdError::InvalidLayerGeometry {
                layer: index,
                reason: format!(
                    "rectangle ({}, {})..({}, {}) exceeds canvas {}x{}",
                    self.left,
                    self.top,
                    self.right(),
                    self.bottom(),
                    canvas_width,
                    canvas_height
                ),
            });
        }

        let expected = self.expected_len();
        if self.pixels.len() != expected {
            return Err(PsdError::InvalidPixelBufferLength {
                layer: index,
                expected,
                actual: self.pixels.len(),
            });
        }

        Ok(())
    }
}

/// A canvas plus an ordered, back-to-front stack of layers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub width: u32,
    pub height: u32,
    /// Applied to both the layer channels and the composite section
    pub compression: Compression,
    pub layers: Vec<Layer>,
}

impl Document {
    /// Create an empty document using RLE compression
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            compression: Compression::default(),
            layers: Vec::new(),
        }
    }

    /// Set the compression method
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Append a layer on top of the stack
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Append a layer on top of the stack
    pub fn push_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    /// Validate canvas size, layer count, and every layer
    pub fn validate(&self) -> Result<()> {
        if self.width == 0
            || self.height == 0
            || self.width > crate::MAX_DIMENSION
            || self.height > crate::MAX_DIMENSION
        {
            return Err(PsdError::InvalidCanvasSize {
                width: self.width,
                height: self.height,
            });
        }

        if self.layers.len() > i16::MAX as usize {
            return Err(PsdError::TooManyLayers {
                count: self.layers.len(),
            });
        }

        for (index, layer) in self.layers.iter().enumerate() {
            layer.validate(index, self.width, self.height)?;
        }

        Ok(())
    }

    /// Flatten all visible layers into the composite preview the document embeds
    pub fn flatten(&self) -> RgbaImage {
        let pixels = crate::compositor::composite(self.width, self.height, &self.layers);
        RgbaImage::from_raw(self.width, self.height, pixels)
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }
}
