//! Declarative document descriptions for `psdw compose`.
//!
//! A manifest lists layers bottom to top. Each layer is either painted from
//! solid regions or decoded from an image file:
//!
//! ```toml
//! compression = "zip-with-prediction"
//!
//! [canvas]
//! width = 64
//! height = 64
//!
//! [[layers]]
//! type = "regions"
//! name = "Background"
//! width = 64
//! height = 64
//! regions = [{ x = 0, y = 0, width = 64, height = 64, color = [255, 255, 255, 255] }]
//!
//! [[layers]]
//! type = "image"
//! path = "logo.png"
//! left = 8
//! top = 8
//! opacity = 200
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use psdw::{Compression, Document, Layer, Region};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Manifest {
    /// Defaults to the bounding box of all layers
    #[serde(default)]
    pub canvas: Option<Canvas>,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default)]
    pub layers: Vec<LayerSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayerSpec {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub left: u32,
    #[serde(default)]
    pub top: u32,
    #[serde(default = "default_opacity")]
    pub opacity: u8,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(flatten)]
    pub source: LayerSource,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LayerSource {
    Regions {
        width: u32,
        height: u32,
        #[serde(default)]
        regions: Vec<Region>,
    },
    Image {
        /// Relative paths resolve against the manifest's directory
        path: PathBuf,
    },
}

const fn default_opacity() -> u8 {
    u8::MAX
}

const fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Json,
    Yaml,
    Toml,
}

impl ManifestFormat {
    /// Pick a format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

impl Manifest {
    pub fn parse(text: &str, format: ManifestFormat) -> Result<Self> {
        let manifest = match format {
            ManifestFormat::Json => serde_json::from_str(text)?,
            ManifestFormat::Yaml => serde_yaml::from_str(text)?,
            ManifestFormat::Toml => toml::from_str(text)?,
        };
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let Some(format) = ManifestFormat::from_path(path) else {
            bail!(
                "Unknown manifest format for {} (expected .json, .yaml, .yml or .toml)",
                path.display()
            );
        };

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::parse(&text, format)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))
    }

    /// Build every layer and the document. Image paths resolve against `base_dir`.
    pub fn into_document(self, base_dir: &Path) -> Result<Document> {
        let layers = self
            .layers
            .into_iter()
            .enumerate()
            .map(|(index, spec)| spec.into_layer(index, base_dir))
            .collect::<Result<Vec<_>>>()?;

        let canvas = self.canvas.map(|c| (c.width, c.height));
        Ok(psdw_enc::document_from_layers(
            layers,
            canvas,
            self.compression,
        )?)
    }
}

impl LayerSpec {
    fn into_layer(self, index: usize, base_dir: &Path) -> Result<Layer> {
        let layer = match self.source {
            LayerSource::Regions {
                width,
                height,
                regions,
            } => {
                let name = self
                    .name
                    .unwrap_or_else(|| format!("{} {}", psdw_enc::DEFAULT_LAYER_NAME, index + 1));
                Layer::from_regions(name, self.left, self.top, width, height, &regions)
            }
            LayerSource::Image { path } => {
                let path = base_dir.join(path);
                let mut layer = psdw_enc::load_layer(&path)?.with_position(self.left, self.top);
                if let Some(name) = self.name {
                    layer.name = name;
                }
                layer
            }
        };

        log::debug!(
            "Manifest layer {} '{}' at ({}, {}) {}x{}",
            index,
            layer.name,
            layer.left,
            layer.top,
            layer.width,
            layer.height
        );

        Ok(layer
            .with_opacity(self.opacity)
            .with_visible(self.visible))
    }
}
