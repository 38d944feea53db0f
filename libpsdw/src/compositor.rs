//! Flattening of a layer stack into the composite image.

use crate::document::Layer;

/// Convert a unit value back to a byte, rounding to nearest with ties to even
fn to_byte(value: f32) -> u8 {
    (value * 255.0).round_ties_even().clamp(0.0, 255.0) as u8
}

/// Straight-alpha source-over for one color channel
fn blend_channel(src: u8, dst: u8, src_a: f32, dst_a: f32, out_a: f32) -> u8 {
    if out_a == 0.0 {
        return 0;
    }
    let src = f32::from(src) / 255.0;
    let dst = f32::from(dst) / 255.0;
    to_byte((src * src_a + dst * dst_a * (1.0 - src_a)) / out_a)
}

/// Paint one layer over `canvas` (a `canvas_width`-wide RGBA buffer)
fn blend_layer(canvas: &mut [u8], canvas_width: usize, canvas_height: usize, layer: &Layer) {
    let left = layer.left as usize;
    let top = layer.top as usize;
    let layer_width = layer.width as usize;
    // Validated layers always fit; the clamp keeps unvalidated input in bounds.
    let cols = layer_width.min(canvas_width.saturating_sub(left));
    let rows = (layer.height as usize).min(canvas_height.saturating_sub(top));
    let opacity = f32::from(layer.opacity) / 255.0;

    for ly in 0..rows {
        let src_row = ly * layer_width * 4;
        let dst_row = ((top + ly) * canvas_width + left) * 4;

        for lx in 0..cols {
            let Some(src) = layer.pixels.get(src_row + lx * 4..src_row + lx * 4 + 4) else {
                return;
            };
            let src_a = f32::from(src[3]) / 255.0 * opacity;
            if src_a <= 0.0 {
                continue;
            }

            let dst = &mut canvas[dst_row + lx * 4..dst_row + lx * 4 + 4];
            let dst_a = f32::from(dst[3]) / 255.0;
            let out_a = src_a + dst_a * (1.0 - src_a);

            for c in 0..3 {
                dst[c] = blend_channel(src[c], dst[c], src_a, dst_a, out_a);
            }
            dst[3] = to_byte(out_a);
        }
    }
}

/// Flatten `layers` back to front onto a transparent `width` x `height` canvas.
///
/// Hidden layers are skipped entirely. The result is straight-alpha RGBA,
/// `width * height * 4` bytes.
pub fn composite(width: u32, height: u32, layers: &[Layer]) -> Vec<u8> {
    let (width, height) = (width as usize, height as usize);
    let mut canvas = vec![0u8; width * height * 4];

    for layer in layers.iter().filter(|layer| layer.visible) {
        log::trace!(
            "Compositing layer '{}' at ({}, {}) opacity {}",
            layer.name,
            layer.left,
            layer.top,
            layer.opacity
        );
        blend_layer(&mut canvas, width, height, layer);
    }

    canvas
}
