//! Watermark compositor for blending rendered text onto images.
//!
//! Layers are placed with [`calculate_position`] and clipped to the target.
//! Opacity is folded into the layer's own alpha before the Porter-Duff
//! "over" blend, the same way a canvas `globalAlpha` behaves.

use super::position::{calculate_position, ImageDimensions, PlacementPosition, WatermarkDimensions};
use super::WatermarkPosition;
use image::{Rgba, RgbaImage};

/// A watermark layer to be composited onto an image.
#[derive(Clone)]
pub struct WatermarkLayer {
    /// The watermark image (RGBA).
    pub image: RgbaImage,
    /// Position where the watermark should be placed.
    pub position: PlacementPosition,
    /// Opacity to apply (0.0 to 1.0). Applied on top of image's alpha channel.
    pub opacity: f32,
}

impl std::fmt::Debug for WatermarkLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkLayer")
            .field("dimensions", &(self.image.width(), self.image.height()))
            .field("position", &self.position)
            .field("opacity", &self.opacity)
            .finish()
    }
}

impl WatermarkLayer {
    /// Build a layer placed at one of the five positions on `target`.
    pub fn positioned(
        watermark: RgbaImage,
        target: &ImageDimensions,
        position: WatermarkPosition,
        margin: u32,
        opacity: f32,
    ) -> Self {
        let wm_dims = WatermarkDimensions {
            width: watermark.width(),
            height: watermark.height(),
        };
        let pos = calculate_position(position, target, &wm_dims, margin);

        Self {
            image: watermark,
            position: pos,
            opacity,
        }
    }

    /// Blend this layer onto the target image.
    pub fn blend_onto(&self, target: &mut RgbaImage) {
        let target_width = target.width() as i32;
        let target_height = target.height() as i32;

        let wm_width = self.image.width() as i32;
        let wm_height = self.image.height() as i32;

        // Visible region, clamped to target bounds
        let x_start = self.position.x.max(0);
        let y_start = self.position.y.max(0);
        let x_end = (self.position.x + wm_width).min(target_width);
        let y_end = (self.position.y + wm_height).min(target_height);

        for ty in y_start..y_end {
            for tx in x_start..x_end {
                let wx = (tx - self.position.x) as u32;
                let wy = (ty - self.position.y) as u32;

                let wm_pixel = self.image.get_pixel(wx, wy);
                let target_pixel = target.get_pixel(tx as u32, ty as u32);

                let blended = blend_pixels(*target_pixel, *wm_pixel, self.opacity);
                target.put_pixel(tx as u32, ty as u32, blended);
            }
        }
    }
}

/// Blend two pixels using alpha compositing with additional opacity.
///
/// Uses the "over" operator: result = foreground + background * (1 - foreground.alpha)
fn blend_pixels(background: Rgba<u8>, foreground: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let fg_alpha = (foreground[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);
    let bg_alpha = background[3] as f32 / 255.0;

    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend_channel = |fg: u8, bg: u8| -> u8 {
        let fg_f = fg as f32 / 255.0;
        let bg_f = bg as f32 / 255.0;
        let result = (fg_f * fg_alpha + bg_f * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend_channel(foreground[0], background[0]),
        blend_channel(foreground[1], background[1]),
        blend_channel(foreground[2], background[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}

/// Stamp a rendered watermark onto `target` at the given position.
pub fn apply_watermark(
    target: &mut RgbaImage,
    watermark: RgbaImage,
    position: WatermarkPosition,
    margin: u32,
    opacity: f32,
) -> WatermarkLayer {
    let image_dims = ImageDimensions {
        width: target.width(),
        height: target.height(),
    };

    let layer = WatermarkLayer::positioned(watermark, &image_dims, position, margin, opacity);
    layer.blend_onto(target);
    layer
}
