//! Position calculation for watermark placement.
//!
//! # Example
//!
//! ```
//! use storemark::watermark::position::{calculate_position, ImageDimensions, WatermarkDimensions};
//! use storemark::watermark::WatermarkPosition;
//!
//! let image = ImageDimensions { width: 800, height: 600 };
//! let watermark = WatermarkDimensions { width: 100, height: 50 };
//!
//! let pos = calculate_position(WatermarkPosition::LowerRight, &image, &watermark, 10);
//! assert_eq!((pos.x, pos.y), (690, 540)); // 800 - 100 - 10, 600 - 50 - 10
//! ```

use super::WatermarkPosition;

/// Dimensions of the target image.
#[derive(Debug, Clone, Copy)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Dimensions of the rendered watermark.
#[derive(Debug, Clone, Copy)]
pub struct WatermarkDimensions {
    pub width: u32,
    pub height: u32,
}

/// Top-left corner where a watermark is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementPosition {
    pub x: i32,
    pub y: i32,
}

impl PlacementPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Calculate where the watermark's top-left corner goes.
///
/// Coordinates may be negative if the watermark is larger than the image;
/// the compositor clips to the image bounds.
pub fn calculate_position(
    position: WatermarkPosition,
    image: &ImageDimensions,
    watermark: &WatermarkDimensions,
    margin: u32,
) -> PlacementPosition {
    let img_w = image.width as i32;
    let img_h = image.height as i32;
    let wm_w = watermark.width as i32;
    let wm_h = watermark.height as i32;
    let m = margin as i32;

    match position {
        WatermarkPosition::UpperLeft => PlacementPosition::new(m, m),
        WatermarkPosition::UpperRight => PlacementPosition::new(img_w - wm_w - m, m),
        WatermarkPosition::LowerLeft => PlacementPosition::new(m, img_h - wm_h - m),
        WatermarkPosition::LowerRight => PlacementPosition::new(img_w - wm_w - m, img_h - wm_h - m),
        WatermarkPosition::Center => PlacementPosition::new((img_w - wm_w) / 2, (img_h - wm_h) / 2),
    }
}
