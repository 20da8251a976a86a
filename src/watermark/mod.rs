//! Text watermarking for storefront listing images.
//!
//! Stamps a line of text (the shop's brand by default) onto product images
//! so screenshots and reposts stay attributable. Three operations are
//! exposed through [`WatermarkPipeline`]:
//!
//! - **watermark one image** and get it back as a PNG `data:` URI
//! - **watermark and download**, saving the result under a filename
//! - **watermark a batch** with shared options, in input order
//!
//! # Configuration Example
//!
//! ```yaml
//! watermark:
//!   text: "© 物流骑商城"
//!   position: lowerRight     # lowerLeft, upperRight, upperLeft, center
//!   font_size: 48px
//!   font_family: sans-serif
//!   color: "#fff"
//!   opacity: 0.5
//!   margin: 10
//! ```
//!
//! # Seams
//!
//! The pipeline talks to the outside world through three traits, each with
//! a production implementation:
//! - [`ImageLoader`] / [`HttpImageLoader`] for source images
//! - [`TextRasterizer`] / [`GlyphRasterizer`] for drawing text with system fonts
//! - [`Downloader`] / [`FileDownloader`] for saving results

pub mod compositor;
pub mod config;
pub mod download;
pub mod encoder;
pub mod error;
pub mod fonts;
pub mod image_fetcher;
pub mod pipeline;
pub mod position;
pub mod text_renderer;

// Re-export main types for convenience
pub use compositor::{apply_watermark, WatermarkLayer};
pub use config::{
    FontSize, WatermarkConfig, WatermarkOptions, WatermarkPosition, DEFAULT_BRAND,
    MAX_FONT_SIZE_PX,
};
pub use download::{
    default_filename, DownloadConfig, DownloadLink, Downloader, FileDownloader,
    UnavailableDownloader,
};
pub use encoder::{encode, OutputConfig, OutputFormat, WatermarkedImage};
pub use error::{DownloadError, WatermarkError};
pub use fonts::{FontBook, FontConfig};
pub use image_fetcher::{FetchConfig, HttpImageLoader, ImageLoader, ImageSource};
pub use pipeline::{stamp_and_encode, DownloadedImage, OperationState, WatermarkPipeline};
pub use position::{calculate_position, ImageDimensions, PlacementPosition, WatermarkDimensions};
pub use text_renderer::{
    measure_text, parse_color, render_text, render_text_with_fallback, select_font, Color,
    GlyphRasterizer, TextRasterizer, TextStyle, MAX_LAYER_PIXELS,
};
