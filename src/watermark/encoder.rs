//! Output encoding for watermarked images.
//!
//! A finished image is serialized once (PNG by default) and exposed both as
//! raw bytes and as a self-contained `data:` URI.

use super::WatermarkError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, DynamicImage, ImageEncoder, RgbaImage};
use serde::{Deserialize, Serialize};

/// Encoded output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
}

impl OutputFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

fn default_jpeg_quality() -> u8 {
    90
}

/// Output encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Encoded format (default: png)
    #[serde(default)]
    pub format: OutputFormat,

    /// JPEG quality 1-100, ignored for PNG (default: 90)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl OutputConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(format!(
                "output.jpeg_quality must be between 1 and 100, got {}",
                self.jpeg_quality
            ));
        }
        Ok(())
    }
}

/// An encoded watermarked image.
#[derive(Clone, PartialEq, Eq)]
pub struct WatermarkedImage {
    bytes: Vec<u8>,
    format: OutputFormat,
    width: u32,
    height: u32,
    data_uri: String,
}

impl std::fmt::Debug for WatermarkedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkedImage")
            .field("format", &self.format)
            .field("dimensions", &(self.width, self.height))
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl WatermarkedImage {
    fn new(bytes: Vec<u8>, format: OutputFormat, width: u32, height: u32) -> Self {
        let data_uri = format!(
            "data:{};base64,{}",
            format.mime_type(),
            STANDARD.encode(&bytes)
        );
        Self {
            bytes,
            format,
            width,
            height,
            data_uri,
        }
    }

    /// `data:<mime>;base64,<payload>` form of the encoded image.
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    pub fn into_data_uri(self) -> String {
        self.data_uri
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Decode the payload back into pixels.
    pub fn decode(&self) -> Result<DynamicImage, WatermarkError> {
        image::load_from_memory(&self.bytes)
            .map_err(|e| WatermarkError::render(format!("failed to decode output: {}", e)))
    }
}

/// Encode a composited image with the configured output settings.
pub fn encode(
    image: &RgbaImage,
    output: &OutputConfig,
) -> Result<WatermarkedImage, WatermarkError> {
    let (width, height) = image.dimensions();
    let mut bytes = Vec::new();

    match output.format {
        OutputFormat::Png => {
            PngEncoder::new(&mut bytes)
                .write_image(image.as_raw(), width, height, ColorType::Rgba8)
                .map_err(|e| WatermarkError::render(format!("PNG encoding failed: {}", e)))?;
        }
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
            JpegEncoder::new_with_quality(&mut bytes, output.jpeg_quality.clamp(1, 100))
                .write_image(rgb.as_raw(), width, height, ColorType::Rgb8)
                .map_err(|e| WatermarkError::render(format!("JPEG encoding failed: {}", e)))?;
        }
    }

    Ok(WatermarkedImage::new(bytes, output.format, width, height))
}
