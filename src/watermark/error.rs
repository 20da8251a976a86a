//! Watermark error types.
//!
//! Defines errors that can occur while loading, stamping, encoding and
//! saving watermarked images.

use thiserror::Error;

/// Errors that can occur during watermark processing.
#[derive(Debug, Error)]
pub enum WatermarkError {
    /// The source image could not be fetched or decoded
    #[error("Failed to load image: {0}")]
    ImageLoad(String),

    /// Compositing or encoding failed (bad position key, font, color, ...)
    #[error("Failed to render watermark: {0}")]
    Render(String),

    /// The host download mechanism failed
    #[error(transparent)]
    Download(#[from] DownloadError),
}

impl WatermarkError {
    pub(crate) fn load(msg: impl Into<String>) -> Self {
        Self::ImageLoad(msg.into())
    }

    pub(crate) fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// True for failures of the source fetch/decode step.
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::ImageLoad(_))
    }

    /// True for failures of the compositing/encoding step.
    pub fn is_render_error(&self) -> bool {
        matches!(self, Self::Render(_))
    }
}

/// Errors raised while handing a finished payload to the download target.
///
/// Kept apart from [`WatermarkError`] so a failed save never hides a
/// payload that was computed successfully.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Download target unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid download filename '{0}'")]
    InvalidFilename(String),

    #[error("Download I/O error: {0}")]
    Io(#[from] std::io::Error),
}
