//! The three watermark operations.
//!
//! [`WatermarkPipeline`] ties a loader, a text rasterizer and a downloader
//! together:
//!
//! - [`watermark_image`](WatermarkPipeline::watermark_image) stamps one image
//!   and returns it encoded
//! - [`watermark_and_download`](WatermarkPipeline::watermark_and_download)
//!   also hands the result to the download target
//! - [`watermark_batch`](WatermarkPipeline::watermark_batch) stamps many
//!   images with one set of options, preserving input order
//!
//! Each call resolves its own config and shares nothing mutable with other
//! calls, so any number of operations can run at once.

use super::compositor::apply_watermark;
use super::download::{default_filename, Downloader, FileDownloader, UnavailableDownloader};
use super::encoder::{encode, OutputConfig, WatermarkedImage};
use super::fonts::FontBook;
use super::image_fetcher::{HttpImageLoader, ImageLoader};
use super::text_renderer::{parse_color, GlyphRasterizer, TextRasterizer, TextStyle};
use super::{DownloadError, WatermarkConfig, WatermarkError, WatermarkOptions};
use crate::config::Config;
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;

/// Lifecycle of a single watermark operation, as reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Loading,
    Compositing,
    Succeeded,
    Failed,
}

impl OperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Pending => "pending",
            OperationState::Loading => "loading",
            OperationState::Compositing => "compositing",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
        }
    }
}

/// Result of [`WatermarkPipeline::watermark_and_download`].
///
/// The payload is always present; `saved` reports the download separately.
#[derive(Debug)]
pub struct DownloadedImage {
    pub image: WatermarkedImage,
    pub filename: String,
    pub saved: Result<PathBuf, DownloadError>,
}

impl DownloadedImage {
    /// Treat a failed download as a failed operation.
    pub fn into_result(self) -> Result<(WatermarkedImage, PathBuf), WatermarkError> {
        let path = self.saved?;
        Ok((self.image, path))
    }
}

/// Stamps text watermarks onto images.
#[derive(Clone)]
pub struct WatermarkPipeline {
    loader: Arc<dyn ImageLoader>,
    rasterizer: Arc<dyn TextRasterizer>,
    downloader: Arc<dyn Downloader>,
    defaults: WatermarkConfig,
    output: OutputConfig,
    max_concurrency: Option<usize>,
}

impl std::fmt::Debug for WatermarkPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkPipeline")
            .field("defaults", &self.defaults)
            .field("output", &self.output)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

impl WatermarkPipeline {
    /// Pipeline with house-style defaults, PNG output and no download target.
    pub fn new(loader: Arc<dyn ImageLoader>, rasterizer: Arc<dyn TextRasterizer>) -> Self {
        Self {
            loader,
            rasterizer,
            downloader: Arc::new(UnavailableDownloader),
            defaults: WatermarkConfig::default(),
            output: OutputConfig::default(),
            max_concurrency: None,
        }
    }

    /// Build the production pipeline: reqwest loader, system fonts and a
    /// directory downloader when `download.directory` is set.
    pub fn from_config(config: &Config) -> Result<Self, WatermarkError> {
        let loader = HttpImageLoader::new(&config.fetch)?;
        let rasterizer = GlyphRasterizer::new(FontBook::new(&config.fonts));
        let downloader: Arc<dyn Downloader> = match &config.download.directory {
            Some(dir) => Arc::new(FileDownloader::new(dir.clone())),
            None => Arc::new(UnavailableDownloader),
        };

        Ok(Self::new(Arc::new(loader), Arc::new(rasterizer))
            .with_defaults(config.watermark.clone())
            .with_output(config.output.clone())
            .with_downloader(downloader)
            .with_max_concurrency(config.batch.max_concurrency))
    }

    pub fn with_defaults(mut self, defaults: WatermarkConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = downloader;
        self
    }

    /// Bound batch concurrency; `None` runs every item at once.
    pub fn with_max_concurrency(mut self, limit: Option<usize>) -> Self {
        self.max_concurrency = limit;
        self
    }

    pub fn defaults(&self) -> &WatermarkConfig {
        &self.defaults
    }

    /// Load `source`, stamp it with `options` over the defaults and encode it.
    ///
    /// # Errors
    ///
    /// - `WatermarkError::Render` for invalid options, checked before any fetch
    /// - `WatermarkError::ImageLoad` if the source cannot be fetched or decoded
    /// - `WatermarkError::Render` if compositing or encoding fails
    pub async fn watermark_image(
        &self,
        source: &str,
        options: &WatermarkOptions,
    ) -> Result<WatermarkedImage, WatermarkError> {
        log_state(source, OperationState::Pending, None);
        let config = options.resolve(&self.defaults);
        if let Err(e) = config.validate() {
            log_state(source, OperationState::Failed, Some(&e));
            return Err(e);
        }

        log_state(source, OperationState::Loading, None);
        let image = match self.loader.load(source).await {
            Ok(image) => image,
            Err(e) => {
                log_state(source, OperationState::Failed, Some(&e));
                return Err(e);
            }
        };

        log_state(source, OperationState::Compositing, None);
        let rasterizer = Arc::clone(&self.rasterizer);
        let output = self.output.clone();
        let result = tokio::task::spawn_blocking(move || {
            stamp_and_encode(image, &config, rasterizer.as_ref(), &output)
        })
        .await
        .unwrap_or_else(|e| Err(WatermarkError::render(format!("compositing task failed: {}", e))));

        match &result {
            Ok(encoded) => {
                tracing::debug!(
                    source = %source,
                    state = OperationState::Succeeded.as_str(),
                    width = encoded.width(),
                    height = encoded.height(),
                    bytes = encoded.bytes().len(),
                    "Watermark applied"
                );
            }
            Err(e) => log_state(source, OperationState::Failed, Some(e)),
        }

        result
    }

    /// Watermark `source` and save it under `filename`.
    ///
    /// Without a filename the download is named `watermarked-<unix millis>`.
    /// A failed save is reported in [`DownloadedImage::saved`] and never
    /// discards the payload.
    pub async fn watermark_and_download(
        &self,
        source: &str,
        options: &WatermarkOptions,
        filename: Option<&str>,
    ) -> Result<DownloadedImage, WatermarkError> {
        let image = self.watermark_image(source, options).await?;
        let filename = match filename {
            Some(name) => name.to_string(),
            None => default_filename(image.format()),
        };

        let saved = self.downloader.download(&image, &filename).await;
        match &saved {
            Ok(path) => {
                tracing::info!(source = %source, path = %path.display(), "Watermarked image saved");
            }
            Err(e) => {
                tracing::warn!(
                    source = %source,
                    filename = %filename,
                    error = %e,
                    "Download failed"
                );
            }
        }

        Ok(DownloadedImage {
            image,
            filename,
            saved,
        })
    }

    /// Watermark every source with the same options.
    ///
    /// Results keep the order of `sources`. The first failure, by completion
    /// time, fails the whole batch and abandons the items still in flight.
    /// An empty input succeeds with an empty list.
    pub async fn watermark_batch<S>(
        &self,
        sources: &[S],
        options: &WatermarkOptions,
    ) -> Result<Vec<WatermarkedImage>, WatermarkError>
    where
        S: AsRef<str> + Sync,
    {
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let limit = self
            .max_concurrency
            .unwrap_or(sources.len())
            .clamp(1, sources.len());
        tracing::info!(count = sources.len(), concurrency = limit, "Starting watermark batch");

        let mut in_flight = stream::iter(sources.iter().enumerate())
            .map(|(index, source)| async move {
                (index, self.watermark_image(source.as_ref(), options).await)
            })
            .buffer_unordered(limit);

        let mut slots: Vec<Option<WatermarkedImage>> = (0..sources.len()).map(|_| None).collect();
        while let Some((index, result)) = in_flight.next().await {
            match result {
                Ok(image) => slots[index] = Some(image),
                Err(e) => {
                    tracing::warn!(
                        index,
                        source = %sources[index].as_ref(),
                        error = %e,
                        "Batch item failed, abandoning batch"
                    );
                    return Err(e);
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

/// Rasterize the text, composite it and encode the result.
pub fn stamp_and_encode(
    image: DynamicImage,
    config: &WatermarkConfig,
    rasterizer: &dyn TextRasterizer,
    output: &OutputConfig,
) -> Result<WatermarkedImage, WatermarkError> {
    let style = TextStyle {
        text: config.text.clone(),
        font_size_px: config.font_size_px()?,
        font_family: config.font_family.clone(),
        color: parse_color(&config.color)?,
    };
    let text_layer = rasterizer.rasterize(&style)?;

    let mut canvas = image.to_rgba8();
    apply_watermark(
        &mut canvas,
        text_layer,
        config.position,
        config.margin,
        config.opacity,
    );

    encode(&canvas, output)
}

fn log_state(source: &str, state: OperationState, error: Option<&WatermarkError>) {
    match error {
        Some(e) => tracing::debug!(
            source = %source,
            state = state.as_str(),
            error = %e,
            "Watermark operation"
        ),
        None => tracing::debug!(
            source = %source,
            state = state.as_str(),
            "Watermark operation"
        ),
    }
}
