//! Source image loading.
//!
//! Loads the image a watermark is stamped onto, from one of:
//!
//! - `http://` / `https://` URLs, fetched anonymously (no cookies, no
//!   credentials, no referer) so the result never depends on a session
//! - `file://` URLs and plain paths
//! - `data:` URIs, including the ones this crate produces
//!
//! Relative URLs such as `/uploads/a.png` resolve against the configured
//! `fetch.base_url`; without one they are read as local paths.
//!
//! # Caching
//!
//! Decoded images can be cached in memory, keyed by the resolved URL. The
//! cache is off by default (`cache_max_entries: 0`) so concurrent
//! operations share nothing.

use super::WatermarkError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use moka::future::Cache;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn default_user_agent() -> String {
    format!("storemark/{}", env!("CARGO_PKG_VERSION"))
}

fn default_cache_ttl() -> u64 {
    3600
}

/// Configuration for source image loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Origin that relative image URLs resolve against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Request timeout in seconds (default: none, a hung request waits)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// User-Agent header sent with image requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum number of decoded images kept in memory (default: 0, disabled)
    #[serde(default)]
    pub cache_max_entries: u64,

    /// Time-to-live for cached images in seconds (default: 3600)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_seconds: None,
            user_agent: default_user_agent(),
            cache_max_entries: 0,
            cache_ttl_seconds: default_cache_ttl(),
        }
    }
}

/// Parsed location of a source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// HTTP(S) URL, fetched anonymously.
    Http(Url),
    /// Local file.
    File(PathBuf),
    /// Inline `data:` URI payload.
    Data { mime: String, bytes: Vec<u8> },
}

impl ImageSource {
    /// Parse a source string, resolving relative URLs against `base`.
    ///
    /// # Errors
    ///
    /// Returns `WatermarkError::ImageLoad` for empty input, malformed URLs,
    /// unsupported schemes and undecodable `data:` payloads.
    pub fn parse(source: &str, base: Option<&Url>) -> Result<Self, WatermarkError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(WatermarkError::load("image source cannot be empty"));
        }

        if let Some(rest) = source.strip_prefix("data:") {
            return parse_data_uri(rest);
        }

        if !has_scheme(source) {
            return match base {
                Some(base) => base.join(source).map(ImageSource::Http).map_err(|e| {
                    WatermarkError::load(format!("invalid image URL {}: {}", source, e))
                }),
                None => Ok(ImageSource::File(PathBuf::from(source))),
            };
        }

        let url = Url::parse(source)
            .map_err(|e| WatermarkError::load(format!("invalid image URL {}: {}", source, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(ImageSource::Http(url)),
            "file" => url
                .to_file_path()
                .map(ImageSource::File)
                .map_err(|_| WatermarkError::load(format!("invalid file URL: {}", source))),
            scheme => Err(WatermarkError::load(format!(
                "unsupported source scheme '{}' in {}",
                scheme, source
            ))),
        }
    }

    /// Cache key for this source; inline payloads are never cached.
    pub fn cache_key(&self) -> Option<String> {
        match self {
            ImageSource::Http(url) => Some(url.to_string()),
            ImageSource::File(path) => Some(format!("file://{}", path.display())),
            ImageSource::Data { .. } => None,
        }
    }
}

/// True for `scheme:...` strings. Single letters are drive names, not schemes.
fn has_scheme(source: &str) -> bool {
    match source.split_once(':') {
        Some((scheme, _)) => {
            scheme.len() > 1
                && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

/// Decode the part of a data URI after `data:`.
fn parse_data_uri(rest: &str) -> Result<ImageSource, WatermarkError> {
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| WatermarkError::load("malformed data URI: missing ','"))?;

    let mut params = header.split(';');
    let mime = params.next().unwrap_or_default();
    let mime = if mime.is_empty() {
        "text/plain".to_string()
    } else {
        mime.to_ascii_lowercase()
    };
    let is_base64 = params.any(|p| p.eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| WatermarkError::load(format!("invalid base64 in data URI: {}", e)))?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };

    Ok(ImageSource::Data { mime, bytes })
}

/// Cached decoded image.
#[derive(Clone)]
pub struct CachedImage {
    pub image: Arc<DynamicImage>,
}

impl std::fmt::Debug for CachedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedImage")
            .field("dimensions", &(self.image.width(), self.image.height()))
            .finish()
    }
}

/// Loads and decodes the image referenced by a source string.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, source: &str) -> Result<DynamicImage, WatermarkError>;
}

/// Default loader: reqwest for HTTP(S), tokio for files, inline data URIs.
#[derive(Clone)]
pub struct HttpImageLoader {
    http_client: reqwest::Client,
    base_url: Option<Url>,
    cache: Option<Cache<String, CachedImage>>,
}

impl std::fmt::Debug for HttpImageLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpImageLoader")
            .field("base_url", &self.base_url)
            .field("cache_enabled", &self.cache.is_some())
            .finish()
    }
}

impl HttpImageLoader {
    /// Create a loader from the fetch configuration.
    ///
    /// # Errors
    ///
    /// Returns `WatermarkError::ImageLoad` if the base URL is malformed or
    /// the HTTP client cannot be created.
    pub fn new(config: &FetchConfig) -> Result<Self, WatermarkError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| WatermarkError::load(format!("invalid fetch.base_url: {}", e)))?;

        // Anonymous mode: reqwest keeps no cookie store unless asked to.
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .referer(false);
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder
            .build()
            .map_err(|e| WatermarkError::load(format!("failed to create HTTP client: {}", e)))?;

        let cache = (config.cache_max_entries > 0).then(|| {
            Cache::builder()
                .max_capacity(config.cache_max_entries)
                .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
                .build()
        });

        Ok(Self {
            http_client,
            base_url,
            cache,
        })
    }

    /// Number of cached images (0 when caching is disabled).
    pub fn cache_size(&self) -> u64 {
        self.cache.as_ref().map(|c| c.entry_count()).unwrap_or(0)
    }

    /// Check if a source is cached.
    pub async fn is_cached(&self, source: &str) -> bool {
        let Some(cache) = &self.cache else {
            return false;
        };
        let Ok(parsed) = ImageSource::parse(source, self.base_url.as_ref()) else {
            return false;
        };
        match parsed.cache_key() {
            Some(key) => cache.get(&key).await.is_some(),
            None => false,
        }
    }

    async fn fetch_http(&self, url: &Url) -> Result<Vec<u8>, WatermarkError> {
        let response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| WatermarkError::load(format!("HTTP fetch failed for {}: {}", url, e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(WatermarkError::load(format!(
                "{} refused anonymous access ({})",
                url, status
            )));
        }
        if !status.is_success() {
            return Err(WatermarkError::load(format!(
                "HTTP request for {} failed with status: {}",
                url, status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WatermarkError::load(format!("failed to read HTTP body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn load(&self, source: &str) -> Result<DynamicImage, WatermarkError> {
        let parsed = ImageSource::parse(source, self.base_url.as_ref())?;
        let cache_key = parsed.cache_key();

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(cached) = cache.get(key).await {
                tracing::debug!(source = %key, "Source image cache hit");
                return Ok(cached.image.as_ref().clone());
            }
        }

        let (bytes, hint) = match parsed {
            ImageSource::Http(url) => {
                let bytes = self.fetch_http(&url).await?;
                (bytes, url.path().to_string())
            }
            ImageSource::File(path) => {
                let bytes = tokio::fs::read(&path).await.map_err(|e| {
                    WatermarkError::load(format!("cannot read {}: {}", path.display(), e))
                })?;
                (bytes, path.to_string_lossy().into_owned())
            }
            ImageSource::Data { mime, bytes } => {
                let ext = mime.rsplit('/').next().unwrap_or_default().to_string();
                (bytes, format!("inline.{}", ext))
            }
        };

        tracing::debug!(source = %source, bytes = bytes.len(), "Fetched source image");

        let image = tokio::task::spawn_blocking(move || decode_image(&bytes, &hint))
            .await
            .map_err(|e| WatermarkError::load(format!("decode task failed: {}", e)))??;

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            cache
                .insert(
                    key,
                    CachedImage {
                        image: Arc::new(image.clone()),
                    },
                )
                .await;
        }

        Ok(image)
    }
}

/// Decode image bytes, detecting the format from magic bytes or extension.
pub fn decode_image(data: &[u8], path_hint: &str) -> Result<DynamicImage, WatermarkError> {
    let format = detect_image_format(data, path_hint)?;
    image::load_from_memory_with_format(data, format)
        .map_err(|e| WatermarkError::load(format!("failed to decode image: {}", e)))
}

/// Detect image format from bytes or filename extension.
fn detect_image_format(data: &[u8], path: &str) -> Result<ImageFormat, WatermarkError> {
    if let Ok(format) = image::guess_format(data) {
        return Ok(format);
    }

    let ext = path
        .rsplit('.')
        .next()
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => Ok(ImageFormat::Png),
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "gif" => Ok(ImageFormat::Gif),
        "webp" => Ok(ImageFormat::WebP),
        _ => Err(WatermarkError::load(format!(
            "unsupported image format: {}",
            ext
        ))),
    }
}
