//! Saving watermarked images to a download target.
//!
//! [`FileDownloader`] writes into a configured directory through a transient
//! [`DownloadLink`]: the payload goes to a hidden temp file in the target
//! directory and is then moved into place without overwriting anything.
//! An existing `photo.png` makes the save land on `photo (1).png`.

use super::encoder::{OutputFormat, WatermarkedImage};
use super::DownloadError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Download target configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory downloads are saved into. Downloads are unavailable if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

/// `watermarked-<unix millis>.<ext>`, the name used when the caller gives none.
pub fn default_filename(format: OutputFormat) -> String {
    format!(
        "watermarked-{}.{}",
        chrono::Utc::now().timestamp_millis(),
        format.extension()
    )
}

/// Hands a finished payload to the host's download mechanism.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Save `image` under `filename`, returning where it ended up.
    async fn download(
        &self,
        image: &WatermarkedImage,
        filename: &str,
    ) -> Result<PathBuf, DownloadError>;
}

/// Downloader for hosts with no download mechanism.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDownloader;

#[async_trait]
impl Downloader for UnavailableDownloader {
    async fn download(
        &self,
        _image: &WatermarkedImage,
        _filename: &str,
    ) -> Result<PathBuf, DownloadError> {
        Err(DownloadError::Unavailable(
            "no download directory configured".to_string(),
        ))
    }
}

/// Saves downloads into a directory.
#[derive(Debug, Clone)]
pub struct FileDownloader {
    directory: PathBuf,
}

impl FileDownloader {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[async_trait]
impl Downloader for FileDownloader {
    async fn download(
        &self,
        image: &WatermarkedImage,
        filename: &str,
    ) -> Result<PathBuf, DownloadError> {
        validate_filename(filename)?;

        let directory = self.directory.clone();
        let filename = filename.to_string();
        let bytes = image.bytes().to_vec();

        tokio::task::spawn_blocking(move || {
            DownloadLink::acquire(&directory, &filename)?.trigger(&bytes)
        })
        .await
        .map_err(|e| DownloadError::Unavailable(format!("download task failed: {}", e)))?
    }
}

/// Reject names that would escape the download directory.
fn validate_filename(filename: &str) -> Result<(), DownloadError> {
    let invalid = filename.trim().is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains(['/', '\\', '\0']);
    if invalid {
        return Err(DownloadError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

/// `name (n).ext` for the n-th collision, `name.ext` for the first try.
fn candidate_name(filename: &str, attempt: u32) -> String {
    if attempt == 0 {
        return filename.to_string();
    }
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{} ({}).{}", stem, attempt, ext),
        None => format!("{} ({})", stem, attempt),
    }
}

/// A transient save target.
///
/// Holds a temp file inside the destination directory. Triggering moves it
/// into place; dropping an untriggered link deletes the temp file.
#[derive(Debug)]
pub struct DownloadLink {
    file: NamedTempFile,
    directory: PathBuf,
    filename: String,
}

impl DownloadLink {
    pub fn acquire(directory: &Path, filename: &str) -> Result<Self, DownloadError> {
        if !directory.is_dir() {
            return Err(DownloadError::Unavailable(format!(
                "{} is not a directory",
                directory.display()
            )));
        }

        let file = tempfile::Builder::new()
            .prefix(".storemark-")
            .suffix(".part")
            .tempfile_in(directory)?;

        Ok(Self {
            file,
            directory: directory.to_path_buf(),
            filename: filename.to_string(),
        })
    }

    /// Path of the temp file backing this link.
    pub fn temp_path(&self) -> &Path {
        self.file.path()
    }

    /// Write the payload and move it to its final, non-clobbering name.
    pub fn trigger(self, bytes: &[u8]) -> Result<PathBuf, DownloadError> {
        let DownloadLink {
            mut file,
            directory,
            filename,
        } = self;

        file.write_all(bytes)?;
        file.as_file().sync_all()?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let target = directory.join(candidate_name(&filename, attempt));
            match file.persist_noclobber(&target) {
                Ok(_) => return Ok(target),
                Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => file = e.file,
                Err(e) => return Err(DownloadError::Io(e.error)),
            }
        }

        Err(DownloadError::Unavailable(format!(
            "too many existing files named like '{}'",
            filename
        )))
    }
}
