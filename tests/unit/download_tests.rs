// watermark_and_download: naming and failure reporting

use super::stubs::{harness, FailingDownloader, RecordingDownloader, StubLoader};
use std::path::PathBuf;
use std::sync::Arc;
use storemark::watermark::{
    DownloadError, FileDownloader, WatermarkError, WatermarkOptions,
};

#[tokio::test]
async fn test_default_filename_uses_current_millis() {
    let h = harness(StubLoader::new().with_image("a", 20, 20));
    let downloader = Arc::new(RecordingDownloader::default());
    let pipeline = h.pipeline.clone().with_downloader(downloader.clone());

    let before = chrono::Utc::now().timestamp_millis();
    let result = pipeline
        .watermark_and_download("a", &WatermarkOptions::default(), None)
        .await
        .unwrap();
    let after = chrono::Utc::now().timestamp_millis();

    let millis: i64 = result
        .filename
        .strip_prefix("watermarked-")
        .and_then(|rest| rest.strip_suffix(".png"))
        .and_then(|n| n.parse().ok())
        .unwrap_or_else(|| panic!("unexpected filename {}", result.filename));
    assert!(millis >= before && millis <= after);

    let saved = downloader.saved.lock();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].0, result.filename);
    assert_eq!(saved[0].1, result.image.bytes().len());
}

#[tokio::test]
async fn test_explicit_filename_is_used_verbatim() {
    let h = harness(StubLoader::new().with_image("a", 20, 20));
    let pipeline = h
        .pipeline
        .clone()
        .with_downloader(Arc::new(RecordingDownloader::default()));

    let result = pipeline
        .watermark_and_download("a", &WatermarkOptions::default(), Some("account-7.png"))
        .await
        .unwrap();

    assert_eq!(result.filename, "account-7.png");
    assert_eq!(
        result.saved.unwrap(),
        PathBuf::from("/downloads/account-7.png")
    );
}

#[tokio::test]
async fn test_download_failure_keeps_the_payload() {
    let h = harness(StubLoader::new().with_image("a", 20, 20));
    let pipeline = h.pipeline.clone().with_downloader(Arc::new(FailingDownloader));

    let result = pipeline
        .watermark_and_download("a", &WatermarkOptions::default(), Some("x.png"))
        .await
        .unwrap();

    assert!(result.image.data_uri().starts_with("data:image/png;base64,"));
    assert!(matches!(result.saved, Err(DownloadError::Io(_))));
}

#[tokio::test]
async fn test_into_result_surfaces_download_failure() {
    let h = harness(StubLoader::new().with_image("a", 20, 20));
    let pipeline = h.pipeline.clone().with_downloader(Arc::new(FailingDownloader));

    let err = pipeline
        .watermark_and_download("a", &WatermarkOptions::default(), None)
        .await
        .unwrap()
        .into_result()
        .unwrap_err();

    assert!(matches!(err, WatermarkError::Download(_)));
}

#[tokio::test]
async fn test_load_failure_skips_download() {
    let h = harness(StubLoader::new());
    let downloader = Arc::new(RecordingDownloader::default());
    let pipeline = h.pipeline.clone().with_downloader(downloader.clone());

    let err = pipeline
        .watermark_and_download("missing", &WatermarkOptions::default(), None)
        .await
        .unwrap_err();

    assert!(err.is_load_error());
    assert!(downloader.saved.lock().is_empty());
}

#[tokio::test]
async fn test_file_downloader_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let h = harness(StubLoader::new().with_image("a", 20, 20));
    let pipeline = h
        .pipeline
        .clone()
        .with_downloader(Arc::new(FileDownloader::new(dir.path())));

    let first = pipeline
        .watermark_and_download("a", &WatermarkOptions::default(), Some("listing.png"))
        .await
        .unwrap();
    let second = pipeline
        .watermark_and_download("a", &WatermarkOptions::default(), Some("listing.png"))
        .await
        .unwrap();

    let first_path = first.saved.unwrap();
    assert_eq!(first_path, dir.path().join("listing.png"));
    assert_eq!(std::fs::read(&first_path).unwrap(), first.image.bytes());
    assert_eq!(second.saved.unwrap(), dir.path().join("listing (1).png"));
}
