// HttpImageLoader against a live HTTP listener

use super::test_harness::{Response, TestServer};
use image::{Rgba, RgbaImage};
use std::sync::Arc;
use storemark::watermark::{
    FetchConfig, HttpImageLoader, ImageLoader, TextRasterizer, TextStyle, WatermarkError,
    WatermarkOptions, WatermarkPipeline,
};

struct BlockRasterizer;

impl TextRasterizer for BlockRasterizer {
    fn rasterize(&self, _style: &TextStyle) -> Result<RgbaImage, WatermarkError> {
        Ok(RgbaImage::from_pixel(6, 6, Rgba([255, 255, 255, 255])))
    }
}

fn loader(config: FetchConfig) -> HttpImageLoader {
    HttpImageLoader::new(&config).unwrap()
}

#[tokio::test]
async fn test_loads_png_over_http() {
    let server = TestServer::start(vec![("/uploads/a.png", Response::png(64, 48))]).await;

    let image = loader(FetchConfig::default())
        .load(&server.url("/uploads/a.png"))
        .await
        .unwrap();

    assert_eq!((image.width(), image.height()), (64, 48));
}

#[tokio::test]
async fn test_requests_are_anonymous() {
    let server = TestServer::start(vec![("/a.png", Response::png(4, 4))]).await;

    loader(FetchConfig::default())
        .load(&server.url("/a.png"))
        .await
        .unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let headers = &requests[0].headers;
    assert!(!headers.contains_key("cookie"));
    assert!(!headers.contains_key("authorization"));
    assert!(!headers.contains_key("referer"));
    assert!(headers
        .get("user-agent")
        .map_or(false, |ua| ua.starts_with("storemark/")));
}

#[tokio::test]
async fn test_forbidden_source_is_image_load_error() {
    let server = TestServer::start(vec![("/private.png", Response::status(403))]).await;

    let err = loader(FetchConfig::default())
        .load(&server.url("/private.png"))
        .await
        .unwrap_err();

    assert!(err.is_load_error());
    assert!(err.to_string().contains("anonymous"), "{}", err);
}

#[tokio::test]
async fn test_missing_source_is_image_load_error() {
    let server = TestServer::start(vec![]).await;

    let err = loader(FetchConfig::default())
        .load(&server.url("/nope.png"))
        .await
        .unwrap_err();

    assert!(err.is_load_error());
    assert!(err.to_string().contains("404"), "{}", err);
}

#[tokio::test]
async fn test_non_image_body_is_image_load_error() {
    let server = TestServer::start(vec![(
        "/fake.png",
        Response {
            status: 200,
            content_type: "image/png",
            body: b"<html>not an image</html>".to_vec(),
        },
    )])
    .await;

    let err = loader(FetchConfig::default())
        .load(&server.url("/fake.png"))
        .await
        .unwrap_err();
    assert!(err.is_load_error());
}

#[tokio::test]
async fn test_unreachable_host_is_image_load_error() {
    let err = loader(FetchConfig {
        timeout_seconds: Some(5),
        ..Default::default()
    })
    .load("http://127.0.0.1:1/a.png")
    .await
    .unwrap_err();

    assert!(err.is_load_error());
}

#[tokio::test]
async fn test_relative_urls_resolve_against_base_url() {
    let server = TestServer::start(vec![("/uploads/7/a.png", Response::png(9, 9))]).await;
    let loader = loader(FetchConfig {
        base_url: Some(server.base_url.clone()),
        ..Default::default()
    });

    let image = loader.load("/uploads/7/a.png").await.unwrap();

    assert_eq!(image.width(), 9);
    assert_eq!(server.requests()[0].path(), "/uploads/7/a.png");
}

#[tokio::test]
async fn test_cache_avoids_refetching() {
    let server = TestServer::start(vec![("/a.png", Response::png(5, 5))]).await;
    let loader = loader(FetchConfig {
        cache_max_entries: 16,
        ..Default::default()
    });
    let url = server.url("/a.png");

    loader.load(&url).await.unwrap();
    loader.load(&url).await.unwrap();

    assert_eq!(server.requests().len(), 1);
    assert!(loader.is_cached(&url).await);
}

#[tokio::test]
async fn test_without_cache_every_load_fetches() {
    let server = TestServer::start(vec![("/a.png", Response::png(5, 5))]).await;
    let loader = loader(FetchConfig::default());
    let url = server.url("/a.png");

    loader.load(&url).await.unwrap();
    loader.load(&url).await.unwrap();

    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_batch_over_http_preserves_order() {
    let server = TestServer::start(vec![
        ("/1.png", Response::png(11, 10)),
        ("/2.png", Response::png(22, 10)),
        ("/3.png", Response::png(33, 10)),
    ])
    .await;
    let pipeline = WatermarkPipeline::new(
        Arc::new(loader(FetchConfig::default())),
        Arc::new(BlockRasterizer),
    );
    let sources: Vec<String> = ["/1.png", "/2.png", "/3.png"]
        .iter()
        .map(|p| server.url(p))
        .collect();

    let images = pipeline
        .watermark_batch(&sources, &WatermarkOptions::default())
        .await
        .unwrap();

    let widths: Vec<u32> = images.iter().map(|i| i.width()).collect();
    assert_eq!(widths, vec![11, 22, 33]);
}

#[tokio::test]
async fn test_batch_with_one_missing_url_fails() {
    let server = TestServer::start(vec![("/1.png", Response::png(10, 10))]).await;
    let pipeline = WatermarkPipeline::new(
        Arc::new(loader(FetchConfig::default())),
        Arc::new(BlockRasterizer),
    );

    let err = pipeline
        .watermark_batch(
            &[server.url("/1.png"), server.url("/missing.png")],
            &WatermarkOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(err.is_load_error());
}
