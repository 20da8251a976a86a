// Text rendering with installed system fonts
// Skipped when the machine has no usable sans-serif font.

use image::{Rgba, RgbaImage};
use std::sync::Arc;
use storemark::watermark::{
    encode, measure_text, render_text, Color, FetchConfig, FontBook, FontConfig, GlyphRasterizer,
    HttpImageLoader, OutputConfig, TextStyle, WatermarkOptions, WatermarkPipeline,
};

fn installed_fonts() -> Option<FontBook> {
    let book = FontBook::new(&FontConfig::default());
    match book.resolve("sans-serif") {
        Ok(_) => Some(book),
        Err(e) => {
            eprintln!("Skipping: {}", e);
            None
        }
    }
}

fn style(text: &str) -> TextStyle {
    TextStyle {
        text: text.to_string(),
        font_size_px: 32.0,
        font_family: "sans-serif".to_string(),
        color: Color::white(),
    }
}

#[test]
fn test_rendered_text_has_visible_glyphs() {
    let Some(book) = installed_fonts() else {
        return;
    };
    let font = book.resolve("sans-serif").unwrap();

    let layer = render_text(&font, &style("Watermark")).unwrap();

    assert!(layer.width() > layer.height());
    assert!(layer.pixels().any(|p| p[3] > 0));
    assert!(layer.pixels().any(|p| p[3] == 0));
}

#[test]
fn test_longer_text_measures_wider() {
    let Some(book) = installed_fonts() else {
        return;
    };
    let font = book.resolve("sans-serif").unwrap();

    let (short, _) = measure_text(&font, "ab", 24.0);
    let (long, _) = measure_text(&font, "abcdefgh", 24.0);
    assert!(long > short);
}

#[tokio::test]
async fn test_pipeline_with_system_fonts_changes_corner() {
    let Some(book) = installed_fonts() else {
        return;
    };
    let source = RgbaImage::from_pixel(400, 200, Rgba([0, 0, 0, 255]));
    let data_uri = encode(&source, &OutputConfig::default())
        .unwrap()
        .into_data_uri();

    let pipeline = WatermarkPipeline::new(
        Arc::new(HttpImageLoader::new(&FetchConfig::default()).unwrap()),
        Arc::new(GlyphRasterizer::new(book)),
    );
    let options = WatermarkOptions::new()
        .with_text("SHOP")
        .with_font_family("sans-serif")
        .with_opacity(1.0);

    let image = pipeline.watermark_image(&data_uri, &options).await.unwrap();
    let pixels = image.decode().unwrap().to_rgba8();

    let lower_right_lit = (200..400)
        .flat_map(|x| (100..200).map(move |y| (x, y)))
        .any(|(x, y)| pixels.get_pixel(x, y)[0] > 0);
    let upper_left_lit = (0..100)
        .flat_map(|x| (0..50).map(move |y| (x, y)))
        .any(|(x, y)| pixels.get_pixel(x, y)[0] > 0);
    assert!(lower_right_lit);
    assert!(!upper_left_lit);
}
