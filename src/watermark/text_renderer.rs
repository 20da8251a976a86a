//! Text watermark rendering.
//!
//! This module rasterizes watermark text to an RGBA layer that the
//! compositor blends onto the target image.
//!
//! # Features
//!
//! - CSS-like color parsing (`#RGB`, `#RRGGBB`, `#RRGGBBAA`, `rgb()`, names)
//! - Font lookup by family through [`FontBook`], with per-character
//!   fallback across the family list
//! - A [`TextRasterizer`] seam so compositing can be exercised without fonts
//!
//! Text is drawn at full strength. The configured opacity is applied once,
//! when the layer is blended.
//!
//! # Example
//!
//! ```ignore
//! use storemark::watermark::text_renderer::{
//!     parse_color, GlyphRasterizer, TextRasterizer, TextStyle,
//! };
//!
//! let rasterizer = GlyphRasterizer::new(FontBook::new(&FontConfig::default()));
//! let layer = rasterizer.rasterize(&TextStyle {
//!     text: "© Shop".to_string(),
//!     font_size_px: 48.0,
//!     font_family: "sans-serif".to_string(),
//!     color: parse_color("#fff")?,
//! })?;
//! ```

use super::fonts::FontBook;
use super::WatermarkError;
use ab_glyph::{Font, FontArc, GlyphId, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};

/// Parsed RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn with_alpha(mut self, a: u8) -> Self {
        self.a = a;
        self
    }

    /// White color.
    pub fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Black color.
    pub fn black() -> Self {
        Self::new(0, 0, 0)
    }
}

const NAMED_COLORS: &[(&str, Color)] = &[
    ("white", Color { r: 255, g: 255, b: 255, a: 255 }),
    ("black", Color { r: 0, g: 0, b: 0, a: 255 }),
    ("red", Color { r: 255, g: 0, b: 0, a: 255 }),
    ("green", Color { r: 0, g: 128, b: 0, a: 255 }),
    ("blue", Color { r: 0, g: 0, b: 255, a: 255 }),
    ("yellow", Color { r: 255, g: 255, b: 0, a: 255 }),
    ("orange", Color { r: 255, g: 165, b: 0, a: 255 }),
    ("gray", Color { r: 128, g: 128, b: 128, a: 255 }),
    ("grey", Color { r: 128, g: 128, b: 128, a: 255 }),
    ("silver", Color { r: 192, g: 192, b: 192, a: 255 }),
];

fn hex_digit_pair(hex: &str) -> Result<u8, WatermarkError> {
    u8::from_str_radix(hex, 16)
        .map_err(|_| WatermarkError::render(format!("invalid hex digits '{}'", hex)))
}

fn parse_hex(hex: &str) -> Result<Color, WatermarkError> {
    if !hex.is_ascii() {
        return Err(WatermarkError::render(format!("invalid hex color '#{}'", hex)));
    }

    match hex.len() {
        3 => {
            // #RGB - each digit doubled: 0xF -> 0xFF
            let r = hex_digit_pair(&hex[0..1])?;
            let g = hex_digit_pair(&hex[1..2])?;
            let b = hex_digit_pair(&hex[2..3])?;
            Ok(Color::new(r * 17, g * 17, b * 17))
        }
        6 | 8 => {
            let r = hex_digit_pair(&hex[0..2])?;
            let g = hex_digit_pair(&hex[2..4])?;
            let b = hex_digit_pair(&hex[4..6])?;
            let color = Color::new(r, g, b);
            if hex.len() == 8 {
                Ok(color.with_alpha(hex_digit_pair(&hex[6..8])?))
            } else {
                Ok(color)
            }
        }
        n => Err(WatermarkError::render(format!(
            "color must be #RGB, #RRGGBB or #RRGGBBAA, got {} digits",
            n
        ))),
    }
}

fn parse_rgb_function(args: &str, with_alpha: bool) -> Result<Color, WatermarkError> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let expected = if with_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return Err(WatermarkError::render(format!(
            "expected {} color components, got {}",
            expected,
            parts.len()
        )));
    }

    let channel = |s: &str| {
        s.parse::<u8>()
            .map_err(|_| WatermarkError::render(format!("invalid color channel '{}'", s)))
    };
    let color = Color::new(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?);

    if with_alpha {
        let alpha: f32 = parts[3]
            .parse()
            .map_err(|_| WatermarkError::render(format!("invalid alpha '{}'", parts[3])))?;
        if !(0.0..=1.0).contains(&alpha) {
            return Err(WatermarkError::render(format!("alpha out of range: {}", alpha)));
        }
        Ok(color.with_alpha((alpha * 255.0).round() as u8))
    } else {
        Ok(color)
    }
}

/// Parse a CSS-like color string.
///
/// # Examples
///
/// ```
/// use storemark::watermark::text_renderer::{parse_color, Color};
///
/// assert_eq!(parse_color("#fff").unwrap(), Color::white());
/// assert_eq!(parse_color("rgb(255, 0, 0)").unwrap(), Color::new(255, 0, 0));
/// ```
pub fn parse_color(spec: &str) -> Result<Color, WatermarkError> {
    let spec = spec.trim();

    if let Some(hex) = spec.strip_prefix('#') {
        return parse_hex(hex);
    }

    let lower = spec.to_ascii_lowercase();
    if let Some(args) = lower
        .strip_prefix("rgba(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_function(args, true);
    }
    if let Some(args) = lower
        .strip_prefix("rgb(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb_function(args, false);
    }

    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, color)| *color)
        .ok_or_else(|| WatermarkError::render(format!("unsupported color '{}'", spec)))
}

/// What to draw: text, font and color, without placement or opacity.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub text: String,
    pub font_size_px: f32,
    pub font_family: String,
    pub color: Color,
}

/// Backend that turns styled text into a transparent RGBA layer.
pub trait TextRasterizer: Send + Sync {
    fn rasterize(&self, style: &TextStyle) -> Result<RgbaImage, WatermarkError>;
}

/// Rasterizer backed by installed fonts and `ab_glyph`.
#[derive(Debug)]
pub struct GlyphRasterizer {
    fonts: FontBook,
}

impl GlyphRasterizer {
    pub fn new(fonts: FontBook) -> Self {
        Self { fonts }
    }
}

impl TextRasterizer for GlyphRasterizer {
    fn rasterize(&self, style: &TextStyle) -> Result<RgbaImage, WatermarkError> {
        let fonts = self.fonts.resolve_all(&style.font_family)?;
        render_text_with_fallback(&fonts, style)
    }
}

/// Largest text layer, in pixels, that rendering will allocate.
pub const MAX_LAYER_PIXELS: u64 = 64 * 1024 * 1024;

/// Index of the first font with a real glyph for `c`, or 0 when none has one.
pub fn select_font(fonts: &[FontArc], c: char) -> usize {
    fonts
        .iter()
        .position(|font| font.glyph_id(c).0 != 0)
        .unwrap_or(0)
}

struct PlacedGlyph {
    font: usize,
    id: GlyphId,
    x: f32,
}

struct TextLayout {
    glyphs: Vec<PlacedGlyph>,
    width: f32,
    ascent: f32,
    height: f32,
}

impl TextLayout {
    fn size(&self) -> (u32, u32) {
        let padding = 2;
        (
            (self.width.ceil() as u32).saturating_add(padding),
            (self.height.ceil() as u32).saturating_add(padding),
        )
    }
}

// `fonts` must not be empty; the first entry sets the baseline.
fn layout_text(fonts: &[FontArc], text: &str, scale: PxScale) -> TextLayout {
    let primary = fonts[0].as_scaled(scale);
    let mut ascent = primary.ascent();
    let mut descent = primary.descent();

    let mut glyphs = Vec::with_capacity(text.len());
    let mut cursor_x = 0.0f32;
    let mut prev: Option<(usize, GlyphId)> = None;

    for c in text.chars() {
        let font = select_font(fonts, c);
        let scaled = fonts[font].as_scaled(scale);
        let id = scaled.glyph_id(c);

        // Kerning pairs only exist within one face
        if let Some((prev_font, prev_id)) = prev {
            if prev_font == font {
                cursor_x += scaled.kern(prev_id, id);
            }
        }

        glyphs.push(PlacedGlyph { font, id, x: cursor_x });
        cursor_x += scaled.h_advance(id);
        ascent = ascent.max(scaled.ascent());
        descent = descent.min(scaled.descent());
        prev = Some((font, id));
    }

    TextLayout {
        glyphs,
        width: cursor_x,
        ascent,
        height: ascent - descent,
    }
}

/// Calculate the dimensions of rendered text.
///
/// Returns (width, height) in pixels.
pub fn measure_text(font: &FontArc, text: &str, font_size: f32) -> (u32, u32) {
    layout_text(std::slice::from_ref(font), text, PxScale::from(font_size)).size()
}

/// Render text to a transparent RGBA image with the given font.
pub fn render_text(font: &FontArc, style: &TextStyle) -> Result<RgbaImage, WatermarkError> {
    render_text_with_fallback(std::slice::from_ref(font), style)
}

/// Render text, drawing each character with the first font in `fonts`
/// that has a glyph for it.
///
/// # Errors
///
/// Returns `WatermarkError::Render` for empty text, a bad size, an empty
/// font list, or a layer larger than [`MAX_LAYER_PIXELS`].
pub fn render_text_with_fallback(
    fonts: &[FontArc],
    style: &TextStyle,
) -> Result<RgbaImage, WatermarkError> {
    if style.text.is_empty() {
        return Err(WatermarkError::render("cannot render empty text"));
    }
    if !style.font_size_px.is_finite() || style.font_size_px <= 0.0 {
        return Err(WatermarkError::render(format!(
            "invalid font size {}",
            style.font_size_px
        )));
    }
    if fonts.is_empty() {
        return Err(WatermarkError::render("no font available to render text"));
    }

    let scale = PxScale::from(style.font_size_px);
    let layout = layout_text(fonts, &style.text, scale);

    let (width, height) = layout.size();
    let (canvas_width, canvas_height) = (width.max(1), height.max(1));
    if u64::from(canvas_width) * u64::from(canvas_height) > MAX_LAYER_PIXELS {
        return Err(WatermarkError::render(format!(
            "watermark text layer {}x{} exceeds {} pixels",
            canvas_width, canvas_height, MAX_LAYER_PIXELS
        )));
    }
    let mut image = RgbaImage::new(canvas_width, canvas_height);

    for placed in &layout.glyphs {
        let font = &fonts[placed.font];
        let glyph = placed
            .id
            .with_scale_and_position(scale, ab_glyph::point(placed.x, layout.ascent));

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();

            outlined.draw(|px, py, coverage| {
                let x = px as i32 + bounds.min.x as i32;
                let y = py as i32 + bounds.min.y as i32;

                if x >= 0 && y >= 0 && x < canvas_width as i32 && y < canvas_height as i32 {
                    let pixel_alpha = (coverage.clamp(0.0, 1.0) * style.color.a as f32) as u8;
                    let pixel = Rgba([style.color.r, style.color.g, style.color.b, pixel_alpha]);

                    // Overlapping glyph edges (anti-aliasing) accumulate
                    let existing = image.get_pixel(x as u32, y as u32);
                    let blended = blend_pixels(*existing, pixel);
                    image.put_pixel(x as u32, y as u32, blended);
                }
            });
        }
    }

    Ok(image)
}

/// Blend two RGBA pixels using alpha compositing.
fn blend_pixels(bottom: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    let top_alpha = top[3] as f32 / 255.0;
    let bottom_alpha = bottom[3] as f32 / 255.0;

    let out_alpha = top_alpha + bottom_alpha * (1.0 - top_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |t: u8, b: u8| -> u8 {
        let t = t as f32 / 255.0;
        let b = b as f32 / 255.0;
        let result = (t * top_alpha + b * bottom_alpha * (1.0 - top_alpha)) / out_alpha;
        (result * 255.0).clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend(top[0], bottom[0]),
        blend(top[1], bottom[1]),
        blend(top[2], bottom[2]),
        (out_alpha * 255.0) as u8,
    ])
}
