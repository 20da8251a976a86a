//! Watermark configuration types.
//!
//! This module defines:
//! - [`WatermarkConfig`], the fully resolved settings for one stamp
//! - [`WatermarkOptions`], the per-call overrides merged over a config
//! - [`WatermarkPosition`], the five placement keys the storefront uses
//! - [`FontSize`], the parsed form of CSS-like sizes such as `"48px"`

use super::WatermarkError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Brand stamped by default on listing images.
pub const DEFAULT_BRAND: &str = "物流骑商城";

// Default values
fn default_text() -> String {
    format!("© {}", DEFAULT_BRAND)
}

fn default_font_size() -> String {
    "48px".to_string()
}

fn default_font_family() -> String {
    "sans-serif".to_string()
}

fn default_color() -> String {
    "#fff".to_string()
}

fn default_opacity() -> f32 {
    0.5
}

fn default_margin() -> u32 {
    10
}

/// Watermark position on the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WatermarkPosition {
    #[default]
    LowerRight,
    LowerLeft,
    UpperRight,
    UpperLeft,
    Center,
}

impl WatermarkPosition {
    pub const ALL: [WatermarkPosition; 5] = [
        Self::LowerRight,
        Self::LowerLeft,
        Self::UpperRight,
        Self::UpperLeft,
        Self::Center,
    ];

    /// The camelCase key used by the storefront front-end.
    pub fn as_key(&self) -> &'static str {
        match self {
            Self::LowerRight => "lowerRight",
            Self::LowerLeft => "lowerLeft",
            Self::UpperRight => "upperRight",
            Self::UpperLeft => "upperLeft",
            Self::Center => "center",
        }
    }
}

impl fmt::Display for WatermarkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

impl FromStr for WatermarkPosition {
    type Err = WatermarkError;

    /// Accepts `lowerRight`, `lower-right`, `lower_right` and `LOWERRIGHT`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "lowerright" => Ok(Self::LowerRight),
            "lowerleft" => Ok(Self::LowerLeft),
            "upperright" => Ok(Self::UpperRight),
            "upperleft" => Ok(Self::UpperLeft),
            "center" => Ok(Self::Center),
            _ => Err(WatermarkError::render(format!(
                "unsupported watermark position '{}'",
                s
            ))),
        }
    }
}

impl TryFrom<String> for WatermarkPosition {
    type Error = WatermarkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WatermarkPosition> for String {
    fn from(position: WatermarkPosition) -> Self {
        position.as_key().to_string()
    }
}

/// Largest accepted font size, in pixels after unit conversion.
pub const MAX_FONT_SIZE_PX: f32 = 1000.0;

/// A font size resolved to pixels, at most [`MAX_FONT_SIZE_PX`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FontSize(f32);

impl FontSize {
    pub fn px(&self) -> f32 {
        self.0
    }
}

impl FromStr for FontSize {
    type Err = WatermarkError;

    /// Parses `"48px"`, `"36pt"` or a bare `"48"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (number, scale) = if let Some(n) = trimmed.strip_suffix("px") {
            (n, 1.0)
        } else if let Some(n) = trimmed.strip_suffix("pt") {
            (n, 4.0 / 3.0)
        } else {
            (trimmed, 1.0)
        };

        let value: f32 = number
            .trim()
            .parse()
            .map_err(|_| WatermarkError::render(format!("invalid font size '{}'", s)))?;

        if !value.is_finite() || value <= 0.0 {
            return Err(WatermarkError::render(format!(
                "font size must be positive, got '{}'",
                s
            )));
        }

        let px = value * scale;
        if px > MAX_FONT_SIZE_PX {
            return Err(WatermarkError::render(format!(
                "font size '{}' exceeds the {}px limit",
                s, MAX_FONT_SIZE_PX
            )));
        }

        Ok(FontSize(px))
    }
}

/// Fully resolved watermark settings.
///
/// `WatermarkConfig::default()` is the storefront's house style: the brand
/// line in white, 48px sans-serif, half opacity, lower-right corner. Each
/// field falls back to that default on its own when omitted from YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatermarkConfig {
    /// Text to stamp
    #[serde(default = "default_text")]
    pub text: String,

    /// Placement on the image (default: lowerRight)
    #[serde(default)]
    pub position: WatermarkPosition,

    /// CSS-like font size (default: "48px")
    #[serde(default = "default_font_size")]
    pub font_size: String,

    /// CSS-like font family list (default: "sans-serif")
    #[serde(default = "default_font_family")]
    pub font_family: String,

    /// Text color (default: "#fff")
    #[serde(default = "default_color")]
    pub color: String,

    /// Opacity from 0.0 (transparent) to 1.0 (opaque) (default: 0.5)
    #[serde(default = "default_opacity")]
    pub opacity: f32,

    /// Distance from the image edge in pixels (default: 10)
    #[serde(default = "default_margin")]
    pub margin: u32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            text: default_text(),
            position: WatermarkPosition::default(),
            font_size: default_font_size(),
            font_family: default_font_family(),
            color: default_color(),
            opacity: default_opacity(),
            margin: default_margin(),
        }
    }
}

impl WatermarkConfig {
    /// Check the settings before any image is fetched.
    pub fn validate(&self) -> Result<(), WatermarkError> {
        if self.text.is_empty() {
            return Err(WatermarkError::render("watermark text cannot be empty"));
        }

        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(WatermarkError::render(format!(
                "opacity must be a finite value between 0.0 and 1.0, got {}",
                self.opacity
            )));
        }

        if self.font_family.trim().is_empty() {
            return Err(WatermarkError::render("font family cannot be empty"));
        }

        self.font_size_px()?;
        super::text_renderer::parse_color(&self.color)?;

        Ok(())
    }

    pub fn font_size_px(&self) -> Result<f32, WatermarkError> {
        Ok(self.font_size.parse::<FontSize>()?.px())
    }
}

/// Per-call overrides. Unset fields take the value of the base config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatermarkOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<WatermarkPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<u32>,
}

impl WatermarkOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_position(mut self, position: WatermarkPosition) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_font_size(mut self, size: impl Into<String>) -> Self {
        self.font_size = Some(size.into());
        self
    }

    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = Some(family.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = Some(opacity);
        self
    }

    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = Some(margin);
        self
    }

    /// Merge these overrides over `base`, field by field.
    pub fn resolve(&self, base: &WatermarkConfig) -> WatermarkConfig {
        WatermarkConfig {
            text: self.text.clone().unwrap_or_else(|| base.text.clone()),
            position: self.position.unwrap_or(base.position),
            font_size: self
                .font_size
                .clone()
                .unwrap_or_else(|| base.font_size.clone()),
            font_family: self
                .font_family
                .clone()
                .unwrap_or_else(|| base.font_family.clone()),
            color: self.color.clone().unwrap_or_else(|| base.color.clone()),
            opacity: self.opacity.unwrap_or(base.opacity),
            margin: self.margin.unwrap_or(base.margin),
        }
    }
}
