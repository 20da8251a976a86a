// Configuration and option parsing through the public API

use storemark::config::{Config, LogFormat};
use storemark::watermark::{
    FontSize, OutputFormat, WatermarkConfig, WatermarkOptions, WatermarkPosition,
};

#[test]
fn test_can_deserialize_full_yaml_config() {
    let yaml = r##"
watermark:
  text: "© Example"
  position: center
  font_size: 36pt
  font_family: "Noto Sans CJK SC, sans-serif"
  color: "rgba(0, 0, 0, 0.8)"
  opacity: 0.3
  margin: 24
fetch:
  base_url: "https://shop.example.com"
  user_agent: "listing-bot/1.0"
  cache_max_entries: 100
  cache_ttl_seconds: 60
batch:
  max_concurrency: 8
output:
  format: png
fonts:
  families:
    Brand: /opt/fonts/Brand.ttf
  search_dirs:
    - /opt/fonts
download:
  directory: /var/lib/storemark/downloads
api:
  base_url: "https://api.example.com"
  timeout_seconds: 15
logging:
  level: "storemark=debug"
  format: json
"##;

    let config = Config::from_yaml_with_env(yaml).unwrap();
    config.validate().unwrap();

    assert_eq!(config.watermark.position, WatermarkPosition::Center);
    assert!((config.watermark.font_size_px().unwrap() - 48.0).abs() < 1e-3);
    assert_eq!(config.fetch.user_agent, "listing-bot/1.0");
    assert_eq!(config.fetch.cache_max_entries, 100);
    assert_eq!(config.batch.max_concurrency, Some(8));
    assert_eq!(config.output.format, OutputFormat::Png);
    assert_eq!(config.fonts.families.len(), 1);
    assert_eq!(config.fonts.search_dirs.len(), 1);
    assert_eq!(config.api.timeout_seconds, Some(15));
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_partial_watermark_section_keeps_other_defaults() {
    let config = Config::from_yaml_with_env("watermark:\n  opacity: 0.9\n").unwrap();

    assert_eq!(config.watermark.opacity, 0.9);
    assert_eq!(config.watermark.margin, 10);
    assert_eq!(config.watermark.color, "#fff");
    assert_eq!(config.watermark.position, WatermarkPosition::LowerRight);
}

#[test]
fn test_position_keys_round_trip_through_display() {
    for position in WatermarkPosition::ALL {
        assert_eq!(position.to_string().parse::<WatermarkPosition>().unwrap(), position);
    }
}

#[test]
fn test_font_size_units() {
    assert_eq!("48px".parse::<FontSize>().unwrap().px(), 48.0);
    assert_eq!("30".parse::<FontSize>().unwrap().px(), 30.0);
    assert!(("12pt".parse::<FontSize>().unwrap().px() - 16.0).abs() < 1e-3);
    assert!("0px".parse::<FontSize>().unwrap_err().is_render_error());
    assert!("big".parse::<FontSize>().unwrap_err().is_render_error());
}

#[test]
fn test_options_resolve_over_base() {
    let base = WatermarkConfig::default();
    let resolved = WatermarkOptions::new()
        .with_position(WatermarkPosition::UpperLeft)
        .with_margin(0)
        .resolve(&base);

    assert_eq!(resolved.position, WatermarkPosition::UpperLeft);
    assert_eq!(resolved.margin, 0);
    assert_eq!(resolved.text, base.text);
    assert_eq!(resolved.opacity, base.opacity);
}

#[test]
fn test_options_deserialize_from_json() {
    let options: WatermarkOptions =
        serde_json::from_str(r#"{"text": "hi", "position": "upperRight"}"#).unwrap();
    assert_eq!(options.text.as_deref(), Some("hi"));
    assert_eq!(options.position, Some(WatermarkPosition::UpperRight));
    assert!(options.opacity.is_none());
}

#[test]
fn test_default_config_is_valid() {
    assert!(WatermarkConfig::default().validate().is_ok());
    assert!(Config::default().validate().is_ok());
}
