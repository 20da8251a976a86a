// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::watermark::{DownloadConfig, FetchConfig, OutputConfig, WatermarkConfig};

pub use crate::watermark::FontConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Defaults applied to every watermark call
    #[serde(default)]
    pub watermark: WatermarkConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub fonts: FontConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Batch processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Upper bound on images processed at once (default: unbounded)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
}

fn default_api_base_url() -> String {
    "http://localhost:3000".to_string()
}

/// Storefront REST API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, overridden by RUST_LOG (default: info)
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // Every referenced variable must be set
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.watermark
            .validate()
            .map_err(|e| format!("Invalid watermark defaults: {}", e))?;

        if let Some(base_url) = &self.fetch.base_url {
            if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                return Err(format!(
                    "fetch.base_url must start with http:// or https://, got '{}'",
                    base_url
                ));
            }
        }

        if self.fetch.timeout_seconds == Some(0) {
            return Err("fetch.timeout_seconds must be greater than 0".to_string());
        }

        if self.batch.max_concurrency == Some(0) {
            return Err("batch.max_concurrency must be greater than 0".to_string());
        }

        self.output.validate()?;

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(format!(
                "api.base_url must start with http:// or https://, got '{}'",
                self.api.base_url
            ));
        }

        if let Some(dir) = &self.download.directory {
            if dir.as_os_str().is_empty() {
                return Err("download.directory cannot be empty".to_string());
            }
        }

        for (family, path) in &self.fonts.families {
            if family.trim().is_empty() {
                return Err(format!(
                    "fonts.families has an entry with an empty name ({})",
                    path.display()
                ));
            }
        }

        Ok(())
    }
}
