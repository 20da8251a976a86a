//! Client for the storefront's read-only REST endpoints.
//!
//! Covers the calls the listing pages make: carousel banners, the CODM
//! account listing and a single account's details. The account's `images`
//! are what the `listing` command feeds into the watermark batch.

use crate::config::ApiConfig;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    #[error("API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status} for {url}")]
    Status { status: u16, url: String },

    #[error("Failed to decode API response: {0}")]
    Decode(String),
}

/// Listing state of an account (`1` listed, `2` unlisted).
pub const STATUS_LISTED: i64 = 1;
pub const STATUS_UNLISTED: i64 = 2;

/// A game account offered in the storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodmAccount {
    pub id: u64,
    pub serial_number: String,
    #[serde(default)]
    pub images: Vec<String>,
    pub price: f64,
    pub title: String,
    #[serde(default)]
    pub describe: String,
    #[serde(default)]
    pub xianyu_url: String,
    #[serde(default)]
    pub email: String,
    pub status: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl CodmAccount {
    pub fn is_listed(&self) -> bool {
        self.status == STATUS_LISTED
    }
}

/// Filters for the account listing. Unset fields are left out of the query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct StorefrontClient {
    http_client: Client,
    base_url: Url,
}

impl StorefrontClient {
    /// Build a client. Endpoint paths are appended to `base_url`, so a
    /// prefix such as `https://host/backend` is kept.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;

        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            http_client: builder.build()?,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /api/carousels/name/{name}`
    pub async fn get_carousel(&self, name: &str) -> Result<Value, ApiError> {
        let path = format!("api/carousels/name/{}", urlencoding::encode(name));
        self.get_json(&path, None).await
    }

    /// `GET /api/codm-accounts`
    pub async fn get_codm_account_list(&self, query: &AccountListQuery) -> Result<Value, ApiError> {
        self.get_json("api/codm-accounts", Some(query)).await
    }

    /// `GET /api/codm-accounts/{id}`
    pub async fn get_codm_account_info(&self, id: u64) -> Result<CodmAccount, ApiError> {
        let body = self
            .get_json(&format!("api/codm-accounts/{}", id), None)
            .await?;
        decode_account(body)
    }

    // `path` is relative to the base URL
    async fn get_json(
        &self,
        path: &str,
        query: Option<&AccountListQuery>,
    ) -> Result<Value, ApiError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))?;

        let mut request = self.http_client.get(url.clone());
        if let Some(query) = query {
            request = request.query(query);
        }

        tracing::debug!(url = %url, "Storefront API request");
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Accept a bare account object or one wrapped in `{"data": ...}`.
fn decode_account(body: Value) -> Result<CodmAccount, ApiError> {
    let inner = match body {
        Value::Object(mut map) if map.get("data").map_or(false, Value::is_object) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    serde_json::from_value(inner).map_err(|e| ApiError::Decode(e.to_string()))
}
