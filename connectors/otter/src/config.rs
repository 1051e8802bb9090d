use anyhow::{anyhow, Context, Result};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_OTTER_API_BASE_URL: &str = "https://otter.ai/forward/api/v1";
pub const CSRF_COOKIE_NAME: &str = "csrftoken";
pub const CSRF_HEADER_NAME: &str = "x-csrftoken";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_ALLOWED_ORIGIN: &str = "https://roamresearch.com";
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;
pub const FORWARD_PATH: &str = "/extensions/otter/speeches";
pub const USER_AGENT: &str = "otter-connector/0.1";

#[derive(Clone)]
pub struct OtterConnectorConfig {
    pub port: u16,
    pub api_base_url: String,
    pub page_size: u32,
    pub allowed_origin: String,
    pub http_timeout: Duration,
    /// Base64 AES-256 key. Sealed passwords are rejected when absent.
    pub encryption_key: Option<String>,
}

impl Default for OtterConnectorConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            api_base_url: DEFAULT_OTTER_API_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            allowed_origin: DEFAULT_ALLOWED_ORIGIN.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS),
            encryption_key: None,
        }
    }
}

impl fmt::Debug for OtterConnectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtterConnectorConfig")
            .field("port", &self.port)
            .field("api_base_url", &self.api_base_url)
            .field("page_size", &self.page_size)
            .field("allowed_origin", &self.allowed_origin)
            .field("http_timeout", &self.http_timeout)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl OtterConnectorConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let port = match std::env::var("PORT") {
            Ok(v) => v.parse::<u16>().context("PORT must be a valid port number")?,
            Err(_) => defaults.port,
        };

        let api_base_url = std::env::var("OTTER_API_BASE_URL")
            .map(|v| normalize_base_url(&v))
            .unwrap_or_else(|_| Ok(defaults.api_base_url.clone()))?;

        let page_size = match std::env::var("OTTER_PAGE_SIZE") {
            Ok(v) => v
                .parse::<u32>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| anyhow!("OTTER_PAGE_SIZE must be a positive integer, got {}", v))?,
            Err(_) => defaults.page_size,
        };

        let allowed_origin =
            std::env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| defaults.allowed_origin.clone());

        let http_timeout = match std::env::var("OTTER_HTTP_TIMEOUT_SECONDS") {
            Ok(v) => Duration::from_secs(
                v.parse::<u64>()
                    .context("OTTER_HTTP_TIMEOUT_SECONDS must be a number of seconds")?,
            ),
            Err(_) => defaults.http_timeout,
        };

        let encryption_key = std::env::var("OTTER_ENCRYPTION_KEY")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Ok(Self {
            port,
            api_base_url,
            page_size,
            allowed_origin,
            http_timeout,
            encryption_key,
        })
    }
}

/// Validates the upstream URL and strips the trailing slash so paths can be
/// appended with `format!("{}/login", base)`.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let parsed = url::Url::parse(raw.trim())
        .with_context(|| format!("Invalid upstream base URL: {}", raw))?;
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}
