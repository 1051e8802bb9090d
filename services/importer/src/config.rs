use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FORWARDING_URL: &str = "http://localhost:8080/extensions/otter/speeches";
pub const DEFAULT_SETTINGS_PATH: &str = "./otter/settings.json";
pub const DEFAULT_SECRETS_PATH: &str = "./otter/secrets.json";
pub const DEFAULT_NOTES_DIR: &str = "./notes";
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct ImporterConfig {
    pub forwarding_url: String,
    pub settings_path: PathBuf,
    pub secrets_path: PathBuf,
    pub notes_dir: PathBuf,
    pub http_timeout: Duration,
    /// Enables the periodic auto-import run when set.
    pub auto_import_interval: Option<Duration>,
    pub auto_import_page_budget: Option<usize>,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            forwarding_url: DEFAULT_FORWARDING_URL.to_string(),
            settings_path: PathBuf::from(DEFAULT_SETTINGS_PATH),
            secrets_path: PathBuf::from(DEFAULT_SECRETS_PATH),
            notes_dir: PathBuf::from(DEFAULT_NOTES_DIR),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS),
            auto_import_interval: None,
            auto_import_page_budget: None,
        }
    }
}

impl ImporterConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let forwarding_url = match std::env::var("OTTER_FORWARDING_URL") {
            Ok(v) => url::Url::parse(v.trim())
                .with_context(|| format!("OTTER_FORWARDING_URL is not a valid URL: {}", v))?
                .to_string(),
            Err(_) => defaults.forwarding_url,
        };

        let path_var = |name: &str, default: PathBuf| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default)
        };

        let http_timeout = match std::env::var("IMPORTER_HTTP_TIMEOUT_SECONDS") {
            Ok(v) => Duration::from_secs(
                v.parse::<u64>()
                    .context("IMPORTER_HTTP_TIMEOUT_SECONDS must be a number of seconds")?,
            ),
            Err(_) => defaults.http_timeout,
        };

        let auto_import_interval = positive_var("AUTO_IMPORT_INTERVAL_SECONDS")?
            .map(|secs| Duration::from_secs(secs as u64));
        let auto_import_page_budget = positive_var("AUTO_IMPORT_PAGE_BUDGET")?;

        Ok(Self {
            forwarding_url,
            settings_path: path_var("IMPORTER_SETTINGS_PATH", defaults.settings_path),
            secrets_path: path_var("IMPORTER_SECRETS_PATH", defaults.secrets_path),
            notes_dir: path_var("IMPORTER_NOTES_DIR", defaults.notes_dir),
            http_timeout,
            auto_import_interval,
            auto_import_page_budget,
        })
    }
}

fn positive_var(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(v) if v.trim().is_empty() => Ok(None),
        Ok(v) => v
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(Some)
            .ok_or_else(|| anyhow!("{} must be a positive integer, got {}", name, v)),
        Err(_) => Ok(None),
    }
}
