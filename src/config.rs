// src/config.rs
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_ORIGIN: &str = "http://localhost";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PREVIEW_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub preview_timeout: Duration,
    pub upload_timeout: Duration,
    pub poll_interval: Duration,
    pub download_dir: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: REQUEST_TIMEOUT,
            preview_timeout: PREVIEW_TIMEOUT,
            upload_timeout: UPLOAD_TIMEOUT,
            poll_interval: POLL_INTERVAL,
            download_dir: PathBuf::from("."),
        }
    }
}

impl DashboardConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves the configuration from an arbitrary key lookup.
    ///
    /// An explicit `PEOPLE_COUNTER_API_URL` wins. Otherwise production
    /// (`PEOPLE_COUNTER_ENV=production`) goes through the same-origin `/api`
    /// proxy and everything else talks to the backend directly.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let production = non_empty("PEOPLE_COUNTER_ENV")
            .map(|env| env.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let api_base_url = match non_empty("PEOPLE_COUNTER_API_URL") {
            Some(url) => url,
            None if production => {
                let origin =
                    non_empty("PEOPLE_COUNTER_ORIGIN").unwrap_or_else(|| DEFAULT_ORIGIN.into());
                format!("{}/api", origin.trim_end_matches('/'))
            }
            None => DEFAULT_API_URL.to_string(),
        };

        let download_dir = non_empty("PEOPLE_COUNTER_DOWNLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            download_dir,
            ..Self::default()
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}
