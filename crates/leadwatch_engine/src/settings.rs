use std::time::Duration;

use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub base_url: Url,
    pub auth_token: Option<String>,
    /// Cadence of the status and results pollers.
    pub poll_interval: Duration,
    /// Timeout of a routine status or results poll.
    pub poll_timeout: Duration,
    /// Timeout of an on-demand full results fetch; result sets can be large.
    pub results_timeout: Duration,
    pub connect_timeout: Duration,
    /// Extra attempts the results poller makes after a transient failure.
    pub results_retry_limit: u32,
    pub results_retry_backoff: Duration,
    /// Upper bound for a CSV download.
    pub max_download_bytes: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_API_URL).expect("default api url is valid"),
            auth_token: None,
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(30),
            results_timeout: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(10),
            results_retry_limit: 3,
            results_retry_backoff: Duration::from_secs(2),
            max_download_bytes: 256 * 1024 * 1024,
        }
    }
}

impl WatchSettings {
    pub fn with_base_url(base_url: Url) -> Self {
        Self {
            base_url,
            ..Self::default()
        }
    }
}
