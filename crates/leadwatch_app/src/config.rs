use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use leadwatch_engine::{WatchSettings, DEFAULT_API_URL};
use leadwatch_logging::{leadwatch_info, leadwatch_warn};
use serde::Deserialize;
use url::Url;

pub(crate) const CONFIG_FILENAME: &str = "leadwatch.ron";

/// Optional settings file, e.g.
///
/// ```ron
/// (
///     api_url: Some("https://leads.example.com"),
///     auth_token: None,
///     poll_interval_ms: Some(1500),
/// )
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct FileConfig {
    pub api_url: Option<String>,
    pub auth_token: Option<String>,
    pub poll_interval_ms: Option<u64>,
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub(crate) struct Overrides {
    pub api_url: Option<String>,
    pub auth_token: Option<String>,
}

pub(crate) fn load_file_config(path: &Path) -> FileConfig {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return FileConfig::default();
        }
        Err(err) => {
            leadwatch_warn!("Failed to read config from {:?}: {}", path, err);
            return FileConfig::default();
        }
    };

    match ron::from_str(&content) {
        Ok(config) => {
            leadwatch_info!("Loaded config from {:?}", path);
            config
        }
        Err(err) => {
            leadwatch_warn!("Failed to parse config from {:?}: {}", path, err);
            FileConfig::default()
        }
    }
}

/// Command line values win over the file; the file wins over defaults.
pub(crate) fn resolve_settings(file: FileConfig, overrides: Overrides) -> Result<WatchSettings> {
    let api_url = overrides
        .api_url
        .or(file.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let base_url =
        Url::parse(&api_url).with_context(|| format!("invalid API url {api_url:?}"))?;

    let mut settings = WatchSettings::with_base_url(base_url);
    settings.auth_token = overrides
        .auth_token
        .or(file.auth_token)
        .filter(|token| !token.is_empty());
    if let Some(ms) = file.poll_interval_ms {
        settings.poll_interval = Duration::from_millis(ms.max(100));
    }
    Ok(settings)
}
