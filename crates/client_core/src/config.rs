use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

pub const SETTINGS_FILE: &str = "board_client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub request_timeout_ms: u64,
    pub capture_banner_ms: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
            request_timeout_ms: 10_000,
            capture_banner_ms: 1_600,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn capture_banner_duration(&self) -> Duration {
        Duration::from_millis(self.capture_banner_ms)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    server_url: Option<String>,
    request_timeout_ms: Option<u64>,
    capture_banner_ms: Option<u64>,
    log_filter: Option<String>,
}

/// Defaults, then `board_client.toml` if present, then environment.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
        let file_cfg: FileSettings = toml::from_str(&raw)
            .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;
        if let Some(v) = file_cfg.server_url {
            settings.server_url = v;
        }
        if let Some(v) = file_cfg.request_timeout_ms {
            settings.request_timeout_ms = v;
        }
        if let Some(v) = file_cfg.capture_banner_ms {
            settings.capture_banner_ms = v;
        }
        if let Some(v) = file_cfg.log_filter {
            settings.log_filter = v;
        }
    }

    if let Some(v) = env("BOARD_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = env("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_MS") {
        settings.request_timeout_ms = parse_millis("APP__REQUEST_TIMEOUT_MS", &v)?;
    }
    if let Some(v) = env("APP__CAPTURE_BANNER_MS") {
        settings.capture_banner_ms = parse_millis("APP__CAPTURE_BANNER_MS", &v)?;
    }

    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    settings.server_url = normalize_server_url(&settings.server_url)?;
    if settings.request_timeout_ms == 0 {
        bail!("request_timeout_ms must be greater than zero");
    }

    Ok(settings)
}

/// Validates an http(s) base URL and strips any trailing slash.
pub fn normalize_server_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let parsed =
        Url::parse(trimmed).with_context(|| format!("invalid game server url '{trimmed}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!(
            "game server url '{trimmed}' must use http or https, not '{}'",
            parsed.scheme()
        );
    }
    Ok(trim_server_url(trimmed))
}

pub(crate) fn trim_server_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

fn parse_millis(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .with_context(|| format!("{key} must be a whole number of milliseconds, got '{raw}'"))
}
