use std::fs;

use anyhow::{anyhow, Context};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "kiosk.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    /// Preselected station; the operator can still change it in the UI.
    pub station: Option<String>,
    pub checkin_interval_ms: u64,
    /// The chat panel is simply not constructed when disabled.
    pub chat_enabled: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            station: None,
            checkin_interval_ms: 3000,
            chat_enabled: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    station: Option<String>,
    checkin_interval_ms: Option<u64>,
    chat_enabled: Option<bool>,
}

/// Defaults, then the config file (if present), then `KIOSK_*` env overrides.
pub fn load_settings(config_path: Option<&str>) -> Settings {
    let mut settings = Settings::default();

    let path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);
    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.server_url {
                    settings.server_url = v;
                }
                if let Some(v) = file_cfg.station {
                    settings.station = Some(v);
                }
                if let Some(v) = file_cfg.checkin_interval_ms {
                    settings.checkin_interval_ms = v;
                }
                if let Some(v) = file_cfg.chat_enabled {
                    settings.chat_enabled = v;
                }
            }
            Err(err) => {
                tracing::warn!("ignoring unparsable config file '{path}': {err}");
            }
        }
    }

    if let Ok(v) = std::env::var("KIOSK_SERVER_URL") {
        settings.server_url = v;
    }
    if let Ok(v) = std::env::var("KIOSK_STATION") {
        settings.station = if v.trim().is_empty() { None } else { Some(v) };
    }
    if let Ok(v) = std::env::var("KIOSK_CHECKIN_INTERVAL_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.checkin_interval_ms = parsed;
        }
    }
    if let Ok(v) = std::env::var("KIOSK_CHAT_ENABLED") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.chat_enabled = parsed;
        }
    }

    settings
}

/// Require an http(s) scheme and strip trailing slashes so endpoint paths can
/// be appended verbatim.
pub fn normalize_server_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).with_context(|| format!("invalid server url '{trimmed}'"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(anyhow!(
            "server url must use http or https, got '{}'",
            parsed.scheme()
        ));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_trailing_slashes() {
        assert_eq!(
            normalize_server_url("http://127.0.0.1:5000/").expect("normalize"),
            "http://127.0.0.1:5000"
        );
    }

    #[test]
    fn rejects_non_http_schemes() {
        let err = normalize_server_url("ftp://gate.example").expect_err("must fail");
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn rejects_bare_host_without_scheme() {
        assert!(normalize_server_url("127.0.0.1:5000").is_err());
    }

    #[test]
    fn file_settings_deserialize_partial_tables() {
        let parsed: FileSettings =
            toml::from_str("server_url = \"http://gate.local:5000\"\nchat_enabled = false\n")
                .expect("parse");
        assert_eq!(parsed.server_url.as_deref(), Some("http://gate.local:5000"));
        assert_eq!(parsed.chat_enabled, Some(false));
        assert!(parsed.station.is_none());
        assert!(parsed.checkin_interval_ms.is_none());
    }

    #[test]
    fn defaults_point_at_the_local_backend() {
        let settings = Settings::default();
        assert_eq!(settings.server_url, "http://127.0.0.1:5000");
        assert_eq!(settings.checkin_interval_ms, 3000);
        assert!(settings.chat_enabled);
    }
}
