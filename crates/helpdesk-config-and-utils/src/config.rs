//! Configuration management for the helpdesk client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default backend base URL (local development server).
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default per-request deadline in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

const ENV_API_BASE_URL: &str = "HELPDESK_API_BASE_URL";
const ENV_LOG_LEVEL: &str = "HELPDESK_LOG_LEVEL";
const ENV_REQUEST_TIMEOUT_SECS: &str = "HELPDESK_REQUEST_TIMEOUT_SECS";

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Backend base URL, e.g. `http://127.0.0.1:8000`.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Deadline applied to every request, including token refresh.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file (if any), then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup. Blank values are ignored and
    /// an unparsable timeout keeps the current value.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = non_empty(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(level) = non_empty(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(raw) = non_empty(ENV_REQUEST_TIMEOUT_SECS) {
            match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => self.request_timeout_secs = secs,
                _ => tracing::warn!(value = %raw, "Ignoring invalid {}", ENV_REQUEST_TIMEOUT_SECS),
            }
        }
    }

    /// Get the API base URL as a parsed URL.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        let url = Url::parse(&self.api_base_url)?;
        if url.cannot_be_a_base() {
            return Err(CoreError::Config(format!(
                "API base URL cannot be a base: {}",
                self.api_base_url
            )));
        }
        Ok(url)
    }

    /// Per-request deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_config_load_from_file_fills_missing_fields() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.json");

        std::fs::write(&config_path, r#"{ "log_level": "debug" }"#).unwrap();

        let config = Config::load_from_file(&config_path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_config_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());

        let mut config = Config::default();
        config.api_base_url = "https://desk.example.com".to_string();
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.api_base_url, "https://desk.example.com");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            (ENV_API_BASE_URL, "https://api.example.com"),
            (ENV_LOG_LEVEL, "trace"),
            (ENV_REQUEST_TIMEOUT_SECS, "30"),
        ]));

        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.log_level, "trace");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_env_overrides_ignore_blank_and_invalid() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            (ENV_API_BASE_URL, "   "),
            (ENV_REQUEST_TIMEOUT_SECS, "soon"),
        ]));

        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);

        config.apply_overrides(lookup_from(&[(ENV_REQUEST_TIMEOUT_SECS, "0")]));
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
    }

    #[test]
    fn test_config_api_base_url_parse() {
        let config = Config::default();
        let url = config.api_base_url().unwrap();
        assert_eq!(url.scheme(), "http");
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.port(), Some(8000));
    }

    #[test]
    fn test_config_invalid_url() {
        let mut config = Config::default();
        config.api_base_url = "not a valid url".to_string();
        assert!(matches!(
            config.api_base_url(),
            Err(CoreError::InvalidUrl(_))
        ));

        config.api_base_url = "mailto:desk@example.com".to_string();
        assert!(matches!(config.api_base_url(), Err(CoreError::Config(_))));
    }
}
