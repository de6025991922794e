use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_DIR: &str = "taxwiz";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid configuration in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Runtime settings, read from `<config_dir>/taxwiz/config.json` and the
/// `TAXWIZ_*` environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_base_url: Option<String>,
    pub request_timeout_ms: u64,
    pub download_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".into(),
            download_base_url: None,
            request_timeout_ms: 10_000,
            download_dir: PathBuf::from("."),
            data_dir: dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from(".").join(APP_DIR)),
        }
    }
}

impl AppConfig {
    /// Loads the config file (if any) and applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match dirs::config_dir() {
            Some(dir) => Self::from_file(&dir.join(APP_DIR).join(CONFIG_FILE))?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Reads settings from `path`; a missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(url) = lookup("TAXWIZ_API_URL") {
            self.api_base_url = url;
        }
        if let Some(url) = lookup("TAXWIZ_DOWNLOAD_URL") {
            self.download_base_url = Some(url);
        }
        if let Some(dir) = lookup("TAXWIZ_DOWNLOAD_DIR") {
            self.download_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("TAXWIZ_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn download_base_url(&self) -> &str {
        self.download_base_url.as_deref().unwrap_or(&self.api_base_url)
    }

    /// Absolute URL of a download link returned by the service.
    pub fn download_url(&self, link_url: &str) -> String {
        format!("{}{}", self.download_base_url().trim_end_matches('/'), link_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::from_file(&dir.path().join("config.json")).unwrap();

        assert_eq!(config.api_base_url, "http://localhost:3000");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.download_base_url(), "http://localhost:3000");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "api_base_url": "https://tax.example.com", "request_timeout_ms": 2500 }"#).unwrap();

        let config = AppConfig::from_file(&path).unwrap();

        assert_eq!(config.api_base_url, "https://tax.example.com");
        assert_eq!(config.request_timeout_ms, 2500);
        assert_eq!(config.download_dir, PathBuf::from("."));
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "api_base_url = 1").unwrap();

        assert!(matches!(AppConfig::from_file(&path), Err(ConfigError::Json { .. })));
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TAXWIZ_API_URL", "https://api.example.com"),
            ("TAXWIZ_DOWNLOAD_URL", "https://files.example.com/"),
            ("TAXWIZ_DOWNLOAD_DIR", "/tmp/forms"),
            ("TAXWIZ_DATA_DIR", "   "),
        ]);
        let mut config = AppConfig::default();
        let data_dir = config.data_dir.clone();

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_base_url, "https://api.example.com");
        assert_eq!(config.download_dir, PathBuf::from("/tmp/forms"));
        assert_eq!(config.data_dir, data_dir);
        assert_eq!(
            config.download_url("/pdf/ca-540.pdf"),
            "https://files.example.com/pdf/ca-540.pdf"
        );
    }
}
