//! Application configuration persisted to disk.
//!
//! Lives at `{config_dir}/qc-annotate/config.json`. Environment variables
//! override the file so a single run can point at another server:
//! - `QC_API_URL`: base URL of the QC API
//! - `QC_MAX_CANVAS_WIDTH`: render width cap in pixels

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::viewport::MAX_RENDER_WIDTH;

const APP_DIR: &str = "qc-annotate";
const CONFIG_FILE: &str = "config.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scheme, host and port of the API, without the `/api/v1` prefix.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_max_canvas_width")]
    pub max_canvas_width: f32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_max_canvas_width() -> f32 {
    MAX_RENDER_WIDTH
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            max_canvas_width: default_max_canvas_width(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE))
}

impl AppConfig {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: std::io::Error::other(e),
        })?;
        std::fs::write(path, json).map_err(write_err)
    }

    /// Load from `path`, falling back to defaults on any error. A missing file
    /// is seeded with the defaults so it can be edited later.
    pub fn load_or_default(path: &Path) -> Self {
        let config = if path.exists() {
            match Self::read(path) {
                Ok(config) => {
                    info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("{}; using defaults", e);
                    Self::default()
                }
            }
        } else {
            info!("No config file found, using defaults");
            let config = Self::default();
            if let Err(e) = config.write(path) {
                warn!("{}", e);
            }
            config
        };
        config.with_env_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var("QC_API_URL").filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(width) = var("QC_MAX_CANVAS_WIDTH") {
            match width.trim().parse::<f32>() {
                Ok(w) if w > 0.0 => self.max_canvas_width = w,
                _ => warn!("Ignoring invalid QC_MAX_CANVAS_WIDTH={:?}", width),
            }
        }
        self
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn temp_config_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("qc-annotate-test-{}-{}", name, std::process::id()))
            .join(CONFIG_FILE)
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"api_base_url": "https://qc.example.com"}"#).unwrap();
        assert_eq!(config.api_base_url, "https://qc.example.com");
        assert_eq!(config.max_canvas_width, 1200.0);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::default().with_env_overrides(|key| match key {
            "QC_API_URL" => Some(" http://10.0.0.5:9000 ".to_string()),
            "QC_MAX_CANVAS_WIDTH" => Some("960".to_string()),
            _ => None,
        });
        assert_eq!(config.api_base_url, "http://10.0.0.5:9000");
        assert_eq!(config.max_canvas_width, 960.0);
    }

    #[test]
    fn test_invalid_env_width_is_ignored() {
        let config = AppConfig::default().with_env_overrides(|key| match key {
            "QC_MAX_CANVAS_WIDTH" => Some("-3".to_string()),
            _ => None,
        });
        assert_eq!(config.max_canvas_width, 1200.0);
    }

    #[test]
    fn test_write_then_read() {
        let path = temp_config_path("roundtrip");
        let config = AppConfig {
            api_base_url: "http://qc.local".to_string(),
            max_canvas_width: 1000.0,
            request_timeout_secs: 5,
        };
        config.write(&path).unwrap();
        assert_eq!(AppConfig::read(&path).unwrap(), config);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_corrupt_file_reports_parse_error() {
        let path = temp_config_path("corrupt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert_matches!(AppConfig::read(&path), Err(ConfigError::Parse { .. }));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
