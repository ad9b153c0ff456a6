// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Server configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{MediaError, Result};

const CONFIG_DIR: &str = "mediaforge";
const CONFIG_FILE: &str = "config.json";

/// Settings for the conversion server. Every field has a default so a partial
/// JSON file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind_address: String,
    /// TCP port for the HTTP listener.
    pub port: u16,
    /// Requests with a larger body are rejected with 413.
    pub max_body_bytes: usize,
    /// Upper bound on conversions running at the same time.
    pub max_concurrent_jobs: usize,
    /// TrueType/OpenType font used for text rendering. When unset, common
    /// system locations are searched and a bitmap font is the last resort.
    pub font_path: Option<PathBuf>,
    /// Directory holding `text-detection.rten` and `text-recognition.rten`.
    pub ocr_model_dir: Option<PathBuf>,
    /// Directory holding the Pdfium shared library; the system path is
    /// searched when unset.
    pub pdfium_library_dir: Option<PathBuf>,
    /// Value for `Access-Control-Allow-Origin`; CORS is off when unset.
    pub cors_allow_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".into(),
            port: 3000,
            max_body_bytes: 50 * 1024 * 1024,
            max_concurrent_jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            font_path: None,
            ocr_model_dir: None,
            pdfium_library_dir: None,
            cors_allow_origin: None,
        }
    }
}

impl ServerConfig {
    /// Read a config file. A missing file yields the defaults; a malformed
    /// one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        info!(path = %path.display(), "configuration loaded");
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `MEDIAFORGE_BIND` and `MEDIAFORGE_PORT` on top of file values.
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(
            std::env::var("MEDIAFORGE_BIND").ok(),
            std::env::var("MEDIAFORGE_PORT").ok(),
        );
        self
    }

    fn apply_overrides(&mut self, bind: Option<String>, port: Option<String>) {
        if let Some(bind) = bind.filter(|b| !b.trim().is_empty()) {
            self.bind_address = bind.trim().to_string();
        }
        if let Some(port) = port {
            match port.trim().parse::<u16>() {
                Ok(p) => self.port = p,
                Err(_) => warn!(value = %port, "ignoring unparsable MEDIAFORGE_PORT"),
            }
        }
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_body_bytes == 0 {
            return Err(MediaError::invalid("max_body_bytes must be greater than zero"));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(MediaError::invalid(
                "max_concurrent_jobs must be greater than zero",
            ));
        }
        Ok(())
    }

    /// `bind_address:port` as a string suitable for `TcpListener::bind`.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

/// Default config file location: `$XDG_CONFIG_HOME/mediaforge/config.json`,
/// falling back to `~/.config/mediaforge/config.json`.
pub fn default_config_path() -> PathBuf {
    let base = if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg)
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config")
    } else {
        PathBuf::from(".")
    };
    base.join(CONFIG_DIR).join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"port": 8088, "cors_allow_origin": "*"}"#).unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.port, 8088);
        assert_eq!(config.cors_allow_origin.as_deref(), Some("*"));
        assert_eq!(config.bind_address, "127.0.0.1");
        assert_eq!(config.max_body_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = ServerConfig {
            port: 9999,
            font_path: Some(PathBuf::from("/fonts/DejaVuSans.ttf")),
            ..ServerConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(ServerConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            ServerConfig::load(&path),
            Err(MediaError::Serialization(_))
        ));
    }

    #[test]
    fn zero_limits_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"max_concurrent_jobs": 0}"#).unwrap();
        assert!(ServerConfig::load(&path).is_err());
    }

    #[test]
    fn overrides_replace_bind_and_port() {
        let mut config = ServerConfig::default();
        config.apply_overrides(Some("0.0.0.0".into()), Some("8080".into()));
        assert_eq!(config.listen_address(), "0.0.0.0:8080");
    }

    #[test]
    fn bad_port_override_is_ignored() {
        let mut config = ServerConfig::default();
        config.apply_overrides(None, Some("eighty".into()));
        assert_eq!(config.port, 3000);
    }
}
