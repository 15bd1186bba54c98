//! Persistent settings.
//!
//! Resolution order for every value: command-line flag, then environment
//! variable (both handled by clap), then `settings.json`, then the built-in
//! default.

use std::fs;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::metadata::PKG_NAME;
use crate::source::rest::DEFAULT_API_URL;

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8090";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// REST backend base URL.
    pub api_url: String,
    /// Skip the backend and serve from the fallback store only.
    pub offline: bool,
    /// Simulated latency of the fallback store, in milliseconds.
    pub mock_delay_ms: u64,
    /// Where the fallback store is persisted between runs. Unset keeps it
    /// in memory only.
    pub store_file: Option<PathBuf>,
    /// Bind address of the streamable HTTP transport.
    pub http_addr: String,
    pub enable_stdio: bool,
    pub enable_http: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            offline: false,
            mock_delay_ms: 0,
            store_file: None,
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            enable_stdio: true,
            enable_http: false,
        }
    }
}

/// Values given on the command line or through the environment.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub offline: Option<bool>,
    pub mock_delay_ms: Option<u64>,
    pub store_file: Option<PathBuf>,
    pub http_addr: Option<String>,
    pub enable_stdio: Option<bool>,
    pub enable_http: Option<bool>,
}

impl Settings {
    /// `<config dir>/taskdesk/settings.json`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(PKG_NAME).join(SETTINGS_FILE))
    }

    /// Read settings from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> ServiceResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No settings file, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| {
            ServiceError::Config(format!("Invalid settings file '{}': {e}", path.display()))
        })
    }

    /// Persist through a temporary file and an atomic rename.
    pub fn save(&self, path: &Path) -> ServiceResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp = path.with_extension("tmp");
        let mut f = fs::File::create(&temp)?;
        f.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;
        f.sync_all()?;
        fs::rename(temp, path)?;
        Ok(())
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(api_url) = overrides.api_url {
            self.api_url = api_url;
        }
        if let Some(offline) = overrides.offline {
            self.offline = offline;
        }
        if let Some(delay) = overrides.mock_delay_ms {
            self.mock_delay_ms = delay;
        }
        if overrides.store_file.is_some() {
            self.store_file = overrides.store_file;
        }
        if let Some(addr) = overrides.http_addr {
            self.http_addr = addr;
        }
        if let Some(enable) = overrides.enable_stdio {
            self.enable_stdio = enable;
        }
        if let Some(enable) = overrides.enable_http {
            self.enable_http = enable;
        }
        self
    }

    pub fn validate(&self) -> ServiceResult<()> {
        if !self.offline && self.api_url.trim().is_empty() {
            return Err(ServiceError::Config(
                "apiUrl cannot be empty unless offline mode is on".to_string(),
            ));
        }
        if self.enable_http {
            self.http_addr.parse::<SocketAddr>().map_err(|e| {
                ServiceError::Config(format!("Invalid http address '{}': {e}", self.http_addr))
            })?;
        }
        Ok(())
    }

    pub fn validate_for_serve(&self) -> ServiceResult<()> {
        self.validate()?;
        if !self.enable_stdio && !self.enable_http {
            return Err(ServiceError::Config(
                "Enable at least one transport (stdio or http)".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.api_url, "http://localhost:8080");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, r#"{ "apiUrl": "http://tasks.internal:9000", "mockDelayMs": 500 }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.api_url, "http://tasks.internal:9000");
        assert_eq!(settings.mock_delay_ms, 500);
        assert!(!settings.offline);
        assert_eq!(settings.http_addr, DEFAULT_HTTP_ADDR);
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(ServiceError::Config(_))));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);
        let settings = Settings {
            offline: true,
            store_file: Some(dir.path().join("store.json")),
            ..Settings::default()
        };
        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn overrides_win_over_file_values() {
        let file = Settings {
            api_url: "http://from-file".into(),
            mock_delay_ms: 250,
            ..Settings::default()
        };
        let merged = file.apply(Overrides {
            api_url: Some("http://from-flag".into()),
            offline: Some(true),
            ..Overrides::default()
        });
        assert_eq!(merged.api_url, "http://from-flag");
        assert!(merged.offline);
        assert_eq!(merged.mock_delay_ms, 250);
    }

    #[test]
    fn serve_needs_a_transport_and_a_valid_address() {
        let none = Settings {
            enable_stdio: false,
            enable_http: false,
            ..Settings::default()
        };
        assert!(none.validate_for_serve().is_err());

        let bad_addr = Settings {
            enable_http: true,
            http_addr: "not-an-addr".into(),
            ..Settings::default()
        };
        assert!(bad_addr.validate().is_err());
        assert!(Settings::default().validate_for_serve().is_ok());
    }
}
