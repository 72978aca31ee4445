/// Runtime settings
///
/// Loaded once at startup from a JSON file in the user's config directory:
/// - Linux: ~/.config/stellarion-studio/settings.json
/// - macOS: ~/Library/Application Support/stellarion-studio/settings.json
/// - Windows: %APPDATA%\stellarion-studio\settings.json
///
/// Missing fields fall back to defaults, then environment variables win.
/// No credential is ever compiled in: the relay holds its own key.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::upload::UploadLimits;

/// Environment override for the processing backend base URL
pub const ENV_API_URL: &str = "STELLARION_API_URL";
/// Environment override for the 3D relay base URL
pub const ENV_RELAY_URL: &str = "STELLARION_RELAY_URL";
/// Environment override for the download directory
pub const ENV_DOWNLOAD_DIR: &str = "STELLARION_DOWNLOAD_DIR";

/// Where background colors get composited
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    /// Composite in-process, no network round trip
    #[default]
    Local,
    /// Ask the processing backend (`add_bg_color=true`)
    Remote,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Processing backend (background removal, filters)
    pub api_url: String,
    /// Image-to-3D relay
    pub relay_url: String,
    /// Upload size limit in bytes (inclusive)
    pub max_upload_bytes: u64,
    /// Maximum files per batch request
    pub max_batch_files: usize,
    /// Display viewport the canvas is fitted into
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Where downloads land; `None` means the user's download directory
    pub download_dir: Option<PathBuf>,
    /// Delay between saves in "download all", per result index
    pub batch_stagger_ms: u64,
    /// Relay polling interval while a 3D model is generating
    pub poll_interval_secs: u64,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    pub background_mode: BackgroundMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            relay_url: "http://localhost:3000".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            max_batch_files: 10,
            viewport_width: 800,
            viewport_height: 600,
            download_dir: None,
            batch_stagger_ms: 200,
            poll_interval_secs: 5,
            request_timeout_secs: 300,
            background_mode: BackgroundMode::Local,
        }
    }
}

impl Settings {
    /// Load settings from disk and the process environment.
    ///
    /// A missing file is not an error. A malformed one is logged and ignored
    /// so a typo never keeps the app from starting.
    pub fn load() -> Self {
        let path = Self::settings_path();
        let mut settings = match path.as_ref().map(std::fs::read_to_string) {
            Some(Ok(json)) => match Self::from_json(&json) {
                Ok(settings) => {
                    debug!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    warn!("Ignoring malformed settings file {:?}: {}", path, e);
                    Self::default()
                }
            },
            _ => Self::default(),
        };

        settings.apply_env(|key| std::env::var(key).ok());
        settings
    }

    /// Parse from JSON; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(url) = lookup(ENV_RELAY_URL).filter(|v| !v.trim().is_empty()) {
            self.relay_url = url;
        }
        if let Some(dir) = lookup(ENV_DOWNLOAD_DIR).filter(|v| !v.trim().is_empty()) {
            self.download_dir = Some(PathBuf::from(dir));
        }
    }

    fn settings_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("stellarion-studio");
        path.push("settings.json");
        Some(path)
    }

    /// Resolved download directory
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .or_else(dirs::download_dir)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_bytes: self.max_upload_bytes,
            max_files: self.max_batch_files,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn batch_stagger(&self) -> Duration {
        Duration::from_millis(self.batch_stagger_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_backend_limits() {
        let settings = Settings::default();
        assert_eq!(settings.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(settings.max_batch_files, 10);
        assert_eq!((settings.viewport_width, settings.viewport_height), (800, 600));
        assert_eq!(settings.background_mode, BackgroundMode::Local);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = Settings::from_json(
            r#"{ "api_url": "http://gpu-box:8000", "background_mode": "remote" }"#,
        )
        .unwrap();

        assert_eq!(settings.api_url, "http://gpu-box:8000");
        assert_eq!(settings.background_mode, BackgroundMode::Remote);
        assert_eq!(settings.relay_url, Settings::default().relay_url);
        assert_eq!(settings.batch_stagger_ms, 200);
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings.apply_env(|key| match key {
            ENV_RELAY_URL => Some("http://relay.internal:3000".to_string()),
            ENV_API_URL => Some("   ".to_string()),
            ENV_DOWNLOAD_DIR => Some("/tmp/out".to_string()),
            _ => None,
        });

        assert_eq!(settings.relay_url, "http://relay.internal:3000");
        // Blank values are ignored
        assert_eq!(settings.api_url, "http://localhost:8000");
        assert_eq!(settings.download_dir(), PathBuf::from("/tmp/out"));
    }
}
