//! Configuration file loading and validation.
//!
//! The file is read once at startup. Everything that can be checked
//! without touching a device is checked here, so that a bad file fails
//! before any camera is opened.

mod camera;

pub use camera::{default_fingerprint, CameraConfig, DEFAULT_ENDPOINT, FINGERPRINT_LEN};

use crate::capture::Resolution;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Refresh interval used when the file does not set one.
pub const DEFAULT_REFRESH_RATE: u64 = 30;

/// Name of the config file looked up next to the executable.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Configuration errors. All of them are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no cameras in config")]
    NoCameras,
    #[error("camera #{index} is missing a name")]
    MissingName { index: usize },
    #[error("camera '{camera}' is missing a token")]
    MissingToken { camera: String },
    #[error("camera '{camera}' has invalid resolution '{value}'")]
    InvalidResolution { camera: String, value: String },
    #[error("refresh_rate must be at least one second")]
    InvalidRefreshRate,
}

/// Raw file layout as written by users.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FileConfig {
    /// Seconds between captures.
    #[serde(default = "default_refresh_rate")]
    pub refresh_rate: u64,
    /// Camera tables. `[[cameras]]` is accepted as well.
    #[serde(default, alias = "cameras")]
    pub camera: Vec<FileCamera>,
}

/// One `[[camera]]` table.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FileCamera {
    /// Camera name, matched against device names.
    pub name: Option<String>,
    /// Explicit device node.
    pub dev: Option<PathBuf>,
    /// Requested size as `WxH`.
    pub resolution: Option<String>,
    /// Upload endpoint.
    pub url: Option<String>,
    /// Upload token.
    pub token: Option<String>,
    /// Upload fingerprint.
    pub fingerprint: Option<String>,
}

fn default_refresh_rate() -> u64 {
    DEFAULT_REFRESH_RATE
}

impl FileConfig {
    /// Validates the raw file into a [`Config`].
    pub fn validate(self) -> Result<Config, ConfigError> {
        if self.refresh_rate == 0 {
            return Err(ConfigError::InvalidRefreshRate);
        }
        if self.camera.is_empty() {
            return Err(ConfigError::NoCameras);
        }

        let cameras = self
            .camera
            .into_iter()
            .enumerate()
            .map(|(index, camera)| camera.validate(index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Config {
            refresh_rate: Duration::from_secs(self.refresh_rate),
            cameras,
        })
    }
}

impl FileCamera {
    fn validate(self, index: usize) -> Result<CameraConfig, ConfigError> {
        let name = self.name.ok_or(ConfigError::MissingName { index })?;
        let token = self.token.ok_or_else(|| ConfigError::MissingToken {
            camera: name.clone(),
        })?;

        let resolution = self
            .resolution
            .map(|value| {
                value
                    .parse::<Resolution>()
                    .map_err(|_| ConfigError::InvalidResolution {
                        camera: name.clone(),
                        value,
                    })
            })
            .transpose()?;

        let mut config = CameraConfig::new(name, token);
        config.device = self.dev;
        config.resolution = resolution;
        if let Some(url) = self.url {
            config.endpoint = url;
        }
        if let Some(fingerprint) = self.fingerprint {
            config.fingerprint = fingerprint;
        }
        Ok(config)
    }
}

/// Validated application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Interval between capture cycles.
    pub refresh_rate: Duration,
    /// Cameras in file order.
    pub cameras: Vec<CameraConfig>,
}

impl Config {
    /// Loads and validates a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading config");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(content)?;
        file.validate()
    }

    /// `config.toml` in the directory holding the running executable.
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_default()
            .join(DEFAULT_CONFIG_FILE)
    }
}
