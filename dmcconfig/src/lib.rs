//! # dmcconfig - configuration loading
//!
//! Loads `config.json` into typed structures. The config directory is
//! resolved in order:
//!
//! 1. an explicit directory passed to [`Config::find_and_load`]
//! 2. the `DMCONTROL_CONFIG` environment variable
//! 3. the current working directory
//!
//! ## Example
//!
//! ```no_run
//! use dmcconfig::Config;
//!
//! let config = Config::find_and_load("")?;
//! println!("HTTP port: {}", config.webserver_port);
//! # Ok::<(), dmcconfig::ConfigError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::info;

const ENV_CONFIG_DIR: &str = "DMCONTROL_CONFIG";
const CONFIG_FILE_NAME: &str = "config.json";

const DEFAULT_WEBSERVER_PORT: u16 = 8080;
const DEFAULT_REQUESTED_COUNT: u32 = 200;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// A configured renderer entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Primary friendly name.
    pub name: String,

    /// Alternate names matched by the dispatcher.
    #[serde(default)]
    pub aliases: Vec<String>,

    /// AVTransport control URL.
    pub url: String,

    /// MAC address for Wake-on-LAN.
    #[serde(default)]
    pub mac: Option<String>,

    /// Declared capabilities, any of "audio", "video", "image".
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Include DIDL metadata on SetAVTransportURI.
    #[serde(default = "default_send_metadata")]
    pub send_metadata: bool,
}

/// A configured media server entry. The controller uses the first one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaServerConfig {
    /// ContentDirectory control URL.
    pub url: String,

    /// RequestedCount sent with ContentDirectory Search.
    #[serde(default = "default_requested_count")]
    pub requested_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub players: Vec<PlayerConfig>,

    #[serde(default)]
    pub media_servers: Vec<MediaServerConfig>,

    #[serde(default = "default_webserver_port")]
    pub webserver_port: u16,

    #[serde(default)]
    pub webserver_cors_allow: bool,
}

fn default_send_metadata() -> bool {
    true
}

fn default_requested_count() -> u32 {
    DEFAULT_REQUESTED_COUNT
}

fn default_webserver_port() -> u16 {
    DEFAULT_WEBSERVER_PORT
}

impl Config {
    /// Parses a configuration from a JSON string and validates it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let path_display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path_display.clone(),
            source,
        })?;

        let config: Config =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path_display.clone(),
                source,
            })?;
        config.validate()?;

        info!(path = %path_display, "configuration loaded");
        Ok(config)
    }

    /// Resolves the config directory and loads `config.json` from it.
    pub fn find_and_load(directory: &str) -> Result<Self, ConfigError> {
        let dir = Self::find_config_dir(directory);
        Self::load(&dir.join(CONFIG_FILE_NAME))
    }

    fn find_config_dir(directory: &str) -> PathBuf {
        if !directory.is_empty() {
            return PathBuf::from(directory);
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "using config dir from env");
            return PathBuf::from(env_path);
        }

        PathBuf::from(".")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for player in &self.players {
            if player.name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "player entry with empty name".to_string(),
                ));
            }
            if player.url.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "player '{}' has no url",
                    player.name
                )));
            }
        }

        for server in &self.media_servers {
            if server.url.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "media server entry with empty url".to_string(),
                ));
            }
            if server.requested_count == 0 {
                return Err(ConfigError::Invalid(format!(
                    "media server '{}' has a non-positive requested_count",
                    server.url
                )));
            }
        }

        Ok(())
    }
}
