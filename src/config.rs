use crate::engine::ThresholdTable;
use crate::error::EngineError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub data: Option<DataSection>,
    #[serde(default)]
    pub models: Option<ModelsSection>,
    #[serde(default)]
    pub thresholds: ThresholdTable,
    #[serde(default)]
    pub auth: Option<AuthSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataSection {
    /// JSON dataset with `stations` and `health_records`
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsSection {
    pub air_quality: Option<PathBuf>,
    pub activity: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSection {
    /// Shared bearer token; unset or empty leaves the API open.
    pub token: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid thresholds: {0}")]
    Thresholds(#[from] EngineError),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    config.thresholds.validate()?;
    Ok(config)
}

fn non_empty_path(path: Option<&Path>) -> Option<&Path> {
    path.filter(|path| !path.as_os_str().is_empty())
}

impl Config {
    pub fn dataset_path(&self) -> Option<&Path> {
        non_empty_path(self.data.as_ref()?.path.as_deref())
    }

    pub fn air_quality_model_path(&self) -> Option<&Path> {
        non_empty_path(self.models.as_ref()?.air_quality.as_deref())
    }

    pub fn activity_model_path(&self) -> Option<&Path> {
        non_empty_path(self.models.as_ref()?.activity.as_deref())
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.auth
            .as_ref()?
            .token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Max log level; unrecognised names fall back to INFO.
    pub fn log_level(&self) -> Level {
        self.logging.level.trim().parse().unwrap_or(Level::INFO)
    }
}
