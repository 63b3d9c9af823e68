//! Loading of the relay settings from `RelayConfig.json`.
//! A missing file is fine and yields the defaults, a broken one is a startup error.

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;
use tokio::fs;

/// The file we read when `RELAY_CONFIG` does not point somewhere else.
pub const DEFAULT_CONFIG_FILE: &str = "RelayConfig.json";

/// The settings of the relay.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Address and port the http / websocket listener binds to.
    pub bind_address: String,
    /// Amount of characters of a generated room id.
    pub room_id_length: usize,
    /// Directory with static files served on all other routes.
    pub static_dir: String,
    /// Interval of the dead room sweep.
    pub sweep_interval_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        RelayConfig {
            bind_address: "0.0.0.0:3000".to_string(),
            room_id_length: 6,
            static_dir: ".".to_string(),
            sweep_interval_secs: 1200,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid bind address {0}")]
    InvalidAddress(String),
    #[error("room id length must be between 4 and 32, got {0}")]
    InvalidRoomIdLength(usize),
    #[error("sweep interval must not be zero")]
    InvalidSweepInterval,
}

impl RelayConfig {
    /// Parses the bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.bind_address.clone()))
    }

    /// Parses and checks a configuration text.
    pub fn from_json(json_content: &str) -> Result<Self, ConfigError> {
        let config: RelayConfig = serde_json::from_str(json_content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if !(4..=32).contains(&self.room_id_length) {
            return Err(ConfigError::InvalidRoomIdLength(self.room_id_length));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidSweepInterval);
        }
        Ok(())
    }
}

/// Loads the configuration file. If it does not exist, the defaults are used.
pub async fn load_config(path: impl AsRef<Path>) -> Result<RelayConfig, ConfigError> {
    let path = path.as_ref();
    match fs::read_to_string(path).await {
        Ok(json_content) => RelayConfig::from_json(&json_content),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "No config file found, using defaults.");
            Ok(RelayConfig::default())
        }
        Err(source) => Err(ConfigError::Read {
            path: path.display().to_string(),
            source,
        }),
    }
}
