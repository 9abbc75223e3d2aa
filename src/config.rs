//! Server configuration
//!
//! Load order, later sources win:
//! 1. built-in defaults
//! 2. TOML file named by `CHAT_SERVER_CONFIG`
//! 3. `CHAT_BIND_ADDR` / `CHAT_MAX_FRAME_LEN` environment variables
//! 4. bind address passed in by the caller (the binary's first argument)

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::ConfigError;
use crate::framer::DEFAULT_MAX_FRAME_LEN;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:12345";

/// Channel buffer size for server commands
pub const DEFAULT_COMMAND_BUFFER: usize = 256;

/// Server settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,
    /// Longest accepted frame in bytes
    pub max_frame_len: usize,
    /// Capacity of the connection → ChatServer channel
    pub command_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

impl ServerConfig {
    /// Load from all sources
    ///
    /// `bind_override` wins over every other source of the bind address.
    pub fn load(bind_override: Option<String>) -> Result<Self, ConfigError> {
        let mut config = match std::env::var("CHAT_SERVER_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        config.apply_overrides(
            std::env::var("CHAT_BIND_ADDR").ok(),
            std::env::var("CHAT_MAX_FRAME_LEN").ok(),
        )?;

        if let Some(addr) = bind_override {
            config.bind_addr = addr;
        }

        info!("Configuration loaded: {:?}", config);
        Ok(config)
    }

    /// Read a TOML file; missing keys keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_frame_len == 0 {
            return Err(ConfigError::Invalid {
                field: "max_frame_len",
            });
        }
        if self.command_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "command_buffer",
            });
        }
        Ok(())
    }

    fn apply_overrides(
        &mut self,
        bind_addr: Option<String>,
        max_frame_len: Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(addr) = bind_addr {
            self.bind_addr = addr;
        }
        if let Some(value) = max_frame_len {
            self.max_frame_len = match value.parse() {
                Ok(len) if len > 0 => len,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        name: "CHAT_MAX_FRAME_LEN",
                        value,
                    })
                }
            };
        }
        Ok(())
    }
}
