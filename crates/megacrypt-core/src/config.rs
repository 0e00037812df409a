use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MegaError, MegaResult};

/// Top-level configuration (loaded from megacrypt.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MegaConfig {
    pub log: LogConfig,
    pub stream: StreamConfig,
    pub keys: KeysConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Buffer sizing for the cipher streams
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Internal decrypt buffer in bytes (default: 65536)
    pub decrypt_buffer_size: usize,
    /// Request size used when copying a stream to a file (default: 65536)
    pub read_buffer_size: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Account master key, URL-safe base64 (16 bytes once decoded)
    pub master_key: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            decrypt_buffer_size: 65536,
            read_buffer_size: 65536,
        }
    }
}

impl MegaConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> MegaResult<Self> {
        if !path.exists() {
            tracing::debug!("config file not found: {} (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| MegaError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the streams cannot work with.
    pub fn validate(&self) -> MegaResult<()> {
        if self.stream.decrypt_buffer_size == 0 {
            return Err(MegaError::Config(
                "stream.decrypt_buffer_size must be greater than zero".into(),
            ));
        }
        if self.stream.read_buffer_size == 0 {
            return Err(MegaError::Config(
                "stream.read_buffer_size must be greater than zero".into(),
            ));
        }
        match self.log.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(MegaError::Config(format!(
                "log.format must be \"json\" or \"text\", got {other:?}"
            ))),
        }
    }
}
