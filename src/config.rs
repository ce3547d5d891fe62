use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::nunchuk::transport::NUNCHUK_ADDRESS;

const CONFIG_DIR: &str = "nunchuk-bridge";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// What to do with a frame when the device returned fewer than six bytes
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PartialFramePolicy {
    /// Skip the sample for this cycle
    #[default]
    Drop,
    /// Decode anyway from the engine's frame buffer
    ///
    /// The buffer is de-obfuscated in place, so bytes a short read did not
    /// overwrite are the previous frame's plain bytes, scrambled once more.
    /// A failed read decodes the whole previous buffer again.
    DecodeStale,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct NunchukConfig {
    /// I2C bus number, `/dev/i2c-<bus>`
    pub bus: u8,
    pub address: u16,
    /// Optional bus timeout; unset keeps the driver's blocking behaviour
    pub bus_timeout_ms: Option<u32>,
    pub partial_frame: PartialFramePolicy,
    /// Capacity of the channel between the poll worker and the consumer
    pub event_buffer: usize,
}

impl Default for NunchukConfig {
    fn default() -> Self {
        Self {
            bus: 1,
            address: NUNCHUK_ADDRESS,
            bus_timeout_ms: None,
            partial_frame: PartialFramePolicy::Drop,
            event_buffer: 64,
        }
    }
}

impl NunchukConfig {
    pub fn default_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| {
            warn!("Could not determine config directory, using current directory");
            PathBuf::from(".")
        });
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load the config at `path`, writing the defaults there first if missing
    pub async fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if !tokio::fs::try_exists(path).await.map_err(io_err)? {
            info!("No config at {}, writing defaults", path.display());
            let config = Self::default();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
            tokio::fs::write(path, config.to_toml()?)
                .await
                .map_err(io_err)?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path).await.map_err(io_err)?;
        let config = Self::from_toml(&content)?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }
}
