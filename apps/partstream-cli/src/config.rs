//! CLI configuration.
//!
//! Read from `partstream.toml` in the working directory, or from the file
//! given by `--config` / `PARTSTREAM_CONFIG`. A missing file means defaults.

use std::path::{Path, PathBuf};

use partstream_transfer::TransferConfig;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "partstream.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory the filesystem store keeps containers in.
    #[serde(default = "default_store_root")]
    pub store_root: PathBuf,

    /// `User-Agent` sent with every source request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub transfer: TransferConfig,
}

fn default_store_root() -> PathBuf {
    PathBuf::from("./store")
}

fn default_user_agent() -> String {
    format!("partstream/{}", env!("CARGO_PKG_VERSION"))
}

fn default_connect_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: default_store_root(),
            user_agent: default_user_agent(),
            connect_timeout_secs: default_connect_timeout_secs(),
            transfer: TransferConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration at `path`, falling back to defaults when
    /// the file does not exist.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.transfer.validate()?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}
