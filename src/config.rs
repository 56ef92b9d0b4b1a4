//! Configuration for the ledger node

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "COIN_LEDGER_CONFIG";

/// Used when `COIN_LEDGER_CONFIG` is unset
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Number of hex characters in a block hash, the highest usable difficulty
pub const MAX_DIFFICULTY: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub storage: StorageConfig,
    pub ramp: RampConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// The only origin allowed by CORS
    pub client_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            client_url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Leading zero hex characters required in a block hash
    pub difficulty: usize,
    pub mining_reward: f64,
    /// Abort sealing after this many milliseconds; unbounded when unset
    pub mining_deadline_ms: Option<u64>,
}

impl ChainConfig {
    pub fn mining_deadline(&self) -> Option<Duration> {
        self.mining_deadline_ms.map(Duration::from_millis)
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: 4,
            mining_reward: 2.0,
            mining_deadline_ms: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub chain_path: PathBuf,
    pub wallet_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            chain_path: PathBuf::from("data/blockchain.json"),
            wallet_path: PathBuf::from("data/wallets.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RampConfig {
    /// Coins credited per US dollar
    pub coin_per_usd: f64,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self { coin_per_usd: 0.1 }
    }
}

impl Config {
    /// Loads the file named by `COIN_LEDGER_CONFIG`, or `config.toml`
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        Self::from_path(&path)
    }

    /// Loads a TOML file; a missing file means all defaults
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let config = match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents).map_err(|e| match e {
                ConfigError::Parse { source, .. } => ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                },
                other => other,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("No configuration at {}, using defaults", path.display());
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.difficulty > MAX_DIFFICULTY {
            return Err(ConfigError::Invalid(format!(
                "chain.difficulty must be at most {}, got {}",
                MAX_DIFFICULTY, self.chain.difficulty
            )));
        }

        if !self.chain.mining_reward.is_finite() || self.chain.mining_reward < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "chain.mining_reward must be a non-negative number, got {}",
                self.chain.mining_reward
            )));
        }

        if !self.ramp.coin_per_usd.is_finite() || self.ramp.coin_per_usd <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "ramp.coin_per_usd must be positive, got {}",
                self.ramp.coin_per_usd
            )));
        }

        if self.storage.chain_path.as_os_str().is_empty() || self.storage.wallet_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("storage paths must be set".to_string()));
        }

        Ok(())
    }
}
