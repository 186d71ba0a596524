//! Configuration management for hashledger

use crate::error::LedgerError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Leading zero hex characters required of a mined block hash.
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
    /// Maximum transactions per mined block.
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    #[serde(default = "default_miner_reward")]
    pub miner_reward: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            block_size: default_block_size(),
            miner_reward: default_miner_reward(),
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.difficulty == 0 || self.difficulty > 64 {
            return Err(LedgerError::Config(format!(
                "ledger.difficulty must be between 1 and 64, got {}",
                self.difficulty
            )));
        }
        if self.block_size == 0 {
            return Err(LedgerError::Config(
                "ledger.block_size must be greater than zero".to_string(),
            ));
        }
        if self.miner_reward == 0 {
            return Err(LedgerError::Config(
                "ledger.miner_reward must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    /// Per-peer timeout for chain fetches during conflict resolution.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            bootstrap_peers: Vec::new(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
        }
    }
}

impl NetworkConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

fn default_difficulty() -> usize {
    2
}

fn default_block_size() -> usize {
    10
}

fn default_miner_reward() -> u64 {
    50
}

fn default_api_port() -> u16 {
    5000
}

fn default_fetch_timeout_ms() -> u64 {
    5_000
}

/// Loads `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, LedgerError> {
    let path = path.as_ref();
    let config: Config = if path.exists() {
        let config_str = fs::read_to_string(path)?;
        toml::from_str(&config_str)?
    } else {
        Config::default()
    };

    config.ledger.validate()?;

    if config.network.fetch_timeout_ms == 0 {
        return Err(LedgerError::Config(
            "network.fetch_timeout_ms must be greater than zero".to_string(),
        ));
    }

    Ok(config)
}
