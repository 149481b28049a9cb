use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// Per-chain overrides of `[watcher]`, keyed by decimal chain id.
    #[serde(default)]
    pub chains: HashMap<String, WatcherOverrides>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// HTTP or WebSocket RPC endpoint - overridden by env BET_WATCHER_RPC_URL
    #[serde(default = "default_rpc_url")]
    pub url: String,
}

/// Timings of a single watch session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct WatcherConfig {
    /// How long the primary subscription may stay silent before falling back.
    #[serde(default = "default_primary_timeout_ms")]
    pub primary_timeout_ms: u64,
    /// Fallback poll interval (also the subscription polling interval on HTTP).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Blocks behind the head scanned by each fallback poll.
    #[serde(default = "default_lookback_blocks")]
    pub lookback_blocks: u64,
}

/// Partial `[watcher]` table applied on top of the base for one chain.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct WatcherOverrides {
    pub primary_timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub lookback_blocks: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}
fn default_primary_timeout_ms() -> u64 {
    30_000
}
fn default_poll_interval_ms() -> u64 {
    2_500
}
fn default_lookback_blocks() -> u64 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            primary_timeout_ms: default_primary_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            lookback_blocks: default_lookback_blocks(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl WatcherConfig {
    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.primary_timeout_ms == 0 {
            return Err(ConfigError::Invalid("primary_timeout_ms must be > 0".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be > 0".into()));
        }
        if self.lookback_blocks == 0 {
            return Err(ConfigError::Invalid("lookback_blocks must be > 0".into()));
        }
        Ok(())
    }

    fn apply(mut self, overrides: &WatcherOverrides) -> Self {
        if let Some(ms) = overrides.primary_timeout_ms {
            self.primary_timeout_ms = ms;
        }
        if let Some(ms) = overrides.poll_interval_ms {
            self.poll_interval_ms = ms;
        }
        if let Some(blocks) = overrides.lookback_blocks {
            self.lookback_blocks = blocks;
        }
        self
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::parse(&contents)?;
        Ok(config.with_env_overrides())
    }

    /// Parse and validate a TOML document without touching the environment.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.watcher.validate()?;
        for (chain_id, overrides) in &config.chains {
            if chain_id.parse::<u64>().is_err() {
                return Err(ConfigError::Invalid(format!("chain id `{chain_id}` is not a number")));
            }
            config.watcher.apply(overrides).validate()?;
        }
        Ok(config)
    }

    /// Load a default config with env-only overrides (no file needed).
    pub fn from_env() -> Self {
        Config {
            rpc: RpcConfig::default(),
            watcher: WatcherConfig::default(),
            chains: HashMap::new(),
            logging: LoggingConfig::default(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("BET_WATCHER_RPC_URL") {
            self.rpc.url = url;
        }
        self
    }

    /// Base `[watcher]` timings merged with the `[chains.<id>]` overrides, if any.
    pub fn watcher_for_chain(&self, chain_id: u64) -> WatcherConfig {
        match self.chains.get(&chain_id.to_string()) {
            Some(overrides) => self.watcher.apply(overrides),
            None => self.watcher,
        }
    }
}
