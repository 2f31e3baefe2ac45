//! Server configuration loaded from TOML, the environment and CLI flags.

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use strictly_nim::{
    DpStrategy, GameStore, NewGame, RandomStrategy, SolutionCache, StrategyProvider, TurnEngine,
};
use tracing::{debug, info, instrument};

/// File read when no config path is given and it exists in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "strictly_nim.toml";

/// Configuration for the game server and the local client.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_", strip_option)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_host")]
    host: String,

    /// Port to bind to.
    #[serde(default = "default_port")]
    port: u16,

    /// SQLite database file. Games are kept in memory when unset.
    #[serde(default)]
    database_path: Option<String>,

    /// Heap size for new games that do not specify one.
    #[serde(default = "default_heap_size")]
    default_heap_size: i64,

    /// Legal moves for new games that do not specify any.
    #[serde(default = "default_legal_moves")]
    default_legal_moves: Vec<i64>,

    /// Strategy for new games that do not specify one.
    #[serde(default = "default_strategy")]
    default_strategy: String,

    /// Number of games whose DP solution is kept.
    #[serde(default = "default_dp_cache_capacity")]
    dp_cache_capacity: usize,

    /// Seed for the random strategy; unseeded when unset.
    #[serde(default)]
    random_seed: Option<u64>,

    /// Largest opening heap a game may request.
    #[serde(default = "default_max_heap_size")]
    max_heap_size: u32,
}

#[instrument]
fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[instrument]
fn default_port() -> u16 {
    3000
}

#[instrument]
fn default_heap_size() -> i64 {
    NewGame::DEFAULT_HEAP_SIZE
}

#[instrument]
fn default_legal_moves() -> Vec<i64> {
    NewGame::default_legal_moves()
}

#[instrument]
fn default_strategy() -> String {
    NewGame::DEFAULT_STRATEGY.to_string()
}

#[instrument]
fn default_dp_cache_capacity() -> usize {
    SolutionCache::DEFAULT_CAPACITY
}

#[instrument]
fn default_max_heap_size() -> u32 {
    TurnEngine::DEFAULT_MAX_HEAP_SIZE
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: None,
            default_heap_size: default_heap_size(),
            default_legal_moves: default_legal_moves(),
            default_strategy: default_strategy(),
            dp_cache_capacity: default_dp_cache_capacity(),
            random_seed: None,
            max_heap_size: default_max_heap_size(),
        }
    }
}

impl ServerConfig {
    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the text is not a valid config.
    #[instrument(skip(content))]
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_toml(&content)?;
        info!(host = %config.host, port = config.port, "Config loaded successfully");
        Ok(config)
    }

    /// Loads `path` if given, else [`DEFAULT_CONFIG_FILE`] if present, else
    /// defaults; then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a file is chosen but cannot be loaded, or an
    /// environment override does not parse.
    #[instrument(skip(path))]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => {
                debug!("No config file, using defaults");
                Self::default()
            }
        };
        config.apply_env()
    }

    /// Applies `PORT` and `DATABASE_PATH` from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `PORT` is not a valid port.
    #[instrument(skip(self))]
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        let mut config = self;
        if let Ok(port) = std::env::var("PORT") {
            let port = port
                .parse::<u16>()
                .map_err(|e| ConfigError::new(format!("Invalid PORT '{}': {}", port, e)))?;
            debug!(port, "Port overridden from environment");
            config = config.with_port(port);
        }
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            debug!(path = %path, "Database path overridden from environment");
            config = config.with_database_path(path);
        }
        Ok(config)
    }

    /// Creation parameters used for fields a request leaves out.
    pub fn new_game_defaults(&self) -> NewGame {
        NewGame {
            heap_size: self.default_heap_size,
            legal_moves: self.default_legal_moves.clone(),
            strategy: self.default_strategy.clone(),
        }
    }

    /// Builds the strategy provider described by this config.
    #[instrument(skip(self), fields(capacity = self.dp_cache_capacity, seeded = self.random_seed.is_some()))]
    pub fn strategy_provider(&self) -> StrategyProvider {
        let random = match self.random_seed {
            Some(seed) => {
                info!(seed, "Random strategy is seeded, games are reproducible");
                RandomStrategy::seeded(seed)
            }
            None => RandomStrategy::new(),
        };
        StrategyProvider::with_strategies(random, DpStrategy::new(self.dp_cache_capacity))
    }

    /// Builds a turn engine over `store` with this config's strategies and limits.
    #[instrument(skip(self, store), fields(max_heap_size = self.max_heap_size))]
    pub fn engine(&self, store: Arc<dyn GameStore>) -> TurnEngine {
        TurnEngine::new(store, self.strategy_provider()).with_max_heap_size(self.max_heap_size)
    }

    /// Socket address string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
