//! Configuration loading
//!
//! Config is resolved in layers:
//! 1. An explicit path (`--config`), if it exists
//! 2. The override file in the data dir (~/.local/share/cloak/config.toml)
//! 3. Embedded defaults (compiled into binary)
//!
//! `CLOAK_DB_PATH` replaces `database.path` from whichever file was used.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::db::DEFAULT_POOL_SIZE;
use crate::error::{Error, Result};
use crate::models::AiProvider;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/cloak.toml");

/// Environment variable overriding the database path
pub const DB_PATH_ENV: &str = "CLOAK_DB_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "cloak.db".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// How records are prepared for AI providers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnonymizeConfig {
    pub include_category: bool,
    pub provider: AiProvider,
}

impl Default for AnonymizeConfig {
    fn default() -> Self {
        Self {
            include_category: true,
            provider: AiProvider::OpenRouter,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub database: DatabaseConfig,
    pub anonymize: AnonymizeConfig,
}

impl Config {
    /// Load config from `path`, the data dir override, or the embedded defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let source = path
            .filter(|p| p.exists())
            .map(Path::to_path_buf)
            .or_else(|| default_config_path().filter(|p| p.exists()));

        let content = match &source {
            Some(p) => {
                debug!("Loading config from {}", p.display());
                fs::read_to_string(p)
                    .map_err(|e| Error::InvalidData(format!("Failed to read config: {}", e)))?
            }
            None => DEFAULT_CONFIG.to_string(),
        };

        let config = parse_config(&content)?;
        Ok(config.with_db_path_override(std::env::var(DB_PATH_ENV).ok()))
    }

    /// Replace the database path when an override is set and non-empty
    pub fn with_db_path_override(mut self, path: Option<String>) -> Self {
        if let Some(p) = path.filter(|p| !p.is_empty()) {
            self.database.path = p;
        }
        self
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("cloak").join("config.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    database: Option<RawDatabase>,
    anonymize: Option<RawAnonymize>,
}

#[derive(Debug, Deserialize)]
struct RawDatabase {
    path: Option<String>,
    pool_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawAnonymize {
    include_category: Option<bool>,
    provider: Option<String>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<Config> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::InvalidData(format!("Invalid config TOML: {}", e)))?;

    let mut config = Config::default();

    if let Some(database) = raw.database {
        if let Some(path) = database.path {
            config.database.path = path;
        }
        if let Some(pool_size) = database.pool_size {
            if pool_size == 0 {
                return Err(Error::InvalidData(
                    "database.pool_size must be at least 1".to_string(),
                ));
            }
            config.database.pool_size = pool_size;
        }
    }

    if let Some(anonymize) = raw.anonymize {
        if let Some(include) = anonymize.include_category {
            config.anonymize.include_category = include;
        }
        if let Some(provider) = anonymize.provider {
            config.anonymize.provider = provider.parse().map_err(Error::InvalidData)?;
        }
    }

    Ok(config)
}
