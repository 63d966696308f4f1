//! Configuration management for factorbox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables
//!
//! # Usage
//!
//! ```no_run
//! use factorbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Server listening on: {}", config.server.bind_addr);
//! ```
//!
//! # Environment Variables
//!
//! Any setting can be overridden with `FACTORBOX__<section>__<key>`:
//! - `FACTORBOX__SERVER__BIND_ADDR=0.0.0.0:9000`
//! - `FACTORBOX__WORKERS__NUM_WORKERS=16`
//! - `FACTORBOX__STORE__BACKEND=fjall`
//!
//! The flat deployment variables `WORKER_NUM`, `REDIS_HOST`, `REDIS_PORT`,
//! `REDIS_MAX_CONN` and `REDIS_PASSWORD` are applied last.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/factorbox.toml`.
//! This can be overridden using the `FACTORBOX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{
    Config, FjallConfig, RedisConfig, ServerConfig, StoreBackend, StoreConfig, WorkerConfig,
};
pub use sources::apply_deployment_env;
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - A deployment variable cannot be parsed
    /// - Validation fails (zero workers, empty host, ...)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_file(None)
    }

    /// Same layering as [`Config::load`], reading the TOML file from `path`
    /// when one is given
    pub fn load_with_file(path: Option<std::path::PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
