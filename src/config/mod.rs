//! Configuration management for Plugboard
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use plugboard::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Disabled features: {:?}", config.features.entries());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `PLUGBOARD__<section>__<key>`
//!
//! Examples:
//! - `PLUGBOARD__FEATURES__DISABLED=UserMenu_Badges,UserMenu_Grades:account`
//! - `PLUGBOARD__EVENTS__CHANNEL_CAPACITY=128`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/plugboard.toml`.
//! This can be overridden using the `PLUGBOARD_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{Config, EventsConfig, FeaturesConfig};
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
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables (`PLUGBOARD__*`)
    /// 2. TOML file (default: `config/plugboard.toml`)
    /// 3. Default values
    ///
    /// # Errors
    ///
    /// Returns an error if the file is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
