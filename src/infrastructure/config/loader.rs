use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Archive root cannot be empty")]
    EmptyArchiveRoot,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid session ttl_minutes: {0}. Must be at least 1")]
    InvalidSessionTtl(u32),

    #[error("Invalid archive max_attempts: {0}. Cannot be 0")]
    InvalidMaxAttempts(u32),

    #[error("Invalid sync lease_seconds: {0}. Must be at least 1")]
    InvalidLeaseSeconds(u32),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .appraise/config.yaml (project config)
    /// 3. .appraise/local.yaml (local overrides, optional)
    /// 4. Environment variables (APPRAISE_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".appraise/config.yaml"))
            .merge(Yaml::file(".appraise/local.yaml"))
            .merge(Env::prefixed("APPRAISE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("APPRAISE_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(ConfigError::InvalidLogLevel(other.to_string())),
        }

        match config.logging.format.as_str() {
            "json" | "pretty" => {}
            other => return Err(ConfigError::InvalidLogFormat(other.to_string())),
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }
        if config.session.ttl_minutes == 0 {
            return Err(ConfigError::InvalidSessionTtl(config.session.ttl_minutes));
        }
        if config.archive.root.is_empty() {
            return Err(ConfigError::EmptyArchiveRoot);
        }
        if config.archive.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.archive.max_attempts));
        }
        if config.sync.lease_seconds == 0 {
            return Err(ConfigError::InvalidLeaseSeconds(config.sync.lease_seconds));
        }

        Ok(())
    }
}
