//! Configuration management for the rental inventory backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (config/development.toml, config/production.toml)
//! 3. Environment variable overrides with RENTAL__ prefix

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Sequential ID allocator configuration
    pub id_manager: IdManagerConfig,

    /// Log output configuration
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

/// Which sequence store backs the allocator
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    /// Process-local store, only safe for a single server process
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,

    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,

    /// Apply pending migrations on startup
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdManagerConfig {
    /// Reserved prefix allocated and deleted by the health check
    pub health_check_prefix: String,

    pub retry: RetryConfig,
}

/// Bounded retry with exponential backoff around ID allocation
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay before retry `n` is `base_delay_ms * backoff_factor^(n-1)`
    pub backoff_factor: f64,

    pub base_delay_ms: u64,

    /// Upper bound for a single attempt, lock waits included
    pub attempt_timeout_ms: u64,
}

impl RetryConfig {
    /// Delay to sleep after the failed attempt `attempt` (zero-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let millis = self.base_delay_ms as f64 * self.backoff_factor.powi(attempt as i32);
        Duration::from_millis(millis as u64)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: 2.0,
            base_delay_ms: 1000,
            attempt_timeout_ms: 5000,
        }
    }
}

/// Log line format
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LogConfig {
    pub format: LogFormat,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("RENTAL__ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 8000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.backend", "postgres")?
            .set_default("database.url", "postgres://localhost/rental")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.run_migrations", environment == "development")?
            .set_default("id_manager.health_check_prefix", "_HEALTH_CHECK_")?
            .set_default("id_manager.retry.max_attempts", 3)?
            .set_default("id_manager.retry.backoff_factor", 2.0)?
            .set_default("id_manager.retry.base_delay_ms", 1000)?
            .set_default("id_manager.retry.attempt_timeout_ms", 5000)?
            .set_default("log.format", "pretty")?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (RENTAL__ prefix)
            .add_source(
                Environment::with_prefix("RENTAL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for IdManagerConfig {
    fn default() -> Self {
        Self {
            health_check_prefix: "_HEALTH_CHECK_".to_string(),
            retry: RetryConfig::default(),
        }
    }
}
