//! Server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener
    pub bind_addr: String,

    /// SQLite database path
    pub database_path: String,

    /// Max pooled database connections
    pub db_max_connections: u32,

    /// Card gateway base URL
    pub gateway_url: String,

    /// Card gateway secret key
    pub gateway_secret_key: String,

    /// Card gateway request timeout
    pub gateway_timeout: Duration,

    /// Currency code sent with payment intents
    pub currency: String,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = ServerConfig {
            bind_addr: env::var("MERIDIAN_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string()),

            database_path: env::var("MERIDIAN_DATABASE_PATH")
                .unwrap_or_else(|_| "meridian.db".to_string()),

            db_max_connections: env::var("MERIDIAN_DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("MERIDIAN_DB_MAX_CONNECTIONS".to_string()))?,

            gateway_url: env::var("MERIDIAN_GATEWAY_URL")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),

            gateway_secret_key: env::var("MERIDIAN_GATEWAY_SECRET_KEY").unwrap_or_else(|_| {
                // Test-mode key for development
                // In production, this MUST be set via environment variable
                "sk_test_meridian_dev".to_string()
            }),

            gateway_timeout: Duration::from_secs(
                env::var("MERIDIAN_GATEWAY_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .map_err(|_| {
                        ConfigError::InvalidValue("MERIDIAN_GATEWAY_TIMEOUT_SECS".to_string())
                    })?,
            ),

            currency: env::var("MERIDIAN_CURRENCY").unwrap_or_else(|_| "cad".to_string()),
        };

        if config.currency.len() != 3 {
            return Err(ConfigError::InvalidValue("MERIDIAN_CURRENCY".to_string()));
        }

        Ok(config)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
