use sea_orm::ConnectOptions;
use std::time::Duration;
use tracing::log::LevelFilter;

#[cfg(feature = "config")]
use core_config::{env_or_default, env_required, ConfigError, FromEnv};

/// PostgreSQL connection pool configuration.
///
/// Construct manually or load from environment variables (with the
/// `config` feature).
#[derive(Clone, Debug)]
pub struct PostgresConfig {
    /// Database connection URL (required)
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,

    /// Enable SQL query logging
    pub sqlx_logging: bool,
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 50,
            min_connections: 5,
            connect_timeout_secs: 8,
            acquire_timeout_secs: 8,
            sqlx_logging: true,
        }
    }

    pub fn with_pool_size(mut self, max_connections: u32, min_connections: u32) -> Self {
        self.max_connections = max_connections;
        self.min_connections = min_connections;
        self
    }

    /// Convert this config into SeaORM ConnectOptions.
    pub fn into_connect_options(self) -> ConnectOptions {
        let mut opt = ConnectOptions::new(&self.url);
        opt.max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .sqlx_logging(self.sqlx_logging)
            .sqlx_logging_level(LevelFilter::Debug);
        opt
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Load PostgresConfig from environment variables.
///
/// - `DATABASE_URL` (required)
/// - `DB_MAX_CONNECTIONS` (optional, default: 50)
/// - `DB_MIN_CONNECTIONS` (optional, default: 5)
#[cfg(feature = "config")]
impl FromEnv for PostgresConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = env_required("DATABASE_URL")?;

        let max_connections = env_or_default("DB_MAX_CONNECTIONS", "50")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "DB_MAX_CONNECTIONS".to_string(),
                details: format!("{}", e),
            })?;

        let min_connections = env_or_default("DB_MIN_CONNECTIONS", "5")
            .parse()
            .map_err(|e| ConfigError::ParseError {
                key: "DB_MIN_CONNECTIONS".to_string(),
                details: format!("{}", e),
            })?;

        Ok(Self {
            url,
            max_connections,
            min_connections,
            connect_timeout_secs: 8,
            acquire_timeout_secs: 8,
            sqlx_logging: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_config_new() {
        let config = PostgresConfig::new("postgresql://localhost/portal");
        assert_eq!(config.url, "postgresql://localhost/portal");
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.min_connections, 5);
    }

    #[test]
    fn test_postgres_config_with_pool_size() {
        let config = PostgresConfig::new("postgresql://localhost/portal").with_pool_size(20, 2);
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 2);
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_postgres_config_from_env_minimal() {
        temp_env::with_var("DATABASE_URL", Some("postgresql://localhost/portal"), || {
            let config = PostgresConfig::from_env().unwrap();
            assert_eq!(config.url, "postgresql://localhost/portal");
            assert_eq!(config.max_connections, 50);
        });
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_postgres_config_from_env_missing_url() {
        temp_env::with_var_unset("DATABASE_URL", || {
            let err = PostgresConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("DATABASE_URL"));
        });
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_postgres_config_from_env_invalid_number() {
        temp_env::with_vars(
            [
                ("DATABASE_URL", Some("postgresql://localhost/portal")),
                ("DB_MAX_CONNECTIONS", Some("invalid")),
            ],
            || {
                let err = PostgresConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("DB_MAX_CONNECTIONS"));
            },
        );
    }
}
