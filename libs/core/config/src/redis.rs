use crate::{env_required, ConfigError, FromEnv};

/// Redis configuration
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub url: String,
}

impl RedisConfig {
    pub fn new(url: String) -> Self {
        Self { url }
    }
}

impl FromEnv for RedisConfig {
    /// Requires REDIS_URL to be set (no default)
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_required("REDIS_URL")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config_from_env_success() {
        temp_env::with_var("REDIS_URL", Some("redis://localhost:6379"), || {
            let config = RedisConfig::from_env().unwrap();
            assert_eq!(config.url, "redis://localhost:6379");
        });
    }

    #[test]
    fn test_redis_config_from_env_missing() {
        temp_env::with_var_unset("REDIS_URL", || {
            let err = RedisConfig::from_env().unwrap_err();
            assert!(err.to_string().contains("REDIS_URL"));
            assert!(err.to_string().contains("required"));
        });
    }

    #[test]
    fn test_redis_config_new() {
        let config = RedisConfig::new("redis://prod-host:6379".to_string());
        assert_eq!(config.url, "redis://prod-host:6379");
    }
}
