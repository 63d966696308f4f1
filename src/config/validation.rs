use super::models::{Config, StoreBackend};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("workers.num_workers must be positive")]
    InvalidWorkerCount,

    #[error("store.redis.max_connections must be positive")]
    InvalidMaxConnections,

    #[error("store.redis.host must not be empty")]
    EmptyRedisHost,

    #[error("store.fjall.path must not be empty")]
    EmptyFjallPath,

    #[error("server.max_body_bytes must be positive")]
    InvalidBodyLimit,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_workers(config)?;
    validate_server(config)?;
    validate_store(config)?;
    Ok(())
}

fn validate_workers(config: &Config) -> Result<(), ValidationError> {
    if config.workers.num_workers == 0 {
        return Err(ValidationError::InvalidWorkerCount);
    }
    Ok(())
}

fn validate_server(config: &Config) -> Result<(), ValidationError> {
    if config.server.max_body_bytes == 0 {
        return Err(ValidationError::InvalidBodyLimit);
    }
    Ok(())
}

/// Only the selected backend's section is checked
fn validate_store(config: &Config) -> Result<(), ValidationError> {
    match config.store.backend {
        StoreBackend::Redis => {
            let redis = &config.store.redis;
            if redis.host.trim().is_empty() {
                return Err(ValidationError::EmptyRedisHost);
            }
            if redis.max_connections == 0 {
                return Err(ValidationError::InvalidMaxConnections);
            }
        }
        StoreBackend::Fjall => {
            if config.store.fjall.path.as_os_str().is_empty() {
                return Err(ValidationError::EmptyFjallPath);
            }
        }
        StoreBackend::Memory => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = Config::default();
        config.workers.num_workers = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidWorkerCount)
        ));
    }

    #[test]
    fn test_zero_max_connections_rejected() {
        let mut config = Config::default();
        config.store.redis.max_connections = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidMaxConnections)
        ));
    }

    #[test]
    fn test_redis_settings_ignored_for_other_backends() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        config.store.redis.host = String::new();

        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_fjall_path_rejected() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Fjall;
        config.store.fjall.path = PathBuf::new();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyFjallPath)
        ));
    }

    #[test]
    fn test_zero_body_limit_rejected() {
        let mut config = Config::default();
        config.server.max_body_bytes = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidBodyLimit)
        ));
    }
}
