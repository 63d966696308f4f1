use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const CONFIG_ENV_VAR: &str = "FACTORBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/factorbox.toml";
const ENV_PREFIX: &str = "FACTORBOX";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables
/// 5. Deployment variables (`WORKER_NUM`, `REDIS_HOST`, ...)
///
/// `explicit_path` (from the command line) wins over `FACTORBOX_CONFIG`.
pub fn load(explicit_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = explicit_path.unwrap_or_else(|| {
        env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    });

    let mut config = load_from_sources(config_path)?;
    apply_deployment_env(&mut config, |name| env::var(name).ok())?;

    Ok(config)
}

/// Load configuration from a specific path and `FACTORBOX__*` environment
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // FACTORBOX__WORKERS__NUM_WORKERS -> workers.num_workers
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}

/// Apply the flat variables used by existing container deployments.
///
/// `REDIS_PASSWORD` is only ever read from the environment.
pub fn apply_deployment_env<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup("WORKER_NUM") {
        config.workers.num_workers = parse_var("WORKER_NUM", &value)?;
    }
    if let Some(value) = lookup("REDIS_HOST") {
        config.store.redis.host = value;
    }
    if let Some(value) = lookup("REDIS_PORT") {
        config.store.redis.port = parse_var("REDIS_PORT", &value)?;
    }
    if let Some(value) = lookup("REDIS_MAX_CONN") {
        config.store.redis.max_connections = parse_var("REDIS_MAX_CONN", &value)?;
    }
    if let Some(value) = lookup("REDIS_PASSWORD") {
        config.store.redis.password = Some(value);
    }
    Ok(())
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Message(format!("invalid value for {name}: {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:5000");
        assert_eq!(config.workers.num_workers, 4);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[server]
bind_addr = "127.0.0.1:9000"

[workers]
num_workers = 12

[store]
backend = "fjall"

[store.fjall]
path = "/var/lib/factorbox/status"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.server.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.workers.num_workers, 12);
        assert_eq!(config.store.backend, StoreBackend::Fjall);
        assert_eq!(
            config.store.fjall.path,
            PathBuf::from("/var/lib/factorbox/status")
        );
    }

    #[test]
    fn test_deployment_env_overrides() {
        let mut config = Config::default();
        let lookup = lookup_from(&[
            ("WORKER_NUM", "8"),
            ("REDIS_HOST", "redis.internal"),
            ("REDIS_PORT", "6380"),
            ("REDIS_MAX_CONN", "32"),
        ]);

        apply_deployment_env(&mut config, lookup).unwrap();

        assert_eq!(config.workers.num_workers, 8);
        assert_eq!(config.store.redis.host, "redis.internal");
        assert_eq!(config.store.redis.port, 6380);
        assert_eq!(config.store.redis.max_connections, 32);
        assert!(config.store.redis.password.is_none());
    }

    #[test]
    fn test_deployment_env_rejects_garbage() {
        let mut config = Config::default();
        let lookup = lookup_from(&[("WORKER_NUM", "many")]);

        let err = apply_deployment_env(&mut config, lookup).unwrap_err();
        assert!(err.to_string().contains("WORKER_NUM"));
    }

    #[test]
    fn test_deployment_env_absent_keeps_values() {
        let mut config = Config::default();
        apply_deployment_env(&mut config, |_| None).unwrap();

        assert_eq!(config.workers.num_workers, 4);
        assert_eq!(config.store.redis.host, "127.0.0.1");
    }
}
