use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Largest accepted request body, after decompression
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

/// Worker pool sizing, fixed at startup
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
        }
    }
}

fn default_num_workers() -> usize {
    4
}

/// Status store backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Fjall,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub fjall: FjallConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_host")]
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub db: i64,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Loaded from environment only, never from the config file
    #[serde(skip)]
    pub password: Option<String>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_redis_host(),
            port: default_redis_port(),
            db: 0,
            max_connections: default_max_connections(),
            password: None,
        }
    }
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_max_connections() -> usize {
    16
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FjallConfig {
    #[serde(default = "default_fjall_path")]
    pub path: PathBuf,
}

impl Default for FjallConfig {
    fn default() -> Self {
        Self {
            path: default_fjall_path(),
        }
    }
}

fn default_fjall_path() -> PathBuf {
    PathBuf::from("data/status")
}
