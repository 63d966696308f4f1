use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

use super::{ConnectionStats, Result, StatusStore, StoreError};
use crate::config::RedisConfig;

/// Bounded set of checkouts over a shareable connection.
///
/// The semaphore caps how many callers hold a connection at once; each
/// checkout is a [`PooledConnection`] that gives its slot back on drop.
pub struct ConnectionPool<C> {
    conn: C,
    permits: Arc<Semaphore>,
    max_connections: usize,
}

/// Redis commands are multiplexed over a [`ConnectionManager`], which
/// reconnects on its own.
pub type RedisPool = ConnectionPool<ConnectionManager>;

/// A connection checked out of a [`ConnectionPool`]. Returned to the pool on drop.
pub struct PooledConnection<C> {
    conn: C,
    _permit: OwnedSemaphorePermit,
}

impl<C> PooledConnection<C> {
    pub fn connection(&mut self) -> &mut C {
        &mut self.conn
    }
}

impl<C: Clone> ConnectionPool<C> {
    pub fn new(conn: C, max_connections: usize) -> Self {
        Self {
            conn,
            permits: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Wait for a free slot and check out a connection
    pub async fn acquire(&self) -> Result<PooledConnection<C>> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::PoolClosed)?;

        Ok(PooledConnection {
            conn: self.conn.clone(),
            _permit: permit,
        })
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Connections not currently checked out
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

impl RedisPool {
    pub async fn connect(info: ConnectionInfo, max_connections: usize) -> Result<Self> {
        let client =
            redis::Client::open(info).map_err(|e| StoreError::Connection(e.to_string()))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self::new(manager, max_connections))
    }
}

/// Connection parameters for `config`. The password is passed as-is, never
/// through a URL.
fn connection_info(config: &RedisConfig) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
        redis: RedisConnectionInfo {
            db: config.db,
            password: config.password.clone(),
            ..Default::default()
        },
    }
}

/// Status store on an external Redis server
pub struct RedisStatusStore {
    pool: RedisPool,
}

impl RedisStatusStore {
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        info!(
            host = %config.host,
            port = config.port,
            db = config.db,
            max_connections = config.max_connections,
            "Connecting to Redis"
        );

        let pool = RedisPool::connect(connection_info(config), config.max_connections).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        let value: Option<String> = conn.connection().get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        conn.connection().set::<_, _, ()>(key, value).await?;
        debug!(key, "Status written");
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        let written: bool = conn.connection().set_nx(key, value).await?;
        Ok(written)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        let _: String = redis::cmd("PING")
            .query_async(conn.connection())
            .await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }

    fn connection_stats(&self) -> Option<ConnectionStats> {
        Some(ConnectionStats {
            max: self.pool.max_connections(),
            available: self.pool.available(),
        })
    }
}
