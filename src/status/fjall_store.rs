use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info};

use super::{Result, StatusStore, StoreError};

/// Fjall-backed status store for single-node deployments
///
/// Layout: one `statuses` partition, job id (decimal, UTF-8) -> status text.
pub struct FjallStatusStore {
    keyspace: Keyspace,
    statuses: PartitionHandle,
    // serializes check-then-insert in set_if_absent
    reserve_lock: Mutex<()>,
}

impl FjallStatusStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening Fjall status store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let statuses = keyspace.open_partition("statuses", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            statuses,
            reserve_lock: Mutex::new(()),
        })
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        match self.statuses.get(key)? {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(Some)
                .map_err(|_| StoreError::InvalidUtf8(key.to_string())),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StatusStore for FjallStatusStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.read(key)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.statuses.insert(key.as_bytes(), value.as_bytes())?;
        debug!(key, "Status written");
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let _guard = self
            .reserve_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if self.statuses.get(key)?.is_some() {
            return Ok(false);
        }
        self.statuses.insert(key.as_bytes(), value.as_bytes())?;
        Ok(true)
    }

    async fn ping(&self) -> Result<()> {
        let _ = self.statuses.get("__ping__")?;
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.persist()
    }

    fn backend(&self) -> &'static str {
        "fjall"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_set_get_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallStatusStore::open(temp_dir.path().join("status")).unwrap();

        assert_eq!(store.get("42").await.unwrap(), None);

        store.set("42", "Calculating...").await.unwrap();
        assert_eq!(store.get("42").await.unwrap().as_deref(), Some("Calculating..."));

        store.set("42", "").await.unwrap();
        assert_eq!(store.get("42").await.unwrap().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_set_if_absent() {
        let temp_dir = TempDir::new().unwrap();
        let store = FjallStatusStore::open(temp_dir.path().join("status")).unwrap();

        assert!(store.set_if_absent("1", "Calculating...").await.unwrap());
        assert!(!store.set_if_absent("1", "other").await.unwrap());
        assert_eq!(store.get("1").await.unwrap().as_deref(), Some("Calculating..."));
    }

    #[tokio::test]
    async fn test_persistence_across_reopens() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("status");

        {
            let store = FjallStatusStore::open(&path).unwrap();
            store.set("9", "3,3").await.unwrap();
            store.flush().await.unwrap();
        }

        let store = FjallStatusStore::open(&path).unwrap();
        assert_eq!(store.get("9").await.unwrap().as_deref(), Some("3,3"));
        store.ping().await.unwrap();
    }
}
