//! Metadata/key-value store capability.
//!
//! The partition-manifest store and the DataSource registry live behind
//! this interface. Keys are hierarchical strings scoped by data-source name
//! and partition id (see `gleaner_protocol::paths`).

use crate::error::{GleanerError, Result};
use crate::storage::Storage;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Key-value metadata store.
pub trait MetaStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// File-backed store: each key maps to a file under a base directory.
///
/// Stands in for the production etcd-style store in single-node deployments
/// and harness runs; the key hierarchy maps directly to directories.
pub struct FileMetaStore {
    storage: Arc<dyn Storage>,
    base_dir: PathBuf,
}

impl FileMetaStore {
    pub fn new(storage: Arc<dyn Storage>, base_dir: PathBuf) -> Self {
        Self { storage, base_dir }
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(GleanerError::Kv(format!("invalid key: '{}'", key)));
        }
        Ok(self.base_dir.join(key))
    }
}

impl MetaStore for FileMetaStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.key_path(key)?;
        Ok(self
            .storage
            .read_to_string(&path)?
            .map(|s| s.into_bytes()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.key_path(key)?;
        self.storage.write(&path, value)
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryMetaStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryMetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys currently present, in order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

impl MetaStore for MemoryMetaStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
