//! Storage capability for input discovery and output publishing.
//!
//! The orchestrator never touches `std::fs` directly; everything goes
//! through this trait so tests can inject in-memory backends and so an
//! object-store backend with flat, inconsistent listings can be swapped in
//! without changing the catalog or publisher.

use crate::compute::RetryPolicy;
use crate::error::{GleanerError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{error, info};

/// Filesystem/object-store capability.
///
/// `list` returns entry names relative to the listed path. A backend that
/// returns nested relative paths (and duplicates) must report
/// `supports_nested_listing() == true`; the catalog then switches to its
/// flat-walk strategy and deduplicates.
pub trait Storage: Send + Sync {
    fn exists(&self, path: &Path) -> Result<bool>;

    fn list(&self, path: &Path) -> Result<Vec<String>>;

    fn is_dir(&self, path: &Path) -> Result<bool>;

    /// Idempotent: deleting a missing path succeeds.
    fn delete_recursive(&self, path: &Path) -> Result<()>;

    fn rename(&self, src: &Path, dst: &Path) -> Result<()>;

    fn read_to_string(&self, path: &Path) -> Result<Option<String>>;

    /// Create-or-truncate write. Parent directories are created as needed.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// True for backends whose directory listing returns the whole subtree
    /// as flat relative paths (with duplicates).
    fn supports_nested_listing(&self) -> bool {
        false
    }
}

/// Local filesystem backend.
pub struct LocalStorage;

impl Storage for LocalStorage {
    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(path.exists())
    }

    fn list(&self, path: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        // read_dir order is platform-dependent; sort for determinism
        names.sort();
        Ok(names)
    }

    fn is_dir(&self, path: &Path) -> Result<bool> {
        Ok(path.is_dir())
    }

    fn delete_recursive(&self, path: &Path) -> Result<()> {
        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn rename(&self, src: &Path, dst: &Path) -> Result<()> {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(src, dst)?;
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }
}

/// Delete a directory tree, retrying on failure.
///
/// Storage delete failures are treated as transient contention: the clear
/// is retried at a fixed interval until it succeeds or the policy's attempt
/// budget runs out (the production policy has no budget).
pub fn clear_dir(storage: &dyn Storage, path: &Path, policy: &RetryPolicy) -> Result<()> {
    let mut attempts = 0usize;
    loop {
        if !storage.exists(path)? {
            return Ok(());
        }
        match storage.delete_recursive(path) {
            Ok(()) => return Ok(()),
            Err(e) => {
                attempts += 1;
                error!(path = %path.display(), error = %e, "Clear directory failed");
                if policy.exhausted(attempts) {
                    return Err(GleanerError::Storage(format!(
                        "could not clear {} after {} attempts: {}",
                        path.display(),
                        attempts,
                        e
                    )));
                }
                info!(path = %path.display(), "Retrying directory clear");
                policy.sleep();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_list_sorted() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.txt"), "b").unwrap();
        std::fs::write(tmp.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(tmp.path().join("c")).unwrap();

        let storage = LocalStorage;
        let names = storage.list(tmp.path()).unwrap();
        assert_eq!(names, vec!["a.txt", "b.txt", "c"]);
    }

    #[test]
    fn test_delete_recursive_missing_is_ok() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage;
        storage
            .delete_recursive(&tmp.path().join("nope"))
            .unwrap();
    }

    #[test]
    fn test_write_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage;
        let path = tmp.path().join("deep/nested/file.json");
        storage.write(&path, b"{}").unwrap();
        assert_eq!(storage.read_to_string(&path).unwrap().unwrap(), "{}");
    }

    #[test]
    fn test_read_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage;
        assert!(storage
            .read_to_string(&tmp.path().join("missing"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_clear_dir_removes_tree() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("out");
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        std::fs::write(dir.join("sub/file"), "x").unwrap();

        let storage = LocalStorage;
        clear_dir(&storage, &dir, &RetryPolicy::no_wait()).unwrap();
        assert!(!dir.exists());
    }
}
