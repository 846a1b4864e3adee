//! `KeystoreBackend` and its three canonical implementations (§4.4, §9
//! "Dynamic dispatch of storage/engine": capability traits, no runtime
//! plugin discovery).

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{KeystoreError, Result};

/// A mapping from `key_name` to an opaque, already-sealed byte string.
///
/// Implementations need not understand the bytes they store; sealing
/// and parsing happen above this trait (`dkls_sdk` for the passphrase
/// decision, [`crate::blob`] for the wire format).
#[async_trait]
pub trait KeystoreBackend: Send + Sync {
    /// Atomic from a concurrent reader's perspective: a `load` racing
    /// this call sees either the old value or the new one, never a
    /// partial write.
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<()>;

    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>>;

    async fn remove(&self, name: &str) -> Result<()>;

    async fn list(&self) -> Result<Vec<String>>;

    /// Probe whether this backend is usable in the current host (e.g.
    /// detects private-mode browsers for the browser-local backend).
    fn is_available(&self) -> bool;
}

/// An in-memory backend. Nothing survives process exit; used for tests
/// and ephemeral hosts.
#[derive(Default)]
pub struct InMemoryBackend {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeystoreBackend for InMemoryBackend {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        self.entries.write().await.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(name).cloned())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.entries.write().await.remove(name);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// A filesystem backend rooted at one directory, one file per key.
///
/// `save` writes to a sibling temp file and renames it into place —
/// `rename` is atomic on the same filesystem, giving the §4.4 "never a
/// partial value" contract without a lock.
pub struct FilesystemBackend {
    base_dir: PathBuf,
}

impl FilesystemBackend {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    fn tmp_path_for(&self, name: &str) -> PathBuf {
        self.base_dir.join(format!("{name}.tmp-{}", std::process::id()))
    }
}

#[async_trait]
impl KeystoreBackend for FilesystemBackend {
    async fn save(&self, name: &str, bytes: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| KeystoreError::Storage(e.to_string()))?;
        let tmp_path = self.tmp_path_for(name);
        tokio::fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| KeystoreError::Storage(e.to_string()))?;
        tokio::fs::rename(&tmp_path, self.path_for(name))
            .await
            .map_err(|e| KeystoreError::Storage(e.to_string()))?;
        tracing::debug!(name, "keystore entry saved");
        Ok(())
    }

    async fn load(&self, name: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KeystoreError::Storage(e.to_string())),
        }
    }

    async fn remove(&self, name: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(name)).await {
            Ok(()) => {
                tracing::debug!(name, "keystore entry removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::warn!(name, error = %e, "failed to remove keystore entry");
                Err(KeystoreError::Storage(e.to_string()))
            }
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(KeystoreError::Storage(e.to_string())),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| KeystoreError::Storage(e.to_string()))?
        {
            if let Some(name) = entry.file_name().to_str() {
                if !name.contains(".tmp-") {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    fn is_available(&self) -> bool {
        self.base_dir
            .parent()
            .map(|p| p.exists() || self.base_dir.exists())
            .unwrap_or(true)
    }
}

/// A placeholder for a browser-local-storage backend.
///
/// The host integration a real browser-local backend needs (a
/// `localStorage`-shaped JS API) only exists under a wasm target; this
/// native workspace has no such host, so every operation fails with
/// [`KeystoreError::Unavailable`] and `is_available` always reports
/// `false`. It exists so callers can exercise the three-backend
/// selection surface (§9 "three blessed implementations") without a
/// compile-time `cfg` split in `dkls-sdk`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubBrowserLocalBackend;

#[async_trait]
impl KeystoreBackend for StubBrowserLocalBackend {
    async fn save(&self, _name: &str, _bytes: &[u8]) -> Result<()> {
        Err(KeystoreError::Unavailable(
            "browser-local backend requires a wasm host".into(),
        ))
    }

    async fn load(&self, _name: &str) -> Result<Option<Vec<u8>>> {
        Err(KeystoreError::Unavailable(
            "browser-local backend requires a wasm host".into(),
        ))
    }

    async fn remove(&self, _name: &str) -> Result<()> {
        Err(KeystoreError::Unavailable(
            "browser-local backend requires a wasm host".into(),
        ))
    }

    async fn list(&self) -> Result<Vec<String>> {
        Err(KeystoreError::Unavailable(
            "browser-local backend requires a wasm host".into(),
        ))
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_save_then_load_roundtrips() {
        let backend = InMemoryBackend::new();
        backend.save("k1", b"hello").await.expect("save");
        assert_eq!(backend.load("k1").await.expect("load"), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn in_memory_load_missing_is_none() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.load("missing").await.expect("load"), None);
    }

    #[tokio::test]
    async fn in_memory_remove_then_load_is_none() {
        let backend = InMemoryBackend::new();
        backend.save("k1", b"hello").await.expect("save");
        backend.remove("k1").await.expect("remove");
        assert_eq!(backend.load("k1").await.expect("load"), None);
    }

    #[tokio::test]
    async fn in_memory_list_reflects_saved_keys() {
        let backend = InMemoryBackend::new();
        backend.save("a", b"1").await.expect("save");
        backend.save("b", b"2").await.expect("save");
        let mut names = backend.list().await.expect("list");
        names.sort();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn filesystem_save_then_load_roundtrips() {
        let dir = std::env::temp_dir().join(format!("dkls-keystore-test-{}", std::process::id()));
        let backend = FilesystemBackend::new(dir.clone());
        backend.save("k1", b"hello world").await.expect("save");
        assert_eq!(
            backend.load("k1").await.expect("load"),
            Some(b"hello world".to_vec())
        );
        backend.remove("k1").await.expect("remove");
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn filesystem_load_missing_is_none() {
        let dir = std::env::temp_dir().join(format!("dkls-keystore-test-missing-{}", std::process::id()));
        let backend = FilesystemBackend::new(dir);
        assert_eq!(backend.load("nope").await.expect("load"), None);
    }

    #[tokio::test]
    async fn browser_local_stub_is_unavailable() {
        let backend = StubBrowserLocalBackend;
        assert!(!backend.is_available());
        assert!(backend.save("k", b"v").await.is_err());
    }
}
