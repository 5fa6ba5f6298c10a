//! Opaque blob persistence for maps and records.
//!
//! [`FileBlobStore`] writes `<root>/<key>.bin` using the usual atomic flow:
//! write `<key>.bin.tmp` → `chmod 0600` → `rename`. A crash mid-write leaves
//! the previous blob intact.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{io_err, StoreError};

/// Opaque byte storage keyed by name.
pub trait BlobStore: Send {
    fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// `Ok(None)` when nothing has been stored under `key`.
    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
}

/// Shared stores, so a caller can keep reading what a coordinator wrote.
impl<S: BlobStore + Sync + ?Sized> BlobStore for Arc<S> {
    fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        (**self).write_blob(key, bytes)
    }

    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).read_blob(key)
    }
}

/// Filesystem-backed [`BlobStore`].
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store rooted at `<home>/.anchorsync/data`.
    pub fn at_home(home: &Path) -> Self {
        Self::new(crate::config::data_dir_at(home))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<key>.bin`, pure with no I/O.
    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.bin"))
    }
}

impl BlobStore for FileBlobStore {
    fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| io_err(&self.root, e))?;
            set_dir_permissions(&self.root)?;
        }
        let path = self.blob_path(key);
        let tmp = path.with_extension("bin.tmp");
        std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
        set_file_permissions(&tmp)?;
        std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
        Ok(())
    }

    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.blob_path(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(&path, err)),
        }
    }
}

/// In-process [`BlobStore`], for simulations and tests.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let guard = self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut keys: Vec<String> = guard.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl BlobStore for MemoryBlobStore {
    fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let mut guard = self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let guard = self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(guard.get(key).cloned())
    }
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}
