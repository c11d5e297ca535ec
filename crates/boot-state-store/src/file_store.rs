//! JSON file backed state store
//!
//! The whole map is loaded on open and rewritten on every `set`. Writes go to
//! a temporary file in the same directory which is synced and renamed over the
//! backing file, so a crash mid-write leaves either the old or the new
//! snapshot, never a truncated one.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, StateStoreError};
use crate::state_store::StateStore;

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    map: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Load the store at `path`.
    ///
    /// A missing file yields an empty store when `create_if_missing` is set
    /// and [`StateStoreError::NotFound`] otherwise. Nothing is written until
    /// the first `set`.
    pub fn open(path: impl Into<PathBuf>, create_if_missing: bool) -> Result<Self> {
        let path = path.into();

        let map = match fs::read(&path) {
            Ok(data) => serde_json::from_slice::<BTreeMap<String, String>>(&data).map_err(
                |source| StateStoreError::Corrupt {
                    path: path.clone(),
                    source,
                },
            )?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if !create_if_missing {
                    return Err(StateStoreError::NotFound(path));
                }
                BTreeMap::new()
            }
            Err(source) => return Err(StateStoreError::Io { path, source }),
        };

        debug!(path = %path.display(), entries = map.len(), "Opened state store");
        Ok(Self {
            path,
            map: RwLock::new(map),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let data = serde_json::to_vec_pretty(map)?;
        atomic_write(&self.path, &data).map_err(|source| StateStoreError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> String {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        map.get(key).cloned().unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.to_string(), value.to_string());
        // The in-memory map keeps the update even if the write fails.
        self.persist(&map)?;
        debug!(key, "State store updated");
        Ok(())
    }

    fn snapshot(&self) -> BTreeMap<String, String> {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
