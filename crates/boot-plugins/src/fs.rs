//! Filesystem helpers for staging and installing node files

use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One file to install: staged source and final destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCopy {
    pub src: PathBuf,
    pub dest: PathBuf,
}

impl FileCopy {
    pub fn new(src: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            src: src.into(),
            dest: dest.into(),
        }
    }
}

impl fmt::Display for FileCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.src.display(), self.dest.display())
    }
}

/// Copy a file, creating the destination directory. Permissions of the
/// source are preserved.
pub fn copy_file(copy: &FileCopy) -> Result<u64> {
    if let Some(parent) = copy.dest.parent() {
        make_dirs(parent)?;
    }
    let bytes = fs::copy(&copy.src, &copy.dest).with_context(|| format!("copy file error: {}", copy))?;
    debug!(bytes, "Copied {}", copy);
    Ok(bytes)
}

/// Remove a directory tree. A missing path is not an error.
pub fn remove_tree(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

pub fn make_dirs(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("Failed to create {}", path.display()))
}

/// Set unix permission bits. No-op on other platforms.
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .with_context(|| format!("Failed to chmod {:o} {}", mode, path.display()))?;
    }
    #[cfg(not(unix))]
    let _ = (path, mode);
    Ok(())
}

/// Write `data` to `path` and apply `mode`.
pub fn write_file(path: &Path, data: &[u8], mode: u32) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        make_dirs(parent)?;
    }
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    set_mode(path, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_creates_destination_dir() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("genesis.json");
        fs::write(&src, b"{}").unwrap();

        let copy = FileCopy::new(&src, dir.path().join("tendermint/config/genesis.json"));
        assert_eq!(copy_file(&copy).unwrap(), 2);
        assert_eq!(fs::read(&copy.dest).unwrap(), b"{}");
    }

    #[test]
    fn test_copy_missing_source_names_both_paths() {
        let dir = TempDir::new().unwrap();
        let copy = FileCopy::new(dir.path().join("nope"), dir.path().join("out"));
        let err = copy_file(&copy).unwrap_err();
        assert!(err.to_string().starts_with("copy file error:"));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_remove_tree_ignores_missing() {
        let dir = TempDir::new().unwrap();
        let tree = dir.path().join("kvstore");
        remove_tree(&tree).unwrap();

        make_dirs(&tree.join("a/b")).unwrap();
        fs::write(tree.join("a/b/file"), b"x").unwrap();
        remove_tree(&tree).unwrap();
        assert!(!tree.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_write_file_applies_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("keys/node_key.json");
        write_file(&path, b"secret", 0o600).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
