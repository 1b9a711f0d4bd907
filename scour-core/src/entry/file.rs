use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScourError};

/// Fixed weight charged per entry for its scalar fields (kind, size, timestamp, mode)
pub const ENTRY_OVERHEAD: u64 = 32;

/// Snapshot of a single `stat()` of a filesystem item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileSystemEntry {
    /// Absolute path to the item
    pub path: PathBuf,
    /// Final path component
    pub name: String,
    pub is_dir: bool,
    /// Length in bytes (only meaningful for files)
    pub size: u64,
    pub modified_at: SystemTime,
    /// Unix permission bits, or an approximation on other platforms
    pub permission_mode: u32,
}

impl FileSystemEntry {
    pub fn from_metadata(path: PathBuf, metadata: &Metadata) -> Self {
        let name = entry_name(&path);
        Self {
            name,
            is_dir: metadata.is_dir(),
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            modified_at: metadata.modified().unwrap_or(UNIX_EPOCH),
            permission_mode: permission_mode(metadata),
            path,
        }
    }

    /// Stat one path, surfacing not-found and permission errors to the caller
    pub fn stat(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| ScourError::from_io(e, path))?;
        Ok(Self::from_metadata(path.to_path_buf(), &metadata))
    }

    /// Extension after the last `.`, or `None` for names without one.
    /// Dotfiles such as `.bashrc` have no extension.
    pub fn extension(&self) -> Option<&str> {
        match self.name.rfind('.') {
            Some(0) | None => None,
            Some(idx) if idx + 1 == self.name.len() => None,
            Some(idx) => Some(&self.name[idx + 1..]),
        }
    }

    /// Approximate memory footprint used for cache accounting
    pub fn weight(&self) -> u64 {
        self.path.as_os_str().len() as u64 + self.name.len() as u64 + ENTRY_OVERHEAD
    }
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(unix)]
fn permission_mode(metadata: &Metadata) -> u32 {
    metadata.mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_mode(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o666
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn named(name: &str) -> FileSystemEntry {
        FileSystemEntry {
            path: PathBuf::from("/data").join(name),
            name: name.to_string(),
            is_dir: false,
            size: 0,
            modified_at: UNIX_EPOCH,
            permission_mode: 0o644,
        }
    }

    #[test]
    fn test_extension() {
        assert_eq!(named("photo.JPG").extension(), Some("JPG"));
        assert_eq!(named("archive.tar.gz").extension(), Some("gz"));
        assert_eq!(named("Makefile").extension(), None);
        assert_eq!(named(".bashrc").extension(), None);
        assert_eq!(named("trailing.").extension(), None);
    }

    #[test]
    fn test_weight_is_deterministic() {
        let entry = named("a.txt");
        // "/data/a.txt" + "a.txt" + overhead
        assert_eq!(entry.weight(), 11 + 5 + ENTRY_OVERHEAD);
    }

    #[test]
    fn test_stat_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        fs::write(&path, "hello").unwrap();

        let entry = FileSystemEntry::stat(&path).unwrap();
        assert_eq!(entry.name, "hello.txt");
        assert_eq!(entry.size, 5);
        assert!(!entry.is_dir);
    }

    #[test]
    fn test_stat_missing() {
        let temp = TempDir::new().unwrap();
        let err = FileSystemEntry::stat(&temp.path().join("missing")).unwrap_err();
        assert!(matches!(err, ScourError::PathNotFound(_)));
    }
}
