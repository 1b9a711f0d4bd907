use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::file::FileSystemEntry;
use crate::error::{Result, ScourError};

/// Fixed weight charged per directory listing on top of its children
pub const DIR_OVERHEAD: u64 = 64;

/// One scanned directory: its immediate files and subdirectories.
///
/// Recency and expiry bookkeeping live in the cache, not here, so a
/// `DirContent` handed out by the cache is an immutable snapshot.
#[derive(Debug, Clone)]
pub struct DirContent {
    /// Absolute directory path, also the cache key
    pub path: PathBuf,
    pub files: HashMap<String, FileSystemEntry>,
    pub sub_dirs: HashMap<String, FileSystemEntry>,
    /// Set when some children could not be read (partial scan)
    pub error: Option<String>,
    /// Approximate memory footprint used for cache accounting
    pub weight: u64,
    pub last_indexed_at: SystemTime,
}

impl DirContent {
    /// An empty listing with its weight already computed
    pub fn empty(path: PathBuf) -> Self {
        Self::from_entries(path, Vec::new())
    }

    /// Build a listing from already-stat'ed children
    pub fn from_entries(path: PathBuf, entries: Vec<FileSystemEntry>) -> Self {
        let mut content = Self {
            path,
            files: HashMap::new(),
            sub_dirs: HashMap::new(),
            error: None,
            weight: 0,
            last_indexed_at: SystemTime::now(),
        };
        for entry in entries {
            content.insert(entry);
        }
        content.weight = content.compute_weight();
        content
    }

    /// List one directory (non-recursive).
    ///
    /// Failing to open or read the directory is an error. A child that
    /// cannot be stat'ed is skipped and noted in `error`.
    pub fn scan(path: &Path) -> Result<Self> {
        let read_dir = fs::read_dir(path).map_err(|e| match fs::metadata(path) {
            Ok(meta) if !meta.is_dir() => ScourError::NotADirectory(path.to_path_buf()),
            _ => ScourError::from_io(e, path),
        })?;

        let mut content = Self::from_entries(path.to_path_buf(), Vec::new());
        let mut failures = 0usize;
        let mut last_failure = None;

        for dir_entry in read_dir {
            let dir_entry = match dir_entry {
                Ok(e) => e,
                Err(e) => {
                    failures += 1;
                    last_failure = Some(e.to_string());
                    continue;
                }
            };

            // Get metadata
            let metadata = match dir_entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    log::debug!("skipping {}: {}", dir_entry.path().display(), e);
                    failures += 1;
                    last_failure = Some(e.to_string());
                    continue;
                }
            };

            content.insert(FileSystemEntry::from_metadata(dir_entry.path(), &metadata));
        }

        if let Some(last) = last_failure {
            content.error = Some(format!("{failures} entries unreadable, last error: {last}"));
        }
        content.last_indexed_at = SystemTime::now();
        content.weight = content.compute_weight();
        Ok(content)
    }

    fn insert(&mut self, entry: FileSystemEntry) {
        if entry.is_dir {
            self.sub_dirs.insert(entry.name.clone(), entry);
        } else {
            self.files.insert(entry.name.clone(), entry);
        }
    }

    /// Look up a child by name, files first
    pub fn get(&self, name: &str) -> Option<&FileSystemEntry> {
        self.files.get(name).or_else(|| self.sub_dirs.get(name))
    }

    /// Iterate over all children, subdirectories first
    pub fn entries(&self) -> impl Iterator<Item = &FileSystemEntry> {
        self.sub_dirs.values().chain(self.files.values())
    }

    /// Total number of children
    pub fn len(&self) -> usize {
        self.files.len() + self.sub_dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn compute_weight(&self) -> u64 {
        let children: u64 = self.entries().map(FileSystemEntry::weight).sum();
        let error = self.error.as_ref().map_or(0, |e| e.len() as u64);
        self.path.as_os_str().len() as u64 + DIR_OVERHEAD + error + children
    }
}
