use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::DirectoryEntryCache;
use crate::entry::{DirContent, FileSystemEntry};
use crate::error::Result;

/// Single-directory browsing backed by the listing cache
#[derive(Debug, Clone)]
pub struct Explorer {
    cache: Arc<DirectoryEntryCache>,
}

impl Explorer {
    pub fn new(cache: Arc<DirectoryEntryCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<DirectoryEntryCache> {
        &self.cache
    }

    /// List one directory, serving it from the cache when possible.
    ///
    /// On a miss (or with `use_cache == false`) the directory is scanned and
    /// the fresh listing offered to the cache. Scan errors go to the caller.
    pub fn list_dir(&self, path: &Path, use_cache: bool) -> Result<Arc<DirContent>> {
        let path = absolute(path);

        if use_cache && let Some(content) = self.cache.get(&path) {
            log::debug!("cache hit for {}", path.display());
            return Ok(content);
        }

        let content = Arc::new(DirContent::scan(&path)?);
        if !self.cache.put(Arc::clone(&content)) {
            log::debug!("{} not cached", path.display());
        }
        Ok(content)
    }

    /// Stat one item; errors go to the caller
    pub fn stat(&self, path: &Path) -> Result<FileSystemEntry> {
        FileSystemEntry::stat(&absolute(path))
    }

    /// Drop the cached listing of `path`
    pub fn invalidate(&self, path: &Path) -> Option<Arc<DirContent>> {
        self.cache.remove(&absolute(path))
    }

    /// Forget listings made stale by a rename or delete of `path`: its
    /// parent's listing and, if it was a directory, its own.
    pub fn notify_changed(&self, path: &Path) {
        let path = absolute(path);
        if let Some(parent) = path.parent() {
            self.cache.remove(parent);
        }
        self.cache.remove(&path);
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use crate::error::ScourError;
    use std::fs;
    use tempfile::TempDir;

    fn explorer() -> Explorer {
        Explorer::new(Arc::new(DirectoryEntryCache::without_janitor(
            CacheConfig::default(),
        )))
    }

    #[test]
    fn test_second_listing_is_a_cache_hit() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        let explorer = explorer();

        let first = explorer.list_dir(temp.path(), true).unwrap();
        let second = explorer.list_dir(temp.path(), true).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(explorer.cache().stats().hits, 1);
    }

    #[test]
    fn test_bypassing_cache_rescans() {
        let temp = TempDir::new().unwrap();
        let explorer = explorer();

        let first = explorer.list_dir(temp.path(), true).unwrap();
        fs::write(temp.path().join("new.txt"), "n").unwrap();
        let fresh = explorer.list_dir(temp.path(), false).unwrap();

        assert!(first.is_empty());
        assert_eq!(fresh.len(), 1);
        // The rescan replaced the cached listing
        assert_eq!(explorer.list_dir(temp.path(), true).unwrap().len(), 1);
    }

    #[test]
    fn test_notify_changed_invalidates_parent() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("old.txt");
        fs::write(&file, "x").unwrap();
        let explorer = explorer();

        explorer.list_dir(temp.path(), true).unwrap();
        fs::rename(&file, temp.path().join("new.txt")).unwrap();
        explorer.notify_changed(&file);

        let listing = explorer.list_dir(temp.path(), true).unwrap();
        assert!(listing.get("new.txt").is_some());
        assert!(listing.get("old.txt").is_none());
    }

    #[test]
    fn test_errors_reach_the_caller() {
        let temp = TempDir::new().unwrap();
        let explorer = explorer();

        let err = explorer.list_dir(&temp.path().join("missing"), true).unwrap_err();
        assert!(matches!(err, ScourError::PathNotFound(_)));
        assert!(explorer.stat(&temp.path().join("missing")).is_err());
    }
}
