use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScourError};

/// Restrict matches to files or directories
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindFilter {
    #[default]
    Any,
    Files,
    Directories,
}

/// Filter criteria for one search. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    /// Root of the subtree to search
    pub base_dir: PathBuf,
    /// Case-insensitive name prefix
    pub name: Option<String>,
    /// Case-insensitive glob matched against the entry name
    pub glob: Option<String>,
    /// Accepted extensions, lowercase without the leading dot
    pub extensions: BTreeSet<String>,
    /// Inclusive lower size bound in bytes, 0 = unset
    pub min_size: u64,
    /// Inclusive upper size bound in bytes, 0 = unset
    pub max_size: u64,
    /// Inclusive lower bound on modification time
    pub modified_after: Option<SystemTime>,
    /// Inclusive upper bound on modification time
    pub modified_before: Option<SystemTime>,
    pub kind: KindFilter,
    /// Reserved; content search is not implemented and the flag is ignored
    pub search_content: bool,
}

impl SearchParams {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.name = (!prefix.is_empty()).then_some(prefix);
        self
    }

    pub fn with_glob(mut self, pattern: impl Into<String>) -> Self {
        let pattern = pattern.into();
        self.glob = (!pattern.is_empty()).then_some(pattern);
        self
    }

    /// Add accepted extensions; `.JPG`, `jpg` and ` Jpg ` all become `jpg`
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ext in extensions {
            if let Some(ext) = normalize_extension(ext.as_ref()) {
                self.extensions.insert(ext);
            }
        }
        self
    }

    pub fn with_size_range(mut self, min_size: u64, max_size: u64) -> Self {
        self.min_size = min_size;
        self.max_size = max_size;
        self
    }

    pub fn modified_after(mut self, at: SystemTime) -> Self {
        self.modified_after = Some(at);
        self
    }

    pub fn modified_before(mut self, at: SystemTime) -> Self {
        self.modified_before = Some(at);
        self
    }

    pub fn with_kind(mut self, kind: KindFilter) -> Self {
        self.kind = kind;
        self
    }

    /// Whether any size bound is active
    pub fn has_size_filter(&self) -> bool {
        self.min_size > 0 || self.max_size > 0
    }

    /// Reject parameters no search could satisfy, before any work is scheduled
    pub fn validate(&self) -> Result<()> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(ScourError::EmptyBaseDir);
        }

        if self.max_size > 0 && self.min_size > self.max_size {
            return Err(ScourError::InvalidQuery(format!(
                "minimum size {} exceeds maximum size {}",
                self.min_size, self.max_size
            )));
        }

        if let (Some(after), Some(before)) = (self.modified_after, self.modified_before)
            && after > before
        {
            return Err(ScourError::InvalidQuery(
                "modified-after bound is later than modified-before bound".to_string(),
            ));
        }

        if let Some(pattern) = &self.glob {
            glob::Pattern::new(pattern)
                .map_err(|e| ScourError::InvalidQuery(format!("invalid glob {pattern}: {e}")))?;
        }

        Ok(())
    }
}

pub(crate) fn normalize_extension(raw: &str) -> Option<String> {
    let ext = raw.trim().trim_start_matches('.').to_lowercase();
    (!ext.is_empty()).then_some(ext)
}
