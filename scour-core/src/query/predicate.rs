use std::collections::BTreeSet;
use std::time::SystemTime;

use glob::{MatchOptions, Pattern};

use super::params::{KindFilter, SearchParams};
use crate::entry::FileSystemEntry;
use crate::error::{Result, ScourError};

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// `SearchParams` compiled for repeated evaluation.
///
/// Filters run in a fixed order and every active one must pass: kind,
/// name prefix, glob, extension, size, modification time.
#[derive(Debug, Clone)]
pub struct Predicate {
    kind: KindFilter,
    name_prefix: Option<String>,
    glob: Option<Pattern>,
    extensions: BTreeSet<String>,
    min_size: u64,
    max_size: u64,
    modified_after: Option<SystemTime>,
    modified_before: Option<SystemTime>,
}

impl Predicate {
    pub fn new(params: &SearchParams) -> Result<Self> {
        let glob = params
            .glob
            .as_deref()
            .map(Pattern::new)
            .transpose()
            .map_err(|e| ScourError::InvalidQuery(format!("invalid glob: {e}")))?;

        Ok(Self {
            kind: params.kind,
            name_prefix: params.name.as_ref().map(|n| n.to_lowercase()),
            glob,
            extensions: params.extensions.clone(),
            min_size: params.min_size,
            max_size: params.max_size,
            modified_after: params.modified_after,
            modified_before: params.modified_before,
        })
    }

    pub fn matches(&self, entry: &FileSystemEntry) -> bool {
        match self.kind {
            KindFilter::Files if entry.is_dir => return false,
            KindFilter::Directories if !entry.is_dir => return false,
            _ => {}
        }

        if let Some(prefix) = &self.name_prefix
            && !entry.name.to_lowercase().starts_with(prefix.as_str())
        {
            return false;
        }

        if let Some(pattern) = &self.glob
            && !pattern.matches_with(&entry.name, GLOB_OPTIONS)
        {
            return false;
        }

        if !self.extensions.is_empty() {
            match entry.extension() {
                Some(ext) if self.extensions.contains(&ext.to_lowercase()) => {}
                _ => return false,
            }
        }

        // Size bounds only make sense for files
        if self.min_size > 0 || self.max_size > 0 {
            if entry.is_dir {
                return false;
            }
            if self.min_size > 0 && entry.size < self.min_size {
                return false;
            }
            if self.max_size > 0 && entry.size > self.max_size {
                return false;
            }
        }

        if let Some(after) = self.modified_after
            && entry.modified_at < after
        {
            return false;
        }
        if let Some(before) = self.modified_before
            && entry.modified_at > before
        {
            return false;
        }

        true
    }
}

/// Evaluate `params` against one entry. An invalid glob matches nothing.
pub fn matches(entry: &FileSystemEntry, params: &SearchParams) -> bool {
    Predicate::new(params).is_ok_and(|p| p.matches(entry))
}
