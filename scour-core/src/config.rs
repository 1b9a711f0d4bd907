//! User configuration, stored as plain JSON.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheConfig, capacity_for_memory};
use crate::error::{Result, ScourError};
use crate::search::SearchConfig;

/// Directory listing cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Fixed capacity in bytes; `None` sizes the cache from system memory
    pub capacity_bytes: Option<u64>,
    pub ttl_secs: u64,
    pub janitor_interval_secs: u64,
    pub admission_ratio: f64,
    pub max_evictions_per_sweep: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            capacity_bytes: None,
            ttl_secs: 300,
            janitor_interval_secs: 30,
            admission_ratio: 0.3,
            max_evictions_per_sweep: 256,
        }
    }
}

/// Search engine settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub workers: usize,
    pub queue_depth: usize,
    pub follow_symlinks: bool,
    pub skip_virtual_paths: bool,
    pub timeout_secs: Option<u64>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            workers: 16,
            queue_depth: 1000,
            follow_symlinks: false,
            skip_virtual_paths: true,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheSettings,
    pub search: SearchSettings,
}

/// Fields a user may override from the command line or a settings screen.
/// `None` leaves the current value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub cache_capacity_bytes: Option<u64>,
    pub cache_ttl_secs: Option<u64>,
    pub workers: Option<usize>,
    pub follow_symlinks: Option<bool>,
    pub skip_virtual_paths: Option<bool>,
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// `<config dir>/scour/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("scour").join("config.json"))
    }

    /// Load from JSON; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("no config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(ScourError::from_io(e, path)),
        };

        let config: Config = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(ScourError::InvalidConfig(msg.to_string()));

        if self.search.workers == 0 {
            return invalid("search.workers must be at least 1");
        }
        if self.search.queue_depth == 0 {
            return invalid("search.queue_depth must be at least 1");
        }
        if !(self.cache.admission_ratio > 0.0 && self.cache.admission_ratio <= 1.0) {
            return invalid("cache.admission_ratio must be in (0, 1]");
        }
        if self.cache.ttl_secs == 0 {
            return invalid("cache.ttl_secs must be positive");
        }
        if self.cache.janitor_interval_secs == 0 {
            return invalid("cache.janitor_interval_secs must be positive");
        }
        Ok(())
    }

    /// Apply every override that is set
    pub fn merge(&mut self, overrides: &ConfigOverrides) {
        if let Some(capacity) = overrides.cache_capacity_bytes {
            self.cache.capacity_bytes = Some(capacity);
        }
        if let Some(ttl) = overrides.cache_ttl_secs {
            self.cache.ttl_secs = ttl;
        }
        if let Some(workers) = overrides.workers {
            self.search.workers = workers;
        }
        if let Some(follow) = overrides.follow_symlinks {
            self.search.follow_symlinks = follow;
        }
        if let Some(skip) = overrides.skip_virtual_paths {
            self.search.skip_virtual_paths = skip;
        }
        if let Some(timeout) = overrides.timeout_secs {
            self.search.timeout_secs = Some(timeout);
        }
    }

    /// Cache configuration, sized from `total_memory` unless a capacity is set
    pub fn cache_config(&self, total_memory: u64) -> CacheConfig {
        let max_weight = match self.cache.capacity_bytes {
            Some(capacity) => capacity,
            None => {
                let capacity = capacity_for_memory(total_memory);
                if capacity == 0 {
                    log::warn!(
                        "system memory too small ({} bytes), directory cache disabled",
                        total_memory
                    );
                }
                capacity
            }
        };

        CacheConfig {
            max_weight,
            ttl: Duration::from_secs(self.cache.ttl_secs),
            admission_ratio: self.cache.admission_ratio,
            janitor_interval: Duration::from_secs(self.cache.janitor_interval_secs),
            max_evictions_per_sweep: self.cache.max_evictions_per_sweep,
        }
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            workers: self.search.workers,
            queue_depth: self.search.queue_depth,
            follow_symlinks: self.search.follow_symlinks,
            skip_virtual_paths: self.search.skip_virtual_paths,
            timeout: self.search.timeout_secs.map(Duration::from_secs),
            ..SearchConfig::default()
        }
    }
}
