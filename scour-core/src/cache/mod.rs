//! In-memory cache of directory listings with LRU and TTL eviction.

mod arena;
mod capacity;
mod janitor;

pub use capacity::capacity_for_memory;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::entry::DirContent;
use crate::size::MB;
use arena::{LruList, NodeId};
use janitor::Janitor;

/// Cache sizing and expiry settings
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Capacity in weight units (approximate bytes), sentinels excluded
    pub max_weight: u64,
    /// How long an admitted listing stays fresh
    pub ttl: Duration,
    /// Largest fraction of `max_weight` a single listing may take
    pub admission_ratio: f64,
    /// Delay between janitor sweeps
    pub janitor_interval: Duration,
    /// Upper bound on evictions performed by one sweep
    pub max_evictions_per_sweep: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_weight: 2 * MB,
            ttl: Duration::from_secs(5 * 60),
            admission_ratio: 0.3,
            janitor_interval: Duration::from_secs(30),
            max_evictions_per_sweep: 256,
        }
    }
}

/// Counters describing cache behaviour since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Puts refused by the admission ratio
    pub declined: u64,
    /// Entries dropped to make room
    pub evictions: u64,
    /// Entries dropped because they expired or were marked dirty
    pub expirations: u64,
}

/// Map and recency list, always mutated together under one lock
#[derive(Debug)]
struct CacheState {
    map: HashMap<PathBuf, NodeId>,
    list: LruList,
    current_weight: u64,
    stats: CacheStats,
}

impl CacheState {
    fn evict(&mut self, id: NodeId) -> Option<Arc<DirContent>> {
        let content = self.list.remove(id)?;
        self.map.remove(&content.path);
        self.current_weight -= content.weight;
        Some(content)
    }
}

/// Bounded store of directory listings keyed by absolute path.
///
/// Recency is tracked in an arena-backed list (head = most recently used)
/// and every entry expires `ttl` after admission. A background janitor
/// sweeps expired and dirty entries; `get` also expires lazily.
#[derive(Debug)]
pub struct DirectoryEntryCache {
    config: CacheConfig,
    sentinel_weight: u64,
    state: Mutex<CacheState>,
    janitor: Mutex<Option<Janitor>>,
}

impl DirectoryEntryCache {
    /// Build a cache and start its janitor
    pub fn new(config: CacheConfig) -> Arc<Self> {
        let interval = config.janitor_interval;
        let cache = Arc::new(Self::without_janitor(config));
        let janitor = Janitor::start(Arc::downgrade(&cache), interval);
        *cache.janitor.lock() = Some(janitor);
        cache
    }

    /// Build a cache that only expires entries lazily and on `sweep_now`
    pub fn without_janitor(config: CacheConfig) -> Self {
        // Sentinels are charged like empty listings
        let sentinel_weight = DirContent::empty(PathBuf::new()).weight;

        Self {
            config,
            sentinel_weight,
            state: Mutex::new(CacheState {
                map: HashMap::new(),
                list: LruList::new(),
                current_weight: 2 * sentinel_weight,
                stats: CacheStats::default(),
            }),
            janitor: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a listing, marking it most recently used.
    ///
    /// Expired or dirty entries are evicted on the spot and reported as a miss.
    pub fn get(&self, path: &Path) -> Option<Arc<DirContent>> {
        let mut state = self.state.lock();

        let Some(&id) = state.map.get(path) else {
            state.stats.misses += 1;
            return None;
        };

        let stale = state.list.get(id).is_none_or(|n| n.is_stale(Instant::now()));
        if stale {
            state.evict(id);
            state.stats.expirations += 1;
            state.stats.misses += 1;
            return None;
        }

        state.list.move_to_front(id);
        state.stats.hits += 1;
        state.list.get(id).and_then(|n| n.content.clone())
    }

    /// Admit a listing as most recently used.
    ///
    /// Returns `false` when the listing is larger than `admission_ratio` of
    /// the capacity; declining is a normal outcome. An existing listing for
    /// the same path is replaced. Least recently used entries are evicted
    /// until the new one fits.
    pub fn put(&self, content: impl Into<Arc<DirContent>>) -> bool {
        let content = content.into();
        let limit = self.config.max_weight as f64 * self.config.admission_ratio;
        if content.weight as f64 > limit {
            log::debug!(
                "declined caching {} (weight {} over {:.0})",
                content.path.display(),
                content.weight,
                limit
            );
            self.state.lock().stats.declined += 1;
            return false;
        }

        let mut state = self.state.lock();

        if let Some(&existing) = state.map.get(&content.path) {
            state.evict(existing);
        }

        let max_total = self.max_weight();
        while state.current_weight + content.weight > max_total {
            let Some(lru) = state.list.back() else { break };
            state.evict(lru);
            state.stats.evictions += 1;
        }

        let expires_at = Instant::now() + self.config.ttl;
        let weight = content.weight;
        let path = content.path.clone();
        let id = state.list.push_front(content, expires_at);
        state.map.insert(path, id);
        state.current_weight += weight;
        true
    }

    /// Evict a listing unconditionally, returning it if it was cached
    pub fn remove(&self, path: &Path) -> Option<Arc<DirContent>> {
        let mut state = self.state.lock();
        let id = *state.map.get(path)?;
        state.evict(id)
    }

    /// Flag a listing as invalid without evicting it yet.
    ///
    /// Returns `false` if the path is not cached.
    pub fn mark_dirty(&self, path: &Path) -> bool {
        let mut state = self.state.lock();
        let Some(&id) = state.map.get(path) else {
            return false;
        };
        match state.list.get_mut(id) {
            Some(node) => {
                node.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Whether a listing is held, fresh or not, without touching recency
    pub fn contains(&self, path: &Path) -> bool {
        self.state.lock().map.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.state.lock().list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current weight including both sentinels
    pub fn current_weight(&self) -> u64 {
        self.state.lock().current_weight
    }

    /// Capacity including both sentinels
    pub fn max_weight(&self) -> u64 {
        self.config.max_weight + 2 * self.sentinel_weight
    }

    pub fn sentinel_weight(&self) -> u64 {
        self.sentinel_weight
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    /// Drop every listing
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.map.clear();
        state.list = LruList::new();
        state.current_weight = 2 * self.sentinel_weight;
    }

    /// Paths from most to least recently used
    pub fn paths_by_recency(&self) -> Vec<PathBuf> {
        let state = self.state.lock();
        state
            .list
            .iter_front()
            .filter_map(|(_, n)| n.content.as_ref().map(|c| c.path.clone()))
            .collect()
    }

    /// Evict expired and dirty listings.
    ///
    /// Stale paths are collected under the lock in one pass from tail to
    /// head, stopping once `max_evictions_per_sweep` are found. With few
    /// stale entries that pass visits the whole list, so it costs O(n) while
    /// foreground calls wait. Each eviction then takes the lock on its own.
    pub fn sweep_now(&self) -> usize {
        let now = Instant::now();
        let stale: Vec<PathBuf> = {
            let state = self.state.lock();
            state
                .list
                .iter_back()
                .filter(|(_, n)| n.is_stale(now))
                .filter_map(|(_, n)| n.content.as_ref().map(|c| c.path.clone()))
                .take(self.config.max_evictions_per_sweep)
                .collect()
        };

        let mut evicted = 0;
        for path in stale {
            let mut state = self.state.lock();
            let Some(&id) = state.map.get(&path) else {
                continue;
            };
            // A put since collection replaced it with a fresh node
            if state.list.get(id).is_some_and(|n| n.is_stale(now)) {
                state.evict(id);
                state.stats.expirations += 1;
                evicted += 1;
            }
        }
        evicted
    }

    /// Stop the background janitor. Idempotent; returns `false` when it was
    /// already stopped or never started.
    pub fn stop_janitor(&self) -> bool {
        let janitor = self.janitor.lock().take();
        match janitor {
            Some(mut janitor) => janitor.stop(),
            None => false,
        }
    }

    /// Verify the map, list and weight counters agree
    #[doc(hidden)]
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let state = self.state.lock();
        let mut seen = 0usize;
        let mut weight = 2 * self.sentinel_weight;

        for (id, node) in state.list.iter_front() {
            let content = node
                .content
                .as_ref()
                .ok_or_else(|| format!("vacant node {:?} linked into list", id))?;
            match state.map.get(&content.path) {
                Some(&mapped) if mapped == id => {}
                other => {
                    return Err(format!(
                        "{} maps to {:?}, list has {:?}",
                        content.path.display(),
                        other,
                        id
                    ));
                }
            }
            weight += content.weight;
            seen += 1;
        }

        if seen != state.map.len() || seen != state.list.len() {
            return Err(format!(
                "list walk saw {} nodes, map has {}, list counts {}",
                seen,
                state.map.len(),
                state.list.len()
            ));
        }
        if weight != state.current_weight {
            return Err(format!(
                "current weight {} != summed weight {}",
                state.current_weight, weight
            ));
        }
        Ok(())
    }
}

impl Drop for DirectoryEntryCache {
    fn drop(&mut self) {
        // Dropping the janitor closes its stop channel
        self.janitor.get_mut().take();
    }
}
