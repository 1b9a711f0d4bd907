pub mod cache;
pub mod config;
pub mod entry;
pub mod error;
pub mod explorer;
pub mod query;
pub mod search;
pub mod size;

pub use cache::{CacheConfig, CacheStats, DirectoryEntryCache, capacity_for_memory};
pub use config::{CacheSettings, Config, ConfigOverrides, SearchSettings};
pub use entry::{DirContent, FileSystemEntry};
pub use error::{Result, ScourError};
pub use explorer::Explorer;
pub use query::{KindFilter, Predicate, SearchParams, SearchRequest, matches};
pub use search::{
    CancellationToken, SearchConfig, SearchEngine, SearchHandle, SearchOutcome, SearchProgress,
    SearchState, SearchTask,
};
pub use size::{format_count, format_size, parse_size};
