use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

/// Lifecycle of one search invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SearchState {
    /// Handle built, threads not yet running
    Created = 0,
    /// Subtree walk in progress, workers consuming concurrently
    Scheduling = 1,
    /// Walk finished, workers draining the remaining tasks
    Running = 2,
    /// Every scheduled directory was processed
    Completed = 3,
    /// Stopped before covering the subtree (`cancel`, a deadline, or a
    /// dropped consumer)
    Cancelled = 4,
}

impl SearchState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SearchState::Created,
            1 => SearchState::Scheduling,
            2 => SearchState::Running,
            3 => SearchState::Completed,
            _ => SearchState::Cancelled,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, SearchState::Completed | SearchState::Cancelled)
    }
}

/// Search statistics at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchProgress {
    /// Directories listed by workers
    pub dirs_scanned: u64,
    /// Children run through the predicate
    pub entries_checked: u64,
    pub matches: u64,
    /// Directories or entries that could not be read
    pub errors: u64,
}

/// State and counters shared by the scheduler, workers and handle
#[derive(Debug)]
pub(crate) struct SearchStatus {
    state: AtomicU8,
    /// Set when some part of the subtree was skipped because of cancellation
    interrupted: AtomicBool,
    pub(crate) dirs_scanned: AtomicU64,
    pub(crate) entries_checked: AtomicU64,
    pub(crate) matches: AtomicU64,
    pub(crate) errors: AtomicU64,
}

impl SearchStatus {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(SearchState::Created as u8),
            interrupted: AtomicBool::new(false),
            dirs_scanned: AtomicU64::new(0),
            entries_checked: AtomicU64::new(0),
            matches: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub(crate) fn state(&self) -> SearchState {
        SearchState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn set_state(&self, state: SearchState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub(crate) fn mark_interrupted(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SearchProgress {
        SearchProgress {
            dirs_scanned: self.dirs_scanned.load(Ordering::Relaxed),
            entries_checked: self.entries_checked.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
