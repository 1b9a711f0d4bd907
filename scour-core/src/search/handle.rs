use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;

use super::cancel::CancellationToken;
use super::progress::{SearchProgress, SearchState, SearchStatus};
use crate::entry::FileSystemEntry;

/// Everything a batch search produced
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Matches in arrival order, which is not deterministic
    pub entries: Vec<FileSystemEntry>,
    /// Whether the search stopped before covering the whole subtree
    pub cancelled: bool,
    pub progress: SearchProgress,
}

/// A running search.
///
/// Results arrive on [`SearchHandle::results`] as workers find them; the
/// channel closes once every worker has exited. Dropping the handle before
/// the search finishes cancels it.
#[derive(Debug)]
pub struct SearchHandle {
    root: PathBuf,
    results: Receiver<FileSystemEntry>,
    token: CancellationToken,
    status: Arc<SearchStatus>,
    supervisor: Option<JoinHandle<()>>,
    detached: bool,
}

impl SearchHandle {
    pub(crate) fn new(
        root: PathBuf,
        results: Receiver<FileSystemEntry>,
        token: CancellationToken,
        status: Arc<SearchStatus>,
        supervisor: JoinHandle<()>,
    ) -> Self {
        Self {
            root,
            results,
            token,
            status,
            supervisor: Some(supervisor),
            detached: false,
        }
    }

    /// Root of the searched subtree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Live result stream; iterate until it closes
    pub fn results(&self) -> &Receiver<FileSystemEntry> {
        &self.results
    }

    /// Stop scheduling and stop workers after their current entry
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn state(&self) -> SearchState {
        self.status.state()
    }

    pub fn progress(&self) -> SearchProgress {
        self.status.snapshot()
    }

    pub fn is_finished(&self) -> bool {
        self.state().is_finished()
    }

    /// Drain every result, blocking until the search completes or is cancelled
    pub fn collect(mut self) -> SearchOutcome {
        let entries: Vec<FileSystemEntry> = self.results.iter().collect();
        self.join();
        SearchOutcome {
            entries,
            cancelled: self.state() == SearchState::Cancelled,
            progress: self.progress(),
        }
    }

    /// Keep only the result channel. The search keeps running until the
    /// channel is drained or dropped.
    pub fn into_stream(mut self) -> Receiver<FileSystemEntry> {
        self.detached = true;
        self.results.clone()
    }

    /// Wait for the supervisor, which only exits after all workers have
    fn join(&mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            let _ = supervisor.join();
        }
    }
}

impl Drop for SearchHandle {
    fn drop(&mut self) {
        if !self.detached && !self.is_finished() {
            self.token.cancel();
        }
    }
}
