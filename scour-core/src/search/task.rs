use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use super::cancel::CancellationToken;
use super::progress::SearchStatus;
use crate::entry::FileSystemEntry;
use crate::query::Predicate;

/// How long a blocked worker or scheduler waits before re-checking cancellation
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// One directory to list, with the compiled filter to apply to its children
#[derive(Debug, Clone)]
pub struct SearchTask {
    pub dir: PathBuf,
    pub filter: Arc<Predicate>,
}

impl SearchTask {
    pub fn new(dir: PathBuf, filter: Arc<Predicate>) -> Self {
        Self { dir, filter }
    }

    /// List the directory's immediate children and send the matches.
    ///
    /// Returns `false` when the search should stop: cancellation was
    /// observed or nobody is receiving results any more.
    fn run(
        &self,
        results: &Sender<FileSystemEntry>,
        token: &CancellationToken,
        status: &SearchStatus,
    ) -> bool {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(r) => r,
            Err(e) => {
                log::debug!("skipping unreadable directory {}: {}", self.dir.display(), e);
                SearchStatus::bump(&status.errors);
                return true;
            }
        };
        SearchStatus::bump(&status.dirs_scanned);

        for dir_entry in read_dir {
            if token.is_cancelled() {
                return false;
            }

            let dir_entry = match dir_entry {
                Ok(e) => e,
                Err(_) => {
                    SearchStatus::bump(&status.errors);
                    continue;
                }
            };
            let metadata = match dir_entry.metadata() {
                Ok(m) => m,
                Err(_) => {
                    SearchStatus::bump(&status.errors);
                    continue;
                }
            };

            let entry = FileSystemEntry::from_metadata(dir_entry.path(), &metadata);
            SearchStatus::bump(&status.entries_checked);

            if self.filter.matches(&entry) {
                SearchStatus::bump(&status.matches);
                if results.send(entry).is_err() {
                    return false;
                }
            }
        }
        true
    }
}

/// Pull tasks until the queue closes or the search is cancelled
pub(crate) fn worker_loop(
    tasks: Receiver<SearchTask>,
    results: Sender<FileSystemEntry>,
    token: CancellationToken,
    status: Arc<SearchStatus>,
) {
    while !token.is_cancelled() {
        match tasks.recv_timeout(POLL_INTERVAL) {
            Ok(task) => {
                if !task.run(&results, &token, &status) {
                    // The listing was abandoned part way; a vanished
                    // consumer also stops the whole search
                    status.mark_interrupted();
                    token.cancel();
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}
