use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};
use jwalk::WalkDir;
use parking_lot::Mutex;

use super::cancel::CancellationToken;
use super::handle::SearchHandle;
use super::progress::{SearchState, SearchStatus};
use super::task::{POLL_INTERVAL, SearchTask, worker_loop};
use crate::entry::FileSystemEntry;
use crate::error::{Result, ScourError};
use crate::query::{Predicate, SearchParams};

/// Search engine configuration
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Worker threads listing directories
    pub workers: usize,
    /// Capacity of the task queue between scheduler and workers
    pub queue_depth: usize,
    /// Follow symbolic links while walking
    pub follow_symlinks: bool,
    /// Skip pseudo filesystems and known slow system paths
    pub skip_virtual_paths: bool,
    /// Threads used by the subtree walk (0 = auto)
    pub walk_threads: usize,
    /// Cancel searches automatically after this long
    pub timeout: Option<Duration>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            workers: 16,
            queue_depth: 1000,
            follow_symlinks: false,
            skip_virtual_paths: true,
            walk_threads: 0, // auto
            timeout: None,
        }
    }
}

/// Kernel pseudo filesystems and per-user temp trees, only when they hang
/// off the filesystem root
const VIRTUAL_ROOTS: &[&str] = &[
    "/proc",
    "/sys",
    "/dev",
    "/run/user",
    "/private/var/folders",
];

/// Directory names that are only ever created by the system
const SYSTEM_DIR_NAMES: &[&str] = &[
    ".Spotlight-V100",
    ".fseventsd",
    ".DocumentRevisions-V100",
    ".MobileBackups",
];

/// Whether to prune `path` from the walk. Nothing is pruned at or above the
/// root, and a search rooted inside a skipped tree walks that tree.
fn is_virtual_path(path: &Path, root: &Path) -> bool {
    if path == root || root.starts_with(path) {
        return false;
    }

    // Path::starts_with compares whole components, so `/home/me/dev` is kept
    if VIRTUAL_ROOTS
        .iter()
        .any(|prefix| path.starts_with(prefix) && !root.starts_with(prefix))
    {
        return true;
    }

    let below_root = path.strip_prefix(root).unwrap_or(path);
    below_root.components().any(|component| match component {
        Component::Normal(name) => name
            .to_str()
            .is_some_and(|name| SYSTEM_DIR_NAMES.contains(&name)),
        _ => false,
    })
}

/// Concurrent subtree search: one scheduler walks the tree and queues a task
/// per directory, a fixed pool of workers lists each directory and sends
/// matching children to the result channel.
#[derive(Debug)]
pub struct SearchEngine {
    config: SearchConfig,
    active: Mutex<Option<ActiveSearch>>,
}

/// The most recently started search, kept so a new one can supersede it
#[derive(Debug)]
struct ActiveSearch {
    token: CancellationToken,
    status: Arc<SearchStatus>,
}

impl ActiveSearch {
    /// Cancel if still running; a finished search is left alone
    fn cancel(self) -> bool {
        if self.status.state().is_finished() {
            return false;
        }
        self.token.cancel();
        true
    }
}

impl SearchEngine {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Start a search and return immediately.
    ///
    /// Fails only if the parameters or the root directory are invalid; errors
    /// met during the walk are logged and skipped. Starting a search cancels
    /// the previous one started by this engine.
    pub fn start(&self, params: SearchParams) -> Result<SearchHandle> {
        params.validate()?;
        let root = validate_root(&params.base_dir)?;
        if params.search_content {
            log::warn!("content search is not supported, matching names and metadata only");
        }
        let filter = Arc::new(Predicate::new(&params)?);

        let token = match self.config.timeout {
            Some(timeout) => CancellationToken::with_timeout(timeout),
            None => CancellationToken::new(),
        };
        let status = Arc::new(SearchStatus::new());
        let previous = self.active.lock().replace(ActiveSearch {
            token: token.clone(),
            status: Arc::clone(&status),
        });
        if let Some(previous) = previous {
            previous.cancel();
        }

        let workers = self.config.workers.max(1);
        let (task_tx, task_rx) = crossbeam_channel::bounded(self.config.queue_depth.max(1));
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let started = Instant::now();

        log::info!(
            "searching {} with {} workers ({:?})",
            root.display(),
            workers,
            params
        );

        let spawned = self.spawn_threads(
            &root, filter, workers, task_tx, task_rx, result_tx, &token, &status, started,
        );
        let supervisor = match spawned {
            Ok(supervisor) => supervisor,
            Err(e) => {
                token.cancel();
                return Err(e);
            }
        };

        Ok(SearchHandle::new(root, result_rx, token, status, supervisor))
    }

    /// Run a search to completion and return every match
    pub fn run_batch(&self, params: SearchParams) -> Result<Vec<FileSystemEntry>> {
        Ok(self.start(params)?.collect().entries)
    }

    /// Start a search whose matches are consumed as they are found
    pub fn run_streaming(&self, params: SearchParams) -> Result<SearchHandle> {
        self.start(params)
    }

    /// Cancel the most recently started search. Returns `false` if there was
    /// none or it had already finished.
    pub fn cancel(&self) -> bool {
        self.active.lock().take().is_some_and(ActiveSearch::cancel)
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_threads(
        &self,
        root: &Path,
        filter: Arc<Predicate>,
        workers: usize,
        task_tx: Sender<SearchTask>,
        task_rx: Receiver<SearchTask>,
        result_tx: Sender<FileSystemEntry>,
        token: &CancellationToken,
        status: &Arc<SearchStatus>,
        started: Instant,
    ) -> Result<thread::JoinHandle<()>> {
        let scheduler = {
            let scheduler = Scheduler {
                root: root.to_path_buf(),
                filter,
                follow_symlinks: self.config.follow_symlinks,
                skip_virtual_paths: self.config.skip_virtual_paths,
                walk_threads: self.config.walk_threads,
                token: token.clone(),
                status: Arc::clone(status),
            };
            thread::Builder::new()
                .name("scour-scheduler".to_string())
                .spawn(move || scheduler.run(task_tx))?
        };

        let mut worker_handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let tasks = task_rx.clone();
            let results = result_tx.clone();
            let token = token.clone();
            let status = Arc::clone(status);
            let handle = thread::Builder::new()
                .name(format!("scour-worker-{i}"))
                .spawn(move || worker_loop(tasks, results, token, status))?;
            worker_handles.push(handle);
        }
        // Kept by the supervisor to see whether any task was left unprocessed
        let pending = task_rx;

        let status = Arc::clone(status);
        let root = root.to_path_buf();
        let supervisor = thread::Builder::new()
            .name("scour-supervisor".to_string())
            .spawn(move || {
                let _ = scheduler.join();
                for handle in worker_handles {
                    let _ = handle.join();
                }

                let state = final_state(&status, &pending);
                drop(pending);
                status.set_state(state);

                let progress = status.snapshot();
                log::info!(
                    "search in {} {:?} after {:?}: {} matches in {} directories, {} unreadable",
                    root.display(),
                    state,
                    started.elapsed(),
                    progress.matches,
                    progress.dirs_scanned,
                    progress.errors
                );

                // Closing the channel only after the final state is visible
                drop(result_tx);
            })?;

        Ok(supervisor)
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

/// A search is cancelled only if work was actually skipped: the walk stopped
/// early, a listing was abandoned, or queued tasks were never taken. An
/// expired deadline on a search that already covered everything is not.
fn final_state(status: &SearchStatus, pending: &Receiver<SearchTask>) -> SearchState {
    if status.is_interrupted() || !pending.is_empty() {
        SearchState::Cancelled
    } else {
        SearchState::Completed
    }
}

/// Canonicalize the search root and make sure it is a readable directory
fn validate_root(base_dir: &Path) -> Result<PathBuf> {
    let metadata = fs::metadata(base_dir).map_err(|e| ScourError::from_io(e, base_dir))?;
    if !metadata.is_dir() {
        return Err(ScourError::NotADirectory(base_dir.to_path_buf()));
    }
    Ok(base_dir
        .canonicalize()
        .unwrap_or_else(|_| base_dir.to_path_buf()))
}

/// Walks the subtree and queues one task per directory, root included
struct Scheduler {
    root: PathBuf,
    filter: Arc<Predicate>,
    follow_symlinks: bool,
    skip_virtual_paths: bool,
    walk_threads: usize,
    token: CancellationToken,
    status: Arc<SearchStatus>,
}

impl Scheduler {
    /// Dropping `tasks` on return closes the queue
    fn run(self, tasks: Sender<SearchTask>) {
        self.status.set_state(SearchState::Scheduling);

        let skip_virtual = self.skip_virtual_paths;
        let root_for_filter = self.root.clone();
        let walker = WalkDir::new(&self.root)
            .skip_hidden(false)
            .follow_links(self.follow_symlinks)
            .sort(false)
            .process_read_dir(move |_depth, path, _read_dir_state, children| {
                if skip_virtual && is_virtual_path(path, &root_for_filter) {
                    children.clear();
                    return;
                }

                // Files are matched by the worker listing their parent, so the
                // walk only needs directories. Unreadable children are dropped.
                children.retain(|entry| match entry {
                    Ok(e) => {
                        e.file_type().is_dir()
                            && !(skip_virtual && is_virtual_path(&e.path(), &root_for_filter))
                    }
                    Err(_) => false,
                });
            });

        let walker = if self.walk_threads > 0 {
            walker.parallelism(jwalk::Parallelism::RayonNewPool(self.walk_threads))
        } else {
            walker
        };

        for entry_result in walker {
            if self.token.is_cancelled() {
                self.status.mark_interrupted();
                return;
            }

            let entry = match entry_result {
                Ok(e) => e,
                Err(e) => {
                    log::debug!("walk error under {}: {}", self.root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let task = SearchTask::new(entry.path(), Arc::clone(&self.filter));
            if !self.enqueue(&tasks, task) {
                self.status.mark_interrupted();
                return;
            }
        }

        self.status.set_state(SearchState::Running);
    }

    /// Block until the task is queued, giving up on cancellation or when
    /// every worker has gone
    fn enqueue(&self, tasks: &Sender<SearchTask>, mut task: SearchTask) -> bool {
        loop {
            match tasks.send_timeout(task, POLL_INTERVAL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(t)) => {
                    if self.token.is_cancelled() {
                        return false;
                    }
                    task = t;
                }
                Err(SendTimeoutError::Disconnected(_)) => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_is_virtual_path() {
        let root = Path::new("/");
        assert!(is_virtual_path(Path::new("/proc"), root));
        assert!(is_virtual_path(Path::new("/proc/1/fd"), root));
        assert!(is_virtual_path(Path::new("/sys/class"), root));
        assert!(!is_virtual_path(Path::new("/home/user/procedures"), root));
        assert!(!is_virtual_path(Path::new("/"), root));

        // Ordinary directories that share a name with a pseudo filesystem
        assert!(!is_virtual_path(Path::new("/home/user/dev"), root));
        assert!(!is_virtual_path(Path::new("/home/user/dev/project"), root));
        assert!(!is_virtual_path(Path::new("/srv/proc"), root));
        assert!(!is_virtual_path(Path::new("/opt/sys/include"), root));
        assert!(is_virtual_path(Path::new("/dev"), root));
        assert!(is_virtual_path(Path::new("/dev/shm"), root));

        // System-only directory names are skipped wherever they appear
        let home = Path::new("/Users/me");
        assert!(is_virtual_path(Path::new("/Users/me/.fseventsd"), home));
        assert!(is_virtual_path(
            Path::new("/Volumes/usb/.Spotlight-V100/store"),
            Path::new("/Volumes")
        ));
        assert!(!is_virtual_path(Path::new("/Users/me/.fseventsd-notes"), home));
        assert!(!is_virtual_path(
            Path::new("/Volumes/usb/.Spotlight-V100/store"),
            Path::new("/Volumes/usb/.Spotlight-V100")
        ));

        // Searching inside a virtual tree on purpose is allowed
        let root = Path::new("/proc/self");
        assert!(!is_virtual_path(Path::new("/proc/self/fd"), root));
        assert!(!is_virtual_path(Path::new("/proc"), root));
    }

    #[test]
    fn test_root_validation() {
        let engine = SearchEngine::default();
        let temp = TempDir::new().unwrap();

        let err = engine.start(SearchParams::default()).unwrap_err();
        assert!(matches!(err, ScourError::EmptyBaseDir));

        let err = engine.start(SearchParams::new(temp.path().join("missing"))).unwrap_err();
        assert!(matches!(err, ScourError::PathNotFound(_)));

        let file = temp.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        let err = engine.start(SearchParams::new(&file)).unwrap_err();
        assert!(matches!(err, ScourError::NotADirectory(_)));
    }

    #[test]
    fn test_batch_search_finds_nested_matches() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b/c")).unwrap();
        fs::write(temp.path().join("top.rs"), "").unwrap();
        fs::write(temp.path().join("a/mid.rs"), "").unwrap();
        fs::write(temp.path().join("a/b/c/deep.rs"), "").unwrap();
        fs::write(temp.path().join("a/b/notes.md"), "").unwrap();

        let engine = SearchEngine::new(SearchConfig {
            workers: 4,
            ..SearchConfig::default()
        });
        let params = SearchParams::new(temp.path()).with_extensions(["rs"]);
        let names: HashSet<String> = engine
            .run_batch(params)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();

        let expected: HashSet<String> = ["top.rs", "mid.rs", "deep.rs"].map(String::from).into();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_directories_match_too() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("photos/photos-2024")).unwrap();
        fs::write(temp.path().join("photos/photo.jpg"), "").unwrap();

        let engine = SearchEngine::default();
        let params = SearchParams::new(temp.path()).with_name("photos");
        let mut found: Vec<(String, bool)> = engine
            .run_batch(params)
            .unwrap()
            .into_iter()
            .map(|e| (e.name, e.is_dir))
            .collect();
        found.sort();

        assert_eq!(
            found,
            [("photos".to_string(), true), ("photos-2024".to_string(), true)]
        );
    }

    #[test]
    fn test_new_search_cancels_previous() {
        let temp = TempDir::new().unwrap();
        let engine = SearchEngine::default();

        let first = engine.start(SearchParams::new(temp.path())).unwrap();
        let first_token = first.cancellation_token();
        let second = engine.start(SearchParams::new(temp.path())).unwrap();
        assert!(first_token.is_cancelled());

        // Once the second search has run to the end there is nothing to cancel
        let outcome = second.collect();
        assert!(!outcome.cancelled);
        assert!(!engine.cancel());
    }

    #[test]
    fn test_cancel_reports_running_search() {
        let temp = TempDir::new().unwrap();
        for i in 0..200 {
            let dir = temp.path().join(format!("d{i}"));
            fs::create_dir(&dir).unwrap();
            fs::write(dir.join("f.txt"), "x").unwrap();
        }
        let engine = SearchEngine::new(SearchConfig {
            workers: 1,
            ..SearchConfig::default()
        });

        let handle = engine.start(SearchParams::new(temp.path())).unwrap();
        assert!(engine.cancel());
        assert!(handle.collect().cancelled);
        assert!(!engine.cancel());
    }

    #[test]
    fn test_final_state_ignores_expired_deadline() {
        let (_task_tx, pending) = crossbeam_channel::bounded::<SearchTask>(1);
        let status = SearchStatus::new();
        let token = CancellationToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());

        // Everything was processed before the deadline fired
        assert_eq!(final_state(&status, &pending), SearchState::Completed);

        status.mark_interrupted();
        assert_eq!(final_state(&status, &pending), SearchState::Cancelled);
    }

    #[test]
    fn test_final_state_counts_unprocessed_tasks() {
        let temp = TempDir::new().unwrap();
        let (task_tx, pending) = crossbeam_channel::bounded(1);
        let filter = Arc::new(Predicate::new(&SearchParams::new(temp.path())).unwrap());
        task_tx
            .send(SearchTask::new(temp.path().to_path_buf(), filter))
            .unwrap();

        assert_eq!(
            final_state(&SearchStatus::new(), &pending),
            SearchState::Cancelled
        );
    }

    #[test]
    fn test_deadline_after_completion_keeps_completed() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        let engine = SearchEngine::new(SearchConfig {
            timeout: Some(Duration::from_secs(1)),
            ..SearchConfig::default()
        });

        let handle = engine.start(SearchParams::new(temp.path())).unwrap();
        let found: Vec<_> = handle.results().iter().collect();
        assert_eq!(found.len(), 1);

        thread::sleep(Duration::from_millis(1200));
        assert!(handle.cancellation_token().is_cancelled());
        assert_eq!(handle.state(), SearchState::Completed);
        assert!(!handle.collect().cancelled);
    }
}
