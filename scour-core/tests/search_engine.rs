use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use filetime::FileTime;
use scour_core::{KindFilter, ScourError, SearchConfig, SearchEngine, SearchParams, SearchState};
use tempfile::TempDir;

/// `dirs` directories of `files_per_dir` files each, half `.txt` and half `.bin`
fn build_tree(root: &Path, dirs: usize, files_per_dir: usize) -> HashSet<PathBuf> {
    let mut txt = HashSet::new();
    for d in 0..dirs {
        let dir = root.join(format!("group-{}", d % 8)).join(format!("dir-{d}"));
        fs::create_dir_all(&dir).unwrap();
        for f in 0..files_per_dir {
            let ext = if f % 2 == 0 { "txt" } else { "bin" };
            let path = dir.join(format!("file-{f}.{ext}"));
            fs::write(&path, "data").unwrap();
            if ext == "txt" {
                txt.insert(path);
            }
        }
    }
    txt
}

fn engine(workers: usize) -> SearchEngine {
    SearchEngine::new(SearchConfig {
        workers,
        queue_depth: 16,
        ..SearchConfig::default()
    })
}

fn canonical_root(temp: &TempDir) -> PathBuf {
    temp.path().canonicalize().unwrap()
}

#[test]
fn test_batch_search_is_complete_and_exact() {
    let temp = TempDir::new().unwrap();
    let root = canonical_root(&temp);
    let expected = build_tree(&root, 40, 10);

    let params = SearchParams::new(&root)
        .with_extensions(["txt"])
        .with_kind(KindFilter::Files);
    let found: Vec<PathBuf> = engine(4)
        .run_batch(params)
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();

    // No duplicates, nothing missing, nothing extra
    let unique: HashSet<PathBuf> = found.iter().cloned().collect();
    assert_eq!(unique.len(), found.len());
    assert_eq!(unique, expected);
}

#[test]
fn test_worker_count_does_not_change_results() {
    let temp = TempDir::new().unwrap();
    let root = canonical_root(&temp);
    let expected = build_tree(&root, 20, 6);

    for workers in [1, 3, 16] {
        let params = SearchParams::new(&root).with_extensions(["TXT"]);
        let found: HashSet<PathBuf> = engine(workers)
            .run_batch(params)
            .unwrap()
            .into_iter()
            .map(|e| e.path)
            .collect();
        assert_eq!(found, expected, "workers = {workers}");
    }
}

#[test]
fn test_streaming_delivers_every_match() {
    let temp = TempDir::new().unwrap();
    let root = canonical_root(&temp);
    let expected = build_tree(&root, 12, 4);

    let handle = engine(4)
        .run_streaming(SearchParams::new(&root).with_extensions(["txt"]))
        .unwrap();
    let found: HashSet<PathBuf> = handle.results().iter().map(|e| e.path).collect();

    assert_eq!(found, expected);
    let outcome = handle.collect();
    assert!(outcome.entries.is_empty());
    assert!(!outcome.cancelled);
    assert_eq!(outcome.progress.matches, expected.len() as u64);
}

#[test]
fn test_detached_stream_closes_when_done() {
    let temp = TempDir::new().unwrap();
    let root = canonical_root(&temp);
    let expected = build_tree(&root, 6, 4);

    let stream = engine(2)
        .run_streaming(SearchParams::new(&root).with_extensions(["txt"]))
        .unwrap()
        .into_stream();
    let found: HashSet<PathBuf> = stream.iter().map(|e| e.path).collect();

    assert_eq!(found, expected);
}

#[test]
fn test_cancel_stops_a_large_search() {
    let temp = TempDir::new().unwrap();
    let root = canonical_root(&temp);
    let expected = build_tree(&root, 300, 20);

    let handle = engine(1)
        .start(SearchParams::new(&root).with_extensions(["txt"]))
        .unwrap();
    handle.cancel();

    let started = Instant::now();
    let outcome = handle.collect();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(outcome.cancelled);
    assert!(outcome.entries.len() < expected.len());
}

#[test]
fn test_cancel_mid_stream() {
    let temp = TempDir::new().unwrap();
    let root = canonical_root(&temp);
    build_tree(&root, 100, 10);

    let handle = engine(2).start(SearchParams::new(&root)).unwrap();
    let first = handle.results().recv().unwrap();
    assert!(first.path.starts_with(&root));

    handle.cancel();
    // The channel still closes and the final state becomes visible
    let started = Instant::now();
    let _: Vec<_> = handle.results().iter().collect();
    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(handle.collect().cancelled);
}

#[test]
fn test_expired_deadline_cancels_search() {
    let temp = TempDir::new().unwrap();
    let root = canonical_root(&temp);
    build_tree(&root, 10, 4);

    let engine = SearchEngine::new(SearchConfig {
        timeout: Some(Duration::ZERO),
        ..SearchConfig::default()
    });
    let handle = engine.start(SearchParams::new(&root)).unwrap();
    let outcome = handle.collect();

    assert!(outcome.cancelled);
    assert!(outcome.entries.is_empty());
}

#[test]
fn test_finished_handle_reports_completed() {
    let temp = TempDir::new().unwrap();
    let root = canonical_root(&temp);
    build_tree(&root, 2, 2);

    let handle = engine(2).start(SearchParams::new(&root)).unwrap();
    let _: Vec<_> = handle.results().iter().collect();
    assert_eq!(handle.state(), SearchState::Completed);
    assert!(handle.is_finished());
}

#[test]
fn test_query_with_date_and_size_filters() {
    let temp = TempDir::new().unwrap();
    let root = canonical_root(&temp);
    let logs = root.join("var/logs");
    fs::create_dir_all(&logs).unwrap();

    let set_mtime = |name: &str, contents: &[u8], unix: i64| {
        let path = logs.join(name);
        fs::write(&path, contents).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(unix, 0)).unwrap();
        path
    };
    // 2020-01-01, 2022-06-15, 2024-01-01 (UTC)
    set_mtime("old.log", &[0; 2048], 1_577_836_800);
    let wanted = set_mtime("mid.log", &[0; 2048], 1_655_251_200);
    set_mtime("new.log", &[0; 2048], 1_704_067_200);
    set_mtime("small.log", b"x", 1_655_251_200);
    set_mtime("mid.txt", &[0; 2048], 1_655_251_200);

    let params = SearchParams::parse_query(
        &root,
        "type:log size:>=1kb after:2021-01-01 before:2023-01-01",
    )
    .unwrap();
    let found: Vec<PathBuf> = SearchEngine::default()
        .run_batch(params)
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();

    assert_eq!(found, vec![wanted]);
}

#[test]
fn test_invalid_requests_fail_before_searching() {
    let temp = TempDir::new().unwrap();
    let engine = SearchEngine::default();

    let err = engine
        .start(SearchParams::new(temp.path()).with_size_range(10, 5))
        .unwrap_err();
    assert!(matches!(err, ScourError::InvalidQuery(_)));

    let err = engine
        .start(SearchParams::new(temp.path()).with_glob("[unclosed"))
        .unwrap_err();
    assert!(matches!(err, ScourError::InvalidQuery(_)));
}

#[test]
fn test_directories_named_like_pseudo_filesystems_are_searched() {
    let temp = TempDir::new().unwrap();
    let root = canonical_root(&temp);
    let mut expected = HashSet::new();
    for rel in ["dev/project/main.rs", "proc/a.rs", "sys/b.rs", "src/c.rs"] {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "fn main() {}").unwrap();
        expected.insert(path);
    }

    // Default config, so system path skipping is on
    let found: HashSet<PathBuf> = SearchEngine::default()
        .run_batch(SearchParams::new(&root).with_extensions(["rs"]))
        .unwrap()
        .into_iter()
        .map(|e| e.path)
        .collect();

    assert_eq!(found, expected);
}
