// Run with: cargo run --example debug_search -- /path/to/search [query...]

use scour_core::{SearchEngine, SearchParams};
use std::path::PathBuf;
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let query: Vec<String> = args.collect();

    let params = match SearchParams::parse_query(&path, &query.join(" ")) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("bad query: {e}");
            std::process::exit(2);
        }
    };
    println!("Searching: {:?}", params);

    let engine = SearchEngine::default();
    let handle = match engine.start(params) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("search failed: {e}");
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    let mut last_print = Instant::now();
    let mut last_checked = 0u64;
    let mut stuck_count = 0;
    let mut received = 0u64;

    loop {
        match handle.results().recv_timeout(Duration::from_millis(100)) {
            Ok(_) => received += 1,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        if now.duration_since(last_print) < Duration::from_secs(1) {
            continue;
        }

        let p = handle.progress();
        // Same entry count across prints means the walk is blocked somewhere
        if p.entries_checked == last_checked {
            stuck_count += 1;
        } else {
            stuck_count = 0;
        }
        last_checked = p.entries_checked;

        println!(
            "[{:>6.1}s] state={:<10?} dirs={:<8} checked={:<10} matches={:<8} received={:<8} errors={:<4} stuck={}",
            start.elapsed().as_secs_f64(),
            handle.state(),
            p.dirs_scanned,
            p.entries_checked,
            p.matches,
            received,
            p.errors,
            stuck_count
        );
        last_print = now;
    }

    let outcome = handle.collect();
    println!(
        "\nFinal: {} after {:.1}s, {} matches in {} directories",
        if outcome.cancelled { "cancelled" } else { "completed" },
        start.elapsed().as_secs_f64(),
        scour_core::format_count(received),
        scour_core::format_count(outcome.progress.dirs_scanned)
    );
}
