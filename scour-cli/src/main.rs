use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use scour_core::{
    Config, ConfigOverrides, DirectoryEntryCache, Explorer, FileSystemEntry, SearchEngine,
    SearchParams, format_count, format_size,
};
use sysinfo::System;

/// SCOUR - cached directory listing and concurrent file search
#[derive(Parser, Debug)]
#[command(name = "scour")]
#[command(about = "List directories through an LRU cache and search subtrees concurrently")]
#[command(version)]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List one directory
    Ls {
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Scan the directory even if a cached listing exists
        #[arg(long)]
        no_cache: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Search a subtree, e.g. `scour search ~/src report type:pdf size:>1mb`
    Search {
        path: PathBuf,

        /// Bare words match the name prefix; `key:value` terms add filters
        query: Vec<String>,

        /// Print matches as they are found
        #[arg(long)]
        stream: bool,

        /// One JSON object per match
        #[arg(long)]
        json: bool,

        /// Cancel the search after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Number of worker threads
        #[arg(short, long)]
        workers: Option<usize>,

        /// Stop after this many matches
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config_path = args.config.clone().or_else(Config::default_path);
    let mut config = match &config_path {
        Some(path) => Config::load(path)
            .wrap_err_with(|| format!("failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    match args.command {
        Command::Ls {
            path,
            no_cache,
            json,
        } => run_ls(&config, &path, !no_cache, json),
        Command::Search {
            path,
            query,
            stream,
            json,
            timeout,
            workers,
            limit,
        } => {
            config.merge(&ConfigOverrides {
                workers,
                timeout_secs: timeout,
                ..ConfigOverrides::default()
            });
            config.validate()?;
            let params = SearchParams::parse_query(path, &query.join(" "))?;
            let output = Output { json, limit };
            if stream {
                run_stream(&config, params, &output)
            } else {
                run_batch(&config, params, &output)
            }
        }
    }
}

fn run_ls(config: &Config, path: &Path, use_cache: bool, json: bool) -> Result<()> {
    let mut system = System::new();
    system.refresh_memory();
    let cache = DirectoryEntryCache::new(config.cache_config(system.total_memory()));
    let explorer = Explorer::new(Arc::clone(&cache));

    let listing = explorer.list_dir(path, use_cache)?;

    let mut entries: Vec<&FileSystemEntry> = listing.entries().collect();
    // Directories first, then by name
    entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &entries)?;
        writeln!(out)?;
    } else {
        for entry in &entries {
            writeln!(out, "{}", format_row(entry, false))?;
        }
        writeln!(
            out,
            "\n{} dirs, {} files",
            format_count(listing.sub_dirs.len() as u64),
            format_count(listing.files.len() as u64)
        )?;
    }
    if let Some(error) = &listing.error {
        log::warn!("partial listing of {}: {}", listing.path.display(), error);
    }

    cache.stop_janitor();
    Ok(())
}

struct Output {
    json: bool,
    limit: Option<usize>,
}

impl Output {
    fn print(&self, out: &mut impl Write, entry: &FileSystemEntry) -> Result<()> {
        if self.json {
            serde_json::to_writer(&mut *out, entry)?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", format_row(entry, true))?;
        }
        Ok(())
    }

    fn limit_reached(&self, printed: usize) -> bool {
        self.limit.is_some_and(|limit| printed >= limit)
    }
}

fn run_batch(config: &Config, params: SearchParams, output: &Output) -> Result<()> {
    let engine = SearchEngine::new(config.search_config());
    let start = Instant::now();
    let outcome = engine.start(params)?.collect();

    let mut entries = outcome.entries;
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    if let Some(limit) = output.limit {
        entries.truncate(limit);
    }

    let mut out = io::stdout().lock();
    for entry in &entries {
        output.print(&mut out, entry)?;
    }

    if !output.json {
        eprintln!(
            "{} matches in {} directories ({:.2}s){}",
            format_count(entries.len() as u64),
            format_count(outcome.progress.dirs_scanned),
            start.elapsed().as_secs_f64(),
            if outcome.cancelled { ", cancelled" } else { "" }
        );
    }
    Ok(())
}

fn run_stream(config: &Config, params: SearchParams, output: &Output) -> Result<()> {
    let engine = SearchEngine::new(config.search_config());
    let start = Instant::now();
    let handle = engine.start(params)?;

    let mut out = io::stdout().lock();
    let mut printed = 0;
    for entry in handle.results() {
        output.print(&mut out, &entry)?;
        out.flush()?;
        printed += 1;
        if output.limit_reached(printed) {
            handle.cancel();
            break;
        }
    }

    let progress = handle.progress();
    if !output.json {
        eprintln!(
            "{} matches in {} directories ({:.2}s)",
            format_count(printed as u64),
            format_count(progress.dirs_scanned),
            start.elapsed().as_secs_f64()
        );
    }
    Ok(())
}

fn format_row(entry: &FileSystemEntry, full_path: bool) -> String {
    let modified: DateTime<Local> = entry.modified_at.into();
    let size = if entry.is_dir {
        "-".to_string()
    } else {
        format_size(entry.size)
    };
    let name = if full_path {
        entry.path.display().to_string()
    } else if entry.is_dir {
        format!("{}/", entry.name)
    } else {
        entry.name.clone()
    };
    format!(
        "{:>10}  {}  {}",
        size,
        modified.format("%Y-%m-%d %H:%M"),
        name
    )
}
