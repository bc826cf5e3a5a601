//! dirsnap - capture directory tree snapshots and report what changed.
//!
//! Usage:
//!   dirsnap snapshot [PATH] [-r OUT]          Scan a tree and save a snapshot
//!   dirsnap compare OLD CURRENT [-r REPORT]   Write a JSON report of changes
//!   dirsnap show FILE                         Print the largest entries of a snapshot
//!   dirsnap --help                            Show help

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;

use chrono::{DateTime, Local, TimeZone};
use clap::{ArgAction, Parser, Subcommand};
use color_eyre::eyre::{Context, Result, bail};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use dirsnap_codec::{SNAPSHOT_EXTENSION, read_snapshot_file, write_snapshot_file};
use dirsnap_core::SnapshotNode;
use dirsnap_diff::{CompareConfig, CompareReportNode, KindMismatchPolicy, NodeStatus, TreeComparer};
use dirsnap_scan::{ScanConfig, SnapshotScanner};

/// Scanned when no path is given.
const DEFAULT_ROOT: &str = if cfg!(windows) { "C:\\" } else { "/" };

/// Default name of the compare report.
const DEFAULT_REPORT: &str = "CompareResults.json";

/// Characters that are replaced when deriving a file name from a path.
const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

#[derive(Parser)]
#[command(
    name = "dirsnap",
    version,
    about = "Capture directory tree snapshots and report what changed between them",
    long_about = "dirsnap records the sizes, file counts and modification times of a \
                  directory tree in a compact snapshot file.\n\n\
                  Take a snapshot with `dirsnap snapshot [PATH]`, take another one \
                  later, then run `dirsnap compare OLD CURRENT` to see where disk \
                  space went."
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a directory tree and save a snapshot
    Snapshot {
        /// Directory to scan (defaults to the root of the file system)
        path: Option<PathBuf>,

        /// Snapshot file to write (defaults to a timestamped name)
        #[arg(short = 'r', long = "result")]
        output: Option<PathBuf>,

        /// Number of scanning threads (0 = one per CPU)
        #[arg(short, long, default_value = "0")]
        threads: usize,

        /// Scan the targets of symbolic links
        #[arg(long)]
        follow_symlinks: bool,

        /// Read the snapshot back and check it against the scan
        #[arg(long)]
        verify: bool,
    },

    /// Compare two snapshots and write a report of what changed
    Compare {
        /// Older snapshot file
        old: PathBuf,

        /// Newer snapshot file
        current: PathBuf,

        /// Report file to write
        #[arg(short = 'r', long = "result", default_value = DEFAULT_REPORT)]
        report: PathBuf,

        /// Report entries that changed between file and directory as removed
        /// and new instead of failing
        #[arg(long)]
        split_type_changes: bool,

        /// Also print the report as a tree
        #[arg(short, long)]
        print: bool,
    },

    /// Show the largest entries of a snapshot
    Show {
        /// Snapshot file
        file: PathBuf,

        /// Maximum depth to display
        #[arg(short, long, default_value = "3")]
        depth: u32,

        /// Show all entries (no depth limit on display)
        #[arg(short, long)]
        all: bool,

        /// Number of top entries to show per directory
        #[arg(short = 'n', long, default_value = "10")]
        top: usize,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Snapshot {
            path,
            output,
            threads,
            follow_symlinks,
            verify,
        } => run_snapshot(path, output, threads, follow_symlinks, verify),
        Command::Compare {
            old,
            current,
            report,
            split_type_changes,
            print,
        } => run_compare(&old, &current, &report, split_type_changes, print),
        Command::Show {
            file,
            depth,
            all,
            top,
        } => run_show(&file, if all { None } else { Some(depth) }, top),
    }
}

/// Log to stderr. `RUST_LOG` takes precedence over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Scan a tree and write it as a snapshot file.
fn run_snapshot(
    path: Option<PathBuf>,
    output: Option<PathBuf>,
    threads: usize,
    follow_symlinks: bool,
    verify: bool,
) -> Result<()> {
    let path = scan_root(path);
    let output = output.unwrap_or_else(|| default_snapshot_name(&path, Local::now()));

    info!(path = %path.display(), "generating snapshot");

    let config = ScanConfig::builder()
        .root(path.clone())
        .threads(threads)
        .follow_symlinks(follow_symlinks)
        .build()
        .context("Invalid scan configuration")?;

    let scanner = SnapshotScanner::new();
    let mut progress_rx = scanner.subscribe();
    let reporter = thread::spawn(move || {
        loop {
            match progress_rx.blocking_recv() {
                Ok(progress) if progress.finished => debug!(
                    dirs_per_second = progress.dirs_per_second() as u64,
                    bytes_per_second = %format_size(progress.bytes_per_second() as u64),
                    "scan complete"
                ),
                Ok(progress) => debug!(
                    dirs = progress.dirs_scanned,
                    files = progress.files_scanned,
                    size = %format_size(progress.bytes_scanned),
                    errors = progress.errors_count,
                    path = %progress.current_path.display(),
                    "scanning"
                ),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "progress updates skipped"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let tree = scanner.scan(&config);
    // Closes the progress channel
    drop(scanner);
    if reporter.join().is_err() {
        warn!("progress reporter panicked");
    }
    let tree = tree.with_context(|| format!("Failed to scan {}", path.display()))?;

    write_snapshot_file(&output, &tree.root)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(output = %output.display(), "snapshot written");

    if verify {
        let restored = read_snapshot_file(&output)
            .with_context(|| format!("Failed to read back {}", output.display()))?;
        if let Some(divergence) = restored.find_divergence(&tree.root) {
            bail!("Snapshot verification failed: {divergence}");
        }
        info!("snapshot verified");
    }

    let stats = &tree.stats;
    println!();
    println!("{}", "─".repeat(60));
    println!(" {} - {}", tree.root_path.display(), format_size(stats.total_size));
    println!(
        " {} files, {} directories, {} empty files",
        stats.total_files, stats.total_dirs, stats.empty_files
    );
    if stats.scan_errors > 0 || stats.skipped_entries > 0 {
        println!(
            " {} scan errors, {} entries skipped",
            stats.scan_errors, stats.skipped_entries
        );
    }
    println!(" Scanned in {:.2}s", tree.scan_duration.as_secs_f64());
    println!(" Saved to {}", output.display());
    println!("{}", "─".repeat(60));

    Ok(())
}

/// Compare two snapshot files and write a JSON report.
fn run_compare(old: &Path, current: &Path, report_path: &Path, split: bool, print: bool) -> Result<()> {
    for file in [old, current] {
        if !file.is_file() {
            error!(file = %file.display(), "snapshot file does not exist");
            bail!("{} does not exist", file.display());
        }
    }

    let old_tree =
        read_snapshot_file(old).with_context(|| format!("Failed to read {}", old.display()))?;
    let current_tree = read_snapshot_file(current)
        .with_context(|| format!("Failed to read {}", current.display()))?;

    let policy = if split {
        KindMismatchPolicy::SplitRemovedAdded
    } else {
        KindMismatchPolicy::Fail
    };
    let config = CompareConfig::builder()
        .kind_mismatch(policy)
        .build()
        .context("Invalid compare configuration")?;

    let report = TreeComparer::with_config(config)
        .compare_and_reduce(Some(&old_tree), Some(&current_tree))
        .context("Comparison failed")?;

    let file = File::create(report_path)
        .with_context(|| format!("Failed to create {}", report_path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &report)?;
    writer.flush()?;
    info!(report = %report_path.display(), status = %report.status, "compare report written");

    println!();
    println!("{}", "─".repeat(60));
    println!(" {} - {}", report.name, report.status);
    println!(" Size: {}", format_size_diff(report.total_size_diff));
    println!(
        " Files: +{} -{}",
        report.total_add_files_count, report.total_removed_files_count
    );
    println!("{}", "─".repeat(60));

    if print {
        println!();
        print_report(&report, 0);
    }

    Ok(())
}

/// Print the largest entries of a snapshot file.
fn run_show(file: &Path, max_depth: Option<u32>, top_n: usize) -> Result<()> {
    let root = read_snapshot_file(file).with_context(|| format!("Failed to read {}", file.display()))?;

    println!();
    println!("{}", "─".repeat(60));
    println!(" {} - {}", file.display(), format_size(root.total_size()));
    println!(" {} files", root.file_count());
    println!(" Last modified {}", format_time(root.modified()));
    println!("{}", "─".repeat(60));
    println!();

    print_node(&root, 0, max_depth.unwrap_or(u32::MAX), top_n, root.total_size());

    Ok(())
}

/// Resolve the directory to scan, expanding a bare drive letter on Windows.
fn scan_root(path: Option<PathBuf>) -> PathBuf {
    let Some(path) = path else {
        return PathBuf::from(DEFAULT_ROOT);
    };

    if cfg!(windows) {
        if let Some(letter) = path.to_str().filter(|s| is_drive_letter(s)) {
            return PathBuf::from(format!("{letter}:\\"));
        }
    }
    path
}

fn is_drive_letter(s: &str) -> bool {
    s.len() == 1 && s.chars().all(|c| c.is_ascii_alphabetic())
}

/// Default snapshot file name: `<safe path>-snapshot-<yyyyMMdd-HHmm>.ssf`.
fn default_snapshot_name<Tz: TimeZone>(root: &Path, now: DateTime<Tz>) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    PathBuf::from(format!(
        "{}-snapshot-{}.{}",
        safe_file_name(&root.to_string_lossy()),
        now.format("%Y%m%d-%H%M"),
        SNAPSHOT_EXTENSION
    ))
}

/// Turn a path into something usable as a file name.
///
/// Every run of characters that are not allowed in file names becomes a
/// single `-`; leading and trailing runs are dropped.
fn safe_file_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    let mut separator = false;

    for ch in raw.chars() {
        if ch.is_control() || INVALID_FILE_NAME_CHARS.contains(&ch) {
            separator = !name.is_empty();
        } else {
            if separator {
                name.push('-');
                separator = false;
            }
            name.push(ch);
        }
    }

    if name.is_empty() {
        "root".to_string()
    } else {
        name
    }
}

/// Print a snapshot node and its largest children.
fn print_node(node: &SnapshotNode, depth: u32, max_depth: u32, top_n: usize, root_size: u64) {
    let indent = "  ".repeat(depth as usize);
    let ratio = if root_size > 0 {
        node.total_size() as f64 / root_size as f64 * 100.0
    } else {
        0.0
    };

    let bar = make_bar(ratio / 100.0, 10);
    let dir_marker = if node.is_dir() { "/" } else { "" };

    println!(
        "{}{}{:<40} {:>10} {:>5.1}% {}",
        indent,
        if node.is_dir() { "▼ " } else { "  " },
        truncate(&format!("{}{}", node.name(), dir_marker), 40),
        format_size(node.total_size()),
        ratio,
        bar
    );

    let children = node.children().unwrap_or_default();
    if !children.is_empty() && depth < max_depth {
        for child in children.iter().take(top_n) {
            print_node(child, depth + 1, max_depth, top_n, root_size);
        }

        let remaining = children.len().saturating_sub(top_n);
        if remaining > 0 {
            let indent = "  ".repeat((depth + 1) as usize);
            println!("{}  ... and {} more", indent, remaining);
        }
    }
}

/// Print a reduced compare tree.
fn print_report(node: &CompareReportNode, depth: usize) {
    let marker = match node.status {
        NodeStatus::New => '+',
        NodeStatus::Removed => '-',
        NodeStatus::Changed => '~',
        NodeStatus::Unchanged => ' ',
    };
    let dir_marker = if node.is_directory { "/" } else { "" };

    println!(
        "{}{} {:<40} {:>12}  {:+} files",
        "  ".repeat(depth),
        marker,
        truncate(&format!("{}{}", node.name, dir_marker), 40),
        format_size_diff(node.total_size_diff),
        node.files_count_diff()
    );

    for child in node.children() {
        print_report(child, depth + 1);
    }
}

/// Create a simple ASCII bar.
fn make_bar(ratio: f64, width: usize) -> String {
    let filled = (ratio * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::DECIMAL)
}

/// Format a size change with an explicit sign.
fn format_size_diff(diff: i64) -> String {
    let sign = if diff < 0 { '-' } else { '+' };
    format!("{}{}", sign, format_size(diff.unsigned_abs()))
}

fn format_time(time: DateTime<chrono::Utc>) -> String {
    time.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Truncate a string to max length in characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
