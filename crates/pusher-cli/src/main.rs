use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use pusher_core::impls::LocalDirUploader;
use pusher_core::observability::CounterMetrics;
use pusher_core::{ByteCount, FileSender, LocalDataFile, PusherBuilder, Thresholds};

/// Batch files under a directory into tar.gz archives and ship them.
#[derive(Debug, Parser)]
#[command(name = "pusher", version)]
struct Args {
    /// Directory whose files are archived; member names are relative to it.
    #[arg(long)]
    root: PathBuf,

    /// Directory that receives finished archives.
    #[arg(long)]
    archive_dir: PathBuf,

    /// Flush once the compressed archive grows past this size (e.g. 20MB).
    #[arg(long, default_value = "20MB")]
    size_threshold: ByteCount,

    /// Flush once the oldest member has waited this many seconds.
    #[arg(long, default_value_t = 3600)]
    age_threshold_secs: u64,

    /// Scan the root a single time, then drain the queue and exit.
    #[arg(long)]
    once: bool,

    /// Seconds between rescans of the root when not running with --once.
    #[arg(long, default_value_t = 60, conflicts_with = "once")]
    watch_interval_secs: u64,

    /// Upload the partially filled archive when the file queue closes.
    #[arg(long)]
    flush_on_close: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let (root, archive_dir) = resolve_dirs(&args.root, &args.archive_dir).await?;

    let metrics = Arc::new(CounterMetrics::new());
    let uploader = Arc::new(LocalDirUploader::new(&archive_dir));
    let interval = (!args.once).then(|| Duration::from_secs(args.watch_interval_secs));

    let (scheduler, files) = PusherBuilder::new(root.to_string_lossy())
        .thresholds(Thresholds {
            size: args.size_threshold,
            age: Duration::from_secs(args.age_threshold_secs),
        })
        .uploader(uploader)
        .metrics(metrics.clone())
        .flush_on_close(args.flush_on_close)
        .build()
        .context("invalid configuration")?;

    let discovery = tokio::spawn(discover(root, interval, files));

    // A writer failure leaves the archive undefined; the process must stop.
    scheduler
        .run()
        .await
        .context("unrecoverable archive failure")?;

    discovery.await.context("discovery task panicked")??;

    let snapshot = serde_json::to_string(&metrics.snapshot())?;
    info!(metrics = %snapshot, "done");
    Ok(())
}

/// Canonical root and archive directories.
///
/// The archive directory is created if needed. It must not sit inside the
/// root, or the scanner would pick up its own archives.
async fn resolve_dirs(root: &Path, archive_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let root = tokio::fs::canonicalize(root)
        .await
        .with_context(|| format!("cannot resolve root {}", root.display()))?;
    tokio::fs::create_dir_all(archive_dir)
        .await
        .with_context(|| format!("cannot create archive dir {}", archive_dir.display()))?;
    let archive_dir = tokio::fs::canonicalize(archive_dir)
        .await
        .with_context(|| format!("cannot resolve archive dir {}", archive_dir.display()))?;

    if archive_dir.starts_with(&root) {
        bail!(
            "archive dir {} must not be inside root {}",
            archive_dir.display(),
            root.display()
        );
    }
    Ok((root, archive_dir))
}

/// Feed regular files under `root` into the batch loop.
///
/// Without an interval the root is scanned once and the channel is closed,
/// which makes the batch loop drain and exit.
async fn discover(root: PathBuf, interval: Option<Duration>, files: FileSender) -> Result<()> {
    let mut sent: HashSet<PathBuf> = HashSet::new();
    loop {
        let scan_root = root.clone();
        let found = tokio::task::spawn_blocking(move || scan(&scan_root))
            .await
            .context("scan task panicked")?;

        // forget files that have been uploaded and removed
        sent.retain(|path| path.exists());
        let mut queued = 0usize;
        for path in found {
            if !sent.insert(path.clone()) {
                continue;
            }
            if files.send(LocalDataFile::new(path)).await.is_err() {
                // batch loop is gone; nothing left to feed
                return Ok(());
            }
            queued += 1;
        }
        info!(root = %root.display(), queued, "scan finished");

        match interval {
            Some(every) => tokio::time::sleep(every).await,
            None => return Ok(()),
        }
    }
}

fn scan(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_file() => found.push(entry.into_path()),
            Ok(_) => {}
            Err(err) => warn!("error while scanning {}: {err}", root.display()),
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn flags_default_to_polling_without_flush_on_close() {
        let args = Args::try_parse_from(["pusher", "--root", "/data", "--archive-dir", "/out"])
            .unwrap();
        assert!(!args.once);
        assert!(!args.flush_on_close);
        assert_eq!(args.watch_interval_secs, 60);
        assert_eq!(args.size_threshold, ByteCount::new(20_000_000));
    }

    #[test]
    fn flush_on_close_is_independent_of_once() {
        let args = Args::try_parse_from([
            "pusher",
            "--root",
            "/data",
            "--archive-dir",
            "/out",
            "--watch-interval-secs",
            "5",
            "--flush-on-close",
        ])
        .unwrap();
        assert!(!args.once);
        assert!(args.flush_on_close);
        assert_eq!(args.watch_interval_secs, 5);
    }

    #[test]
    fn once_conflicts_with_watch_interval() {
        let parsed = Args::try_parse_from([
            "pusher",
            "--root",
            "/data",
            "--archive-dir",
            "/out",
            "--once",
            "--watch-interval-secs",
            "5",
        ]);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn archive_dir_inside_root_is_rejected_through_dot_dot() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("data");
        std::fs::create_dir(&root).unwrap();
        let sneaky = tmp.path().join("data").join("..").join("data").join("out");

        let err = resolve_dirs(&root, &sneaky).await.unwrap_err();
        assert!(err.to_string().contains("must not be inside root"));
    }

    #[tokio::test]
    async fn sibling_archive_dir_is_accepted_and_created() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("data");
        std::fs::create_dir(&root).unwrap();
        let out = tmp.path().join(".").join("out");

        let (root, out) = resolve_dirs(&root, &out).await.unwrap();
        assert!(out.is_dir());
        assert!(out.is_absolute());
        assert!(!out.starts_with(&root));
    }
}
