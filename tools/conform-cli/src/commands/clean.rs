//! Remove aged completed-job files and rendered outputs.
//!
//! Disk hygiene for long-running deployments; never touches the host.

use std::path::Path;
use std::time::{Duration, SystemTime};

use conform_common::config::AppConfig;

pub fn run(config: AppConfig, days: u64) -> anyhow::Result<()> {
    let cutoff = Duration::from_secs(days * 24 * 60 * 60);

    println!("Cleaning files older than {days} day(s)");

    let jobs = remove_older_than(&config.paths.completed_dir, &["json", "error"], cutoff)?;
    println!(
        "  Completed jobs removed: {jobs} ({})",
        config.paths.completed_dir.display()
    );

    let videos = remove_older_than(&config.paths.output_dir, &["mp4", "mov", "avi", "mkv"], cutoff)?;
    println!(
        "  Rendered files removed: {videos} ({})",
        config.paths.output_dir.display()
    );

    Ok(())
}

fn remove_older_than(dir: &Path, extensions: &[&str], cutoff: Duration) -> anyhow::Result<u32> {
    if !dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
            .unwrap_or(false);
        if !matches || !is_older_than(&path, cutoff) {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(file = %path.display(), "Removed");
                removed += 1;
            }
            Err(e) => tracing::warn!(file = %path.display(), error = %e, "Could not remove"),
        }
    }
    Ok(removed)
}

fn is_older_than(path: &Path, cutoff: Duration) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age > cutoff)
        .unwrap_or(false)
}
