//! Watch a directory for job files and process them serially.
//!
//! One session, one job at a time. A processed job file is moved to the
//! completed directory on success or renamed with an `.error` extension
//! on failure, so the upstream producer can see what happened. Only a
//! lost host connection stops the loop.

use std::path::{Path, PathBuf};

use conform_common::config::AppConfig;
use conform_common::error::{ConformError, ConformResult};
use conform_host::HostSession;
use conform_job_model::{JobDescription, SlotTable};

pub async fn run(dir: PathBuf, config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;
    std::fs::create_dir_all(&dir)?;
    std::fs::create_dir_all(&config.paths.completed_dir)?;
    std::fs::create_dir_all(&config.paths.output_dir)?;

    let table = SlotTable::load(&config.template.slot_table)?;
    let mut session = HostSession::connect(&config.host, &config.polling)?;

    println!("Watching for job files in: {}", dir.display());
    println!("Press Ctrl+C to stop.");

    loop {
        for job_file in list_job_files(&dir)? {
            tracing::info!(job = %job_file.display(), "Found job file");
            match process_one(&mut session, &config, &table, &job_file) {
                Ok(output) => {
                    if let Some(file_name) = job_file.file_name() {
                        let completed = config.paths.completed_dir.join(file_name);
                        if let Err(e) = std::fs::rename(&job_file, &completed) {
                            tracing::warn!(error = %e, "Could not move job file to completed");
                        }
                    }
                    tracing::info!(
                        job = %job_file.display(),
                        output = %output.display(),
                        "Job completed"
                    );
                }
                Err(e) if e.is_fatal_to_process() => {
                    mark_errored(&job_file);
                    return Err(e.into());
                }
                Err(e) => {
                    tracing::error!(job = %job_file.display(), error = %e, "Job failed");
                    mark_errored(&job_file);
                }
            }
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Stopping watcher.");
                return Ok(());
            }
            _ = tokio::time::sleep(config.polling.watch_interval()) => {}
        }
    }
}

fn process_one(
    session: &mut HostSession,
    config: &AppConfig,
    table: &SlotTable,
    job_file: &Path,
) -> ConformResult<PathBuf> {
    let job = JobDescription::load(job_file)?;
    let report = conform_engine::process_job(session.backend(), config, table, &job)?;
    report
        .output_path
        .ok_or_else(|| ConformError::job("job completed without an output path"))
}

fn list_job_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().map(|e| e == "json").unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}

fn mark_errored(job_file: &Path) {
    let errored = job_file.with_extension("error");
    if let Err(e) = std::fs::rename(job_file, &errored) {
        tracing::warn!(error = %e, "Could not mark job file as errored");
    } else {
        tracing::info!(file = %errored.display(), "Job file marked as errored");
    }
}
