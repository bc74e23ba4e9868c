//! Process a single job file.

use std::path::PathBuf;

use conform_common::config::AppConfig;
use conform_host::HostSession;
use conform_job_model::{JobDescription, SlotTable};

pub async fn run(job_file: PathBuf, config: AppConfig) -> anyhow::Result<()> {
    config.validate()?;
    let table = SlotTable::load(&config.template.slot_table)?;
    let job = JobDescription::load(&job_file)?;

    tracing::info!(job = %job_file.display(), "Processing single job");

    let mut session = HostSession::connect(&config.host, &config.polling)?;
    let report = conform_engine::process_job(session.backend(), &config, &table, &job)?;

    let output = report
        .output_path
        .ok_or_else(|| anyhow::anyhow!("job completed without an output path"))?;

    // The output path on stdout is the contract with the caller.
    println!("{}", output.display());
    Ok(())
}
