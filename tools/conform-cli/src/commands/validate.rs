//! Validate a job file without touching the host.

use std::path::PathBuf;

use conform_common::config::AppConfig;
use conform_job_model::{JobDescription, SlotTable};

pub fn run(job_file: PathBuf, config: AppConfig) -> anyhow::Result<()> {
    println!("Validating job file: {}", job_file.display());

    let job = JobDescription::load(&job_file)?;
    let table = SlotTable::load(&config.template.slot_table)?;

    println!("  Project: {}", job.project_name);
    println!("  Job id: {}", job.id());
    if let Some(template) = &job.template_project {
        println!("  Template override: {template}");
    }

    let clips = job.numbered_clips()?;
    println!("  Clips: {}", clips.len());

    let mut issues = Vec::new();
    for (slot, clip) in &clips {
        if table.get(*slot).is_none() {
            issues.push(format!("slot {slot}: no entry in the slot table"));
        }
        if !clip.full_path.exists() {
            issues.push(format!(
                "slot {slot}: file not found: {}",
                clip.full_path.display()
            ));
        }
    }

    if issues.is_empty() {
        println!("\nJob file is valid and all clip files are present.");
        Ok(())
    } else {
        println!("\nValidation issues:");
        for issue in &issues {
            println!("  - {issue}");
        }
        anyhow::bail!("{} issue(s) found; job would fail its completion gate", issues.len())
    }
}
