//! Survey the live template and propose a slot table.

use std::path::PathBuf;

use conform_common::config::AppConfig;
use conform_engine::inspect::{propose_slot_table, survey_tracks};
use conform_engine::open_template;
use conform_host::HostSession;

pub fn run(config: AppConfig, track: Option<u32>, output: Option<PathBuf>) -> anyhow::Result<()> {
    config.validate()?;

    let mut session = HostSession::connect(&config.host, &config.polling)?;
    open_template(session.backend(), &config.template, None)?;

    println!(
        "Template: {} / {}",
        config.template.project_name, config.template.timeline_name
    );

    let surveys = survey_tracks(session.backend())?;
    for survey in &surveys {
        println!();
        println!("Track V{}: {} item(s)", survey.track, survey.items.len());
        for item in &survey.items {
            println!(
                "  frame {:>8} .. {:>8}  '{}'",
                item.start_frame, item.end_frame, item.media_name
            );
        }
    }

    let proposal_track = track.unwrap_or(config.template.video_track);
    let Some(survey) = surveys.iter().find(|s| s.track == proposal_track) else {
        anyhow::bail!("track V{proposal_track} not present in the template");
    };
    if survey.items.is_empty() {
        anyhow::bail!("track V{proposal_track} has no items to propose slots from");
    }

    let table = propose_slot_table(survey);
    println!();
    println!(
        "Proposed slot table from track V{proposal_track} ({} slots):",
        table.positions.len()
    );
    for pos in &table.positions {
        println!(
            "  slot {:>2}: frame {:>8}, {} frames",
            pos.slot, pos.start_frame, pos.duration_frames
        );
    }

    if let Some(path) = output {
        table.save(&path)?;
        println!();
        println!("Proposal written to: {}", path.display());
        println!("Review and prune it before pointing template.slot_table at it.");
    }
    Ok(())
}
