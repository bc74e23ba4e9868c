//! The job runner: one job, start to finish.
//!
//! Sequencing is fixed: open the template, purge stale bins, verify
//! template integrity, import media into a fresh bin, then for each slot
//! (ascending) resolve against a fresh scan and run the strategy chain.
//! The completion gate decides whether save and render happen at all.
//! Per-slot failures accumulate in the report rather than aborting, so
//! the log always shows the full picture of what did and did not work.

use chrono::Utc;

use conform_common::config::{AppConfig, TemplateConfig};
use conform_common::error::{ConformError, ConformResult};
use conform_host::HostBackend;
use conform_job_model::{JobDescription, JobReport, ReplacementOutcome, SlotTable};

use crate::bins::{job_bin_name, purge_stale_bins};
use crate::gate::CompletionGate;
use crate::integrity::{check_template, require_intact};
use crate::render::{drive_render, RenderRequest};
use crate::replace::{replace_slot, ReplacementRequest};
use crate::resolve::resolve_slot;

/// Close whatever is open, load the template project, and make its
/// configured timeline current. Every job (and the read-only checks)
/// starts here.
pub fn open_template(
    host: &mut dyn HostBackend,
    template: &TemplateConfig,
    project_override: Option<&str>,
) -> ConformResult<()> {
    let project_name = project_override.unwrap_or(&template.project_name);

    host.close_current_project()?;
    host.load_project(project_name).map_err(|e| {
        ConformError::host(format!(
            "could not load template project {project_name}: {e}"
        ))
    })?;

    let timelines = host.timeline_names()?;
    if !timelines.iter().any(|t| t == &template.timeline_name) {
        return Err(ConformError::host(format!(
            "template {project_name} has no timeline named {:?} (found: {:?})",
            template.timeline_name, timelines
        )));
    }
    host.set_current_timeline(&template.timeline_name)?;

    tracing::info!(
        project = project_name,
        timeline = %template.timeline_name,
        "Template project opened"
    );
    Ok(())
}

/// Process one job against a connected host. `Ok` means every requested
/// slot was confirmed replaced and the render finished; the report's
/// `output_path` is the deliverable.
pub fn process_job(
    host: &mut dyn HostBackend,
    config: &AppConfig,
    table: &SlotTable,
    job: &JobDescription,
) -> ConformResult<JobReport> {
    job.validate()?;
    let clips = job.numbered_clips()?;
    let requested: Vec<u32> = clips.keys().copied().collect();

    tracing::info!(
        project = %job.project_name,
        job_id = %job.id(),
        slots = ?requested,
        "Processing job"
    );

    let mut report = JobReport::new(&job.project_name, requested.clone());
    let mut gate = CompletionGate::new();
    let caps = host.capabilities();

    open_template(host, &config.template, job.template_project.as_deref())?;

    purge_stale_bins(host, &config.template.bin_prefix)?;

    let integrity = check_template(host, table)?;
    if !integrity.is_intact() {
        let missing = integrity.missing_slots();
        for slot in &requested {
            if missing.contains(slot) {
                report.record(
                    *slot,
                    ReplacementOutcome::PositionMissing,
                    "anchor frame absent from template",
                );
            }
        }
        log_report(&report);
        require_intact(&integrity)?;
    }

    // Stage media: import everything up front into this job's bin, then
    // mutate the timeline.
    let bin = job_bin_name(&config.template.bin_prefix, job.id());
    host.create_bin(&bin)?;
    host.set_current_bin(&bin)?;

    let mut staged = Vec::new();
    for (slot, clip) in &clips {
        let Some(position) = table.get(*slot) else {
            tracing::warn!(slot, "No calibrated position for slot");
            report.record(
                *slot,
                ReplacementOutcome::PositionMissing,
                "slot not present in slot table",
            );
            continue;
        };

        if !clip.full_path.exists() {
            tracing::warn!(slot, path = %clip.full_path.display(), "Clip file not found");
            report.record(
                *slot,
                ReplacementOutcome::MediaMissing,
                format!("missing file {}", clip.full_path.display()),
            );
            continue;
        }

        let nominal = clip.duration_frames(config.render.frame_rate);
        if nominal > 0 && nominal < position.duration_frames {
            tracing::warn!(
                slot,
                clip_frames = nominal,
                placeholder_frames = position.duration_frames,
                "Clip is shorter than its placeholder"
            );
        }

        let media = match host.import_media(&clip.full_path) {
            Ok(media) => media,
            Err(e) => {
                tracing::warn!(slot, error = %e, "Import failed");
                report.record(
                    *slot,
                    ReplacementOutcome::ReplaceFailed,
                    format!("import failed: {e}"),
                );
                continue;
            }
        };

        if let Err(e) = host.set_clip_in_out(&media, 0, position.duration_frames) {
            tracing::warn!(slot, error = %e, "Could not trim imported media");
            report.record(
                *slot,
                ReplacementOutcome::ReplaceFailed,
                format!("trim failed: {e}"),
            );
            continue;
        }

        tracing::info!(slot, file = %clip.filename, "Imported clip");
        staged.push((*slot, *position, media, *clip));
    }

    gate.begin_resolving();
    for (slot, position, media, clip) in &staged {
        gate.begin_slot(*slot)?;

        // Fresh scan for every slot: the previous iteration may have
        // invalidated every handle on the track.
        let Some(item) = resolve_slot(host, position)? else {
            report.record(
                *slot,
                ReplacementOutcome::PositionMissing,
                format!("no live item at frame {}", position.start_frame),
            );
            continue;
        };

        let display = clip
            .full_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| clip.filename.clone());
        let request = ReplacementRequest {
            slot: *slot,
            position,
            item: &item,
            media,
            media_path: &clip.full_path,
            media_display: &display,
        };

        match replace_slot(host, &caps, config.host.allow_source_swap, &request)? {
            Some(strategy) => report.record(
                *slot,
                ReplacementOutcome::Replaced { strategy },
                format!("{} -> {}", item.media_name, clip.filename),
            ),
            None => report.record(
                *slot,
                ReplacementOutcome::ReplaceFailed,
                "all strategies exhausted",
            ),
        }
    }

    gate.finalize(&report);
    if !gate.allows_render() {
        log_report(&report);
        return Err(ConformError::replacement(format!(
            "completion gate refused: slots {:?} not replaced",
            report.missing_slots()
        )));
    }

    // Save under the job's name. The host has no save-as, so: save,
    // rename, save again.
    host.save_project()?;
    let saved_name = format!(
        "{}_{}",
        job.render_name(&config.template.project_prefix),
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    host.rename_project(&saved_name)?;
    host.save_project()?;
    report.saved_project_name = Some(saved_name.clone());
    tracing::info!(project = %saved_name, "Project saved");

    let base_name = job.render_name(&config.template.project_prefix);
    let output = drive_render(
        host,
        &caps,
        &RenderRequest {
            render: &config.render,
            polling: &config.polling,
            output_dir: &config.paths.output_dir,
            base_name: &base_name,
        },
    )?;

    report.output_path = Some(output);
    tracing::info!(
        project = %job.project_name,
        output = ?report.output_path,
        "Job complete"
    );
    Ok(report)
}

fn log_report(report: &JobReport) {
    match serde_json::to_string(report) {
        Ok(json) => tracing::error!(report = %json, "Job report"),
        Err(e) => tracing::error!(error = %e, "Could not serialize job report"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHost;
    use conform_job_model::{ClipRecord, SlotPosition};
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};

    fn temp_clip(dir: &Path, name: &str) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, vec![0u8; 32]).unwrap();
        path
    }

    fn clip(path: PathBuf, duration: f64) -> ClipRecord {
        ClipRecord {
            filename: path.file_name().unwrap().to_string_lossy().to_string(),
            full_path: path,
            duration,
            slot_number: None,
            scene_type: None,
            camera_angle: None,
        }
    }

    fn job(clips: BTreeMap<String, ClipRecord>) -> JobDescription {
        JobDescription {
            project_name: "Smith_Tour".to_string(),
            job_id: Some("job-1".to_string()),
            recording_id: None,
            template_project: None,
            clips,
            metadata: BTreeMap::new(),
        }
    }

    fn two_slot_table() -> SlotTable {
        SlotTable::new(vec![
            SlotPosition {
                slot: 1,
                track: 3,
                start_frame: 100,
                duration_frames: 39,
            },
            SlotPosition {
                slot: 2,
                track: 3,
                start_frame: 200,
                duration_frames: 36,
            },
        ])
    }

    fn test_config(dir: &Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.paths.output_dir = dir.join("rendered");
        config.polling.render_poll_secs = 0;
        config.polling.render_timeout_secs = 5;
        config.polling.output_settle_secs = 0;
        config
    }

    fn host_with_placeholders() -> MockHost {
        let mut host = MockHost::new();
        host.add_item(3, 100, 139, "placeholder_1");
        host.add_item(3, 200, 236, "placeholder_2");
        host
    }

    #[test]
    fn test_end_to_end_two_slots() {
        let dir = std::env::temp_dir().join("conform_runner_e2e");
        let mut clips = BTreeMap::new();
        clips.insert("1".to_string(), clip(temp_clip(&dir, "slot_1.mp4"), 1.6));
        clips.insert("2".to_string(), clip(temp_clip(&dir, "slot_2.mp4"), 1.5));
        let job = job(clips);
        let config = test_config(&dir);
        let mut host = host_with_placeholders();

        let report = process_job(&mut host, &config, &two_slot_table(), &job).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.replaced_count(), 2);
        assert_eq!(host.item_name_at(3, 100), "slot_1");
        assert_eq!(host.item_name_at(3, 200), "slot_2");

        // Template opened and saved under the job's name.
        assert_eq!(host.loaded_projects, vec!["Template".to_string()]);
        assert_eq!(host.saves, 2);
        assert!(host.renamed_to[0].starts_with("Conform_Smith_Tour_"));

        // Render ran with the job's derived output name.
        assert_eq!(host.renders_started, 1);
        assert_eq!(
            host.applied_settings.as_ref().unwrap()["CustomName"],
            "Conform_Smith_Tour"
        );
        assert_eq!(
            report.output_path.as_ref().unwrap().file_name().unwrap(),
            "Conform_Smith_Tour.mp4"
        );

        // Media went into a fresh prefixed bin.
        assert_eq!(host.created_bins.len(), 1);
        assert!(host.created_bins[0].starts_with("Conform_job-1_"));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_missing_media_blocks_save_and_render() {
        let dir = std::env::temp_dir().join("conform_runner_missing_media");
        let mut clips = BTreeMap::new();
        clips.insert("1".to_string(), clip(temp_clip(&dir, "slot_1.mp4"), 1.6));
        clips.insert(
            "2".to_string(),
            clip(dir.join("never_written.mp4"), 1.5),
        );
        let job = job(clips);
        let config = test_config(&dir);
        let mut host = host_with_placeholders();

        let err = process_job(&mut host, &config, &two_slot_table(), &job).unwrap_err();
        assert!(err.to_string().contains("completion gate"));
        assert!(err.to_string().contains('2'));

        // The core invariant: nothing saved, nothing rendered.
        assert_eq!(host.saves, 0);
        assert_eq!(host.renders_started, 0);
        assert!(host.renamed_to.is_empty());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_replace_failure_blocks_render() {
        let dir = std::env::temp_dir().join("conform_runner_replace_fail");
        let mut clips = BTreeMap::new();
        clips.insert("1".to_string(), clip(temp_clip(&dir, "slot_1.mp4"), 1.6));
        let job = job(clips);
        let config = test_config(&dir);

        let mut host = host_with_placeholders();
        // Every strategy off: direct unsupported, takes refuse.
        host.capabilities.direct_item_replace = false;
        host.fail_add_take = true;

        let err = process_job(&mut host, &config, &two_slot_table(), &job).unwrap_err();
        assert!(matches!(err, ConformError::Replacement { .. }));
        assert_eq!(host.saves, 0);
        assert_eq!(host.renders_started, 0);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_template_integrity_failure_aborts_before_import() {
        let dir = std::env::temp_dir().join("conform_runner_integrity");
        let mut clips = BTreeMap::new();
        clips.insert("1".to_string(), clip(temp_clip(&dir, "slot_1.mp4"), 1.6));
        let job = job(clips);
        let config = test_config(&dir);

        let mut host = MockHost::new();
        // Only slot 1's anchor exists; slot 2's frame 200 is gone.
        host.add_item(3, 100, 139, "placeholder_1");

        let err = process_job(&mut host, &config, &two_slot_table(), &job).unwrap_err();
        assert!(matches!(err, ConformError::TemplateIntegrity { .. }));
        assert!(err.to_string().contains("slot 2"));

        // Aborted before any import or bin creation.
        assert!(host.imported_paths.is_empty());
        assert!(host.created_bins.is_empty());
        assert_eq!(host.renders_started, 0);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_stale_bins_purged_before_work() {
        let dir = std::env::temp_dir().join("conform_runner_purge");
        let mut clips = BTreeMap::new();
        clips.insert("1".to_string(), clip(temp_clip(&dir, "slot_1.mp4"), 1.6));
        clips.insert("2".to_string(), clip(temp_clip(&dir, "slot_2.mp4"), 1.5));
        let job = job(clips);
        let config = test_config(&dir);

        let mut host = host_with_placeholders();
        host.bins = vec![
            "Conform_old-job_20240101_000000".to_string(),
            "Music".to_string(),
        ];

        process_job(&mut host, &config, &two_slot_table(), &job).unwrap();
        assert_eq!(host.deleted_bins, vec!["Conform_old-job_20240101_000000"]);
        assert!(host.bins.iter().any(|b| b == "Music"));

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_every_slot_resolved_from_fresh_scan() {
        let dir = std::env::temp_dir().join("conform_runner_fresh_scan");
        let mut clips = BTreeMap::new();
        clips.insert("1".to_string(), clip(temp_clip(&dir, "slot_1.mp4"), 1.6));
        clips.insert("2".to_string(), clip(temp_clip(&dir, "slot_2.mp4"), 1.5));
        let job = job(clips);
        let config = test_config(&dir);
        let mut host = host_with_placeholders();

        process_job(&mut host, &config, &two_slot_table(), &job).unwrap();

        // Scans: integrity pass, then per slot a resolution scan and a
        // post-replacement confirmation scan. Slot 2's resolution must
        // come after slot 1's mutation, which the mock enforces by
        // invalidating handles on every mutation; reaching here at all
        // proves no stale handle was dereferenced.
        assert!(host.track_scans.len() >= 5);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_slot_without_table_entry_gates_job() {
        let dir = std::env::temp_dir().join("conform_runner_unknown_slot");
        let mut clips = BTreeMap::new();
        clips.insert("1".to_string(), clip(temp_clip(&dir, "slot_1.mp4"), 1.6));
        clips.insert("9".to_string(), clip(temp_clip(&dir, "slot_9.mp4"), 1.5));
        let job = job(clips);
        let config = test_config(&dir);
        let mut host = host_with_placeholders();

        let err = process_job(&mut host, &config, &two_slot_table(), &job).unwrap_err();
        assert!(err.to_string().contains('9'));
        assert_eq!(host.renders_started, 0);

        std::fs::remove_dir_all(dir).ok();
    }
}
