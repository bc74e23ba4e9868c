//! Read-only template inspection.
//!
//! The slot table is calibrated by hand, and the numbers have to come
//! from somewhere: this module surveys the live template and emits a
//! proposed table for an operator to review. Nothing here mutates the
//! host.

use conform_common::error::ConformResult;
use conform_host::{HostBackend, TimelineItemSnapshot};
use conform_job_model::{SlotPosition, SlotTable};

/// Item listing for one video track.
#[derive(Debug, Clone)]
pub struct TrackSurvey {
    pub track: u32,
    pub items: Vec<TimelineItemSnapshot>,
}

/// Enumerate every video track and its items, in track order.
pub fn survey_tracks(host: &mut dyn HostBackend) -> ConformResult<Vec<TrackSurvey>> {
    let mut surveys = Vec::new();
    for track in 1..=host.video_track_count()? {
        let items = host.track_items(track)?;
        surveys.push(TrackSurvey { track, items });
    }
    Ok(surveys)
}

/// Derive a slot table from one track's items: slot numbers follow
/// timeline order. The operator prunes entries that are not placeholders
/// before committing the file.
pub fn propose_slot_table(survey: &TrackSurvey) -> SlotTable {
    let mut items = survey.items.clone();
    items.sort_by_key(|item| item.start_frame);
    SlotTable::new(
        items
            .iter()
            .enumerate()
            .map(|(index, item)| SlotPosition {
                slot: (index + 1) as u32,
                track: survey.track,
                start_frame: item.start_frame,
                duration_frames: (item.end_frame - item.start_frame).max(1),
            })
            .collect(),
    )
}
