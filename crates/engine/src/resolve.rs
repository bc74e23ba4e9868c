//! Slot resolution: anchor frame to live timeline item.
//!
//! Resolution is deliberately per-slot and always against a fresh track
//! scan. Earlier replacements in the same job can delete and re-create
//! items, so a snapshot taken before any mutation must never be
//! dereferenced afterwards; the only stable key is the anchor frame.

use conform_common::error::ConformResult;
use conform_host::{HostBackend, TimelineItemSnapshot};
use conform_job_model::SlotPosition;

/// Locate the live item carrying a slot's placeholder.
///
/// Exact start-frame equality wins over containment: after a nearby
/// replacement an item's boundaries can shift slightly, and only the
/// anchor frame itself is trustworthy.
pub fn resolve_slot(
    host: &mut dyn HostBackend,
    position: &SlotPosition,
) -> ConformResult<Option<TimelineItemSnapshot>> {
    let items = host.track_items(position.track)?;

    let exact = items
        .iter()
        .find(|item| item.start_frame == position.start_frame);
    let resolved = exact
        .or_else(|| {
            items
                .iter()
                .find(|item| item.contains_frame(position.start_frame))
        })
        .cloned();

    match &resolved {
        Some(item) => tracing::debug!(
            slot = position.slot,
            frame = position.start_frame,
            item_start = item.start_frame,
            item_end = item.end_frame,
            media = %item.media_name,
            "Resolved slot to timeline item"
        ),
        None => tracing::warn!(
            slot = position.slot,
            track = position.track,
            frame = position.start_frame,
            "No timeline item at anchor frame"
        ),
    }
    Ok(resolved)
}
