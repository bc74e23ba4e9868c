//! Template integrity check.
//!
//! The slot table is calibrated by hand against one template version; the
//! template can drift underneath it (re-saved, re-cut, extended). Before
//! any import or replacement work, the live timeline is compared against
//! the table: a missing anchor frame fails the job up front, which is far
//! cheaper than discovering it mid-replacement.

use std::collections::BTreeSet;

use conform_common::error::{ConformError, ConformResult};
use conform_host::HostBackend;
use conform_job_model::SlotTable;

/// An expected anchor with no live item starting there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingAnchor {
    pub slot: u32,
    pub track: u32,
    pub frame: i64,
}

/// Result of comparing the live timeline against the slot table.
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    /// Anchors the table expects but the timeline lacks. Any entry here
    /// fails the job.
    pub missing: Vec<MissingAnchor>,

    /// Live item start frames with no table entry, per (track, frame).
    /// Drift signal only; the template may have legitimately grown.
    pub extra: Vec<(u32, i64)>,
}

impl IntegrityReport {
    pub fn is_intact(&self) -> bool {
        self.missing.is_empty()
    }

    /// Slot numbers with missing anchors, ascending.
    pub fn missing_slots(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = self.missing.iter().map(|m| m.slot).collect();
        set.into_iter().collect()
    }
}

/// Read the live item list on every track the table references and
/// compare start-frame sets. Logs what it finds; the caller decides
/// whether a non-intact report aborts the job.
pub fn check_template(
    host: &mut dyn HostBackend,
    table: &SlotTable,
) -> ConformResult<IntegrityReport> {
    let slots_by_frame = table.slots_by_frame();
    let mut report = IntegrityReport::default();

    for track in table.tracks() {
        let items = host.track_items(track)?;
        let live: BTreeSet<i64> = items.iter().map(|i| i.start_frame).collect();
        let expected = table.expected_frames(track);

        for frame in expected.difference(&live) {
            let slot = slots_by_frame[frame];
            tracing::error!(slot, track, frame, "Expected anchor frame missing from template");
            report.missing.push(MissingAnchor {
                slot,
                track,
                frame: *frame,
            });
        }
        for frame in live.difference(&expected) {
            tracing::warn!(
                track,
                frame,
                "Timeline item with no slot table entry (template drift?)"
            );
            report.extra.push((track, *frame));
        }
    }

    if report.is_intact() {
        tracing::info!(
            slots = table.positions.len(),
            "Template integrity check passed"
        );
    }
    Ok(report)
}

/// Convert a non-intact report into the job-fatal error.
pub fn require_intact(report: &IntegrityReport) -> ConformResult<()> {
    if report.is_intact() {
        return Ok(());
    }
    let detail: Vec<String> = report
        .missing
        .iter()
        .map(|m| format!("slot {} (track {}, frame {})", m.slot, m.track, m.frame))
        .collect();
    Err(ConformError::integrity(format!(
        "template is missing anchors for {}",
        detail.join(", ")
    )))
}
