//! Per-slot replacement outcomes and the aggregated job report.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which replacement strategy succeeded for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Swap the timeline item's media reference in place.
    DirectReplace,
    /// Add the media as a take, select it, finalize.
    TakeReplace,
    /// Repoint the pool asset's backing file.
    SourceSwap,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StrategyKind::DirectReplace => "direct-replace",
            StrategyKind::TakeReplace => "take-replace",
            StrategyKind::SourceSwap => "source-swap",
        };
        f.write_str(name)
    }
}

/// What happened to one requested slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "result")]
pub enum ReplacementOutcome {
    /// Confirmed replaced by the named strategy.
    Replaced { strategy: StrategyKind },
    /// The clip file was absent on disk; the slot was skipped.
    MediaMissing,
    /// No live timeline item matched the slot's anchor frame.
    PositionMissing,
    /// Every applicable strategy failed.
    ReplaceFailed,
}

impl ReplacementOutcome {
    pub fn is_replaced(&self) -> bool {
        matches!(self, ReplacementOutcome::Replaced { .. })
    }
}

/// One slot's line in the job report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotReport {
    pub slot: u32,
    pub outcome: ReplacementOutcome,
    /// Human-readable context: filenames, frames, strategy errors.
    pub detail: String,
}

/// The aggregate record of a job run, built up slot by slot and consulted
/// by the completion gate. Serialized into logs on failure so the full
/// picture of what did and did not work survives the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub project_name: String,

    /// Slots the job asked for, ascending.
    pub requested: Vec<u32>,

    pub slots: Vec<SlotReport>,

    /// Name the project was saved under, once past the gate.
    pub saved_project_name: Option<String>,

    /// Rendered output path, once the render finished.
    pub output_path: Option<PathBuf>,
}

impl JobReport {
    pub fn new(project_name: impl Into<String>, requested: Vec<u32>) -> Self {
        Self {
            project_name: project_name.into(),
            requested,
            slots: Vec::new(),
            saved_project_name: None,
            output_path: None,
        }
    }

    pub fn record(&mut self, slot: u32, outcome: ReplacementOutcome, detail: impl Into<String>) {
        self.slots.push(SlotReport {
            slot,
            outcome,
            detail: detail.into(),
        });
    }

    pub fn requested_count(&self) -> usize {
        self.requested.len()
    }

    pub fn replaced_count(&self) -> usize {
        self.slots.iter().filter(|s| s.outcome.is_replaced()).count()
    }

    /// Requested slots without a confirmed replacement, ascending.
    pub fn missing_slots(&self) -> Vec<u32> {
        self.requested
            .iter()
            .copied()
            .filter(|slot| {
                !self
                    .slots
                    .iter()
                    .any(|s| s.slot == *slot && s.outcome.is_replaced())
            })
            .collect()
    }

    /// The all-or-nothing condition the completion gate enforces.
    pub fn is_complete(&self) -> bool {
        self.replaced_count() == self.requested_count()
    }
}
