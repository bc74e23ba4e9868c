//! The completion gate: all-or-nothing admission to save/render.
//!
//! Partial success is total failure here. A job that replaced four of
//! five slots must not ship a video mixing template placeholders with
//! customer media, so the gate refuses save/render unless every
//! requested slot is provably replaced.

use std::collections::BTreeSet;

use conform_common::error::{ConformError, ConformResult};
use conform_job_model::JobReport;

/// Job lifecycle states.
///
/// `Pending → Resolving → Replacing → {AllReplaced | Aborted}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Nothing attempted yet.
    Pending,
    /// Slot resolution has begun.
    Resolving,
    /// At least one slot is being mutated.
    Replacing,
    /// Every requested slot confirmed replaced; save/render permitted.
    AllReplaced,
    /// At least one slot unreplaced; save/render forbidden.
    Aborted,
}

/// Tracks job progress and enforces the per-slot idempotency guard.
#[derive(Debug)]
pub struct CompletionGate {
    state: GateState,
    processed: BTreeSet<u32>,
}

impl CompletionGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Pending,
            processed: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    /// Called once when the per-slot loop starts.
    pub fn begin_resolving(&mut self) {
        debug_assert_eq!(self.state, GateState::Pending);
        self.state = GateState::Resolving;
    }

    /// Admit one slot for resolution + replacement. A slot seen twice in
    /// one run means resolution produced a duplicate (a logic bug, not
    /// a retry) and is rejected before any second mutation.
    pub fn begin_slot(&mut self, slot: u32) -> ConformResult<()> {
        if !self.processed.insert(slot) {
            return Err(ConformError::replacement(format!(
                "slot {slot} processed twice in one run; refusing second mutation"
            )));
        }
        self.state = GateState::Replacing;
        Ok(())
    }

    /// Compare confirmed replacements against the request and settle the
    /// terminal state.
    pub fn finalize(&mut self, report: &JobReport) -> GateState {
        let replaced = report.replaced_count();
        let requested = report.requested_count();
        if report.is_complete() {
            tracing::info!(replaced, requested, "Completion gate passed");
            self.state = GateState::AllReplaced;
        } else {
            let missing = report.missing_slots();
            tracing::error!(
                replaced,
                requested,
                ?missing,
                "Completion gate failed; refusing save/render"
            );
            self.state = GateState::Aborted;
        }
        self.state
    }

    /// Whether the caller may proceed to save and render.
    pub fn allows_render(&self) -> bool {
        self.state == GateState::AllReplaced
    }
}

impl Default for CompletionGate {
    fn default() -> Self {
        Self::new()
    }
}
