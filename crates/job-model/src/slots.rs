//! The slot table: hand-calibrated template positions.
//!
//! Each entry maps a slot number to the track and start frame of its
//! placeholder in the template timeline. The start frame doubles as the
//! slot's identity ("anchor frame") because the host does not guarantee
//! stable item identities across saves. The table is maintained by hand
//! against a specific template version and lives in its own versioned
//! JSON file; it is validated here at load and against the live template
//! before every job.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use conform_common::error::{ConformError, ConformResult};

/// One template placeholder position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotPosition {
    /// Slot number, 1-based.
    pub slot: u32,

    /// Video track index carrying the placeholder, 1-based.
    pub track: u32,

    /// Absolute start frame of the placeholder in the template timeline.
    pub start_frame: i64,

    /// Placeholder length in frames; replacement media is trimmed to it.
    pub duration_frames: i64,
}

/// The full calibrated table for one template version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotTable {
    /// Table schema/calibration version, bumped when the template changes.
    #[serde(default = "default_version")]
    pub version: String,

    pub positions: Vec<SlotPosition>,
}

fn default_version() -> String {
    "1".to_string()
}

impl SlotTable {
    pub fn new(positions: Vec<SlotPosition>) -> Self {
        Self {
            version: default_version(),
            positions,
        }
    }

    /// Load and validate a slot table file.
    pub fn load(path: &Path) -> ConformResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConformError::config(format!(
                "Failed to read slot table {}: {e}",
                path.display()
            ))
        })?;
        let table: Self = serde_json::from_str(&content).map_err(|e| {
            ConformError::config(format!(
                "Failed to parse slot table {}: {e}",
                path.display()
            ))
        })?;
        table.validate()?;
        Ok(table)
    }

    /// Save the table (used by the template inspector to emit a proposal).
    pub fn save(&self, path: &Path) -> ConformResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Structural invariants: non-empty, 1-based slots and tracks, slot
    /// numbers unique, start frames unique (they are the identity key).
    pub fn validate(&self) -> ConformResult<()> {
        if self.positions.is_empty() {
            return Err(ConformError::config("slot table is empty"));
        }
        let mut slots = BTreeSet::new();
        let mut frames = BTreeSet::new();
        for pos in &self.positions {
            if pos.slot == 0 {
                return Err(ConformError::config("slot numbers are 1-based"));
            }
            if pos.track == 0 {
                return Err(ConformError::config(format!(
                    "slot {} has track 0; tracks are 1-based",
                    pos.slot
                )));
            }
            if pos.start_frame < 0 {
                return Err(ConformError::config(format!(
                    "slot {} has negative start frame {}",
                    pos.slot, pos.start_frame
                )));
            }
            if pos.duration_frames <= 0 {
                return Err(ConformError::config(format!(
                    "slot {} has non-positive duration {}",
                    pos.slot, pos.duration_frames
                )));
            }
            if !slots.insert(pos.slot) {
                return Err(ConformError::config(format!(
                    "duplicate slot number {}",
                    pos.slot
                )));
            }
            if !frames.insert(pos.start_frame) {
                return Err(ConformError::config(format!(
                    "duplicate anchor frame {} (slot {})",
                    pos.start_frame, pos.slot
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, slot: u32) -> Option<&SlotPosition> {
        self.positions.iter().find(|p| p.slot == slot)
    }

    /// Tracks referenced by the table, ascending, deduplicated.
    pub fn tracks(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = self.positions.iter().map(|p| p.track).collect();
        set.into_iter().collect()
    }

    /// Expected anchor frames on one track.
    pub fn expected_frames(&self, track: u32) -> BTreeSet<i64> {
        self.positions
            .iter()
            .filter(|p| p.track == track)
            .map(|p| p.start_frame)
            .collect()
    }

    /// Anchor frame to slot number, for reporting which slot a missing
    /// frame belongs to.
    pub fn slots_by_frame(&self) -> BTreeMap<i64, u32> {
        self.positions
            .iter()
            .map(|p| (p.start_frame, p.slot))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table() -> SlotTable {
        SlotTable::new(vec![
            SlotPosition {
                slot: 1,
                track: 3,
                start_frame: 86570,
                duration_frames: 39,
            },
            SlotPosition {
                slot: 2,
                track: 3,
                start_frame: 86633,
                duration_frames: 36,
            },
            SlotPosition {
                slot: 3,
                track: 3,
                start_frame: 87135,
                duration_frames: 37,
            },
        ])
    }

    #[test]
    fn test_valid_table_passes() {
        table().validate().unwrap();
    }

    #[test]
    fn test_duplicate_anchor_frame_rejected() {
        let mut t = table();
        t.positions.push(SlotPosition {
            slot: 4,
            track: 3,
            start_frame: 86570,
            duration_frames: 10,
        });
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let mut t = table();
        t.positions.push(SlotPosition {
            slot: 1,
            track: 3,
            start_frame: 90000,
            duration_frames: 10,
        });
        assert!(t.validate().is_err());
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(SlotTable::new(vec![]).validate().is_err());
    }

    #[test]
    fn test_lookups() {
        let t = table();
        assert_eq!(t.get(2).unwrap().start_frame, 86633);
        assert!(t.get(9).is_none());
        assert_eq!(t.tracks(), vec![3]);
        let frames = t.expected_frames(3);
        assert!(frames.contains(&87135));
        assert_eq!(t.expected_frames(1).len(), 0);
        assert_eq!(t.slots_by_frame()[&86633], 2);
    }

    #[test]
    fn test_serde_roundtrip() {
        let t = table();
        let json = serde_json::to_string_pretty(&t).unwrap();
        let parsed: SlotTable = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.positions, t.positions);
        assert_eq!(parsed.version, "1");
    }

    proptest! {
        /// Any table whose slots and anchor frames are pairwise distinct
        /// (and otherwise in range) validates; collapsing two anchor
        /// frames always fails.
        #[test]
        fn prop_distinct_anchors_validate(frames in proptest::collection::btree_set(0i64..1_000_000, 1..20)) {
            let positions: Vec<SlotPosition> = frames
                .iter()
                .enumerate()
                .map(|(i, &frame)| SlotPosition {
                    slot: (i + 1) as u32,
                    track: 3,
                    start_frame: frame,
                    duration_frames: 24,
                })
                .collect();
            let mut t = SlotTable::new(positions);
            prop_assert!(t.validate().is_ok());

            if t.positions.len() >= 2 {
                let first = t.positions[0].start_frame;
                t.positions.last_mut().unwrap().start_frame = first;
                prop_assert!(t.validate().is_err());
            }
        }
    }
}
