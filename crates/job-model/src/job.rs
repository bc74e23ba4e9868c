//! Job description parsing and validation.
//!
//! A job file is produced by the upstream recording pipeline and dropped
//! into the watch directory (or passed on the command line). It names the
//! project, the recording it came from, and the clips to splice into the
//! template, keyed by slot number.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use conform_common::error::{ConformError, ConformResult};

/// One unit of replacement media, produced by the upstream recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipRecord {
    /// Display name, used only in logs.
    pub filename: String,

    /// Absolute path to the ready-to-use media file.
    pub full_path: PathBuf,

    /// Nominal clip duration in seconds.
    #[serde(default)]
    pub duration: f64,

    /// Slot number as recorded upstream (informational; the map key is
    /// authoritative).
    #[serde(default)]
    pub slot_number: Option<u32>,

    /// Scene label from the recorder, e.g. "cruising" or "chase".
    #[serde(default)]
    pub scene_type: Option<String>,

    /// Which camera the clip came from.
    #[serde(default)]
    pub camera_angle: Option<u32>,
}

impl ClipRecord {
    /// Nominal clip length in frames at the given timeline rate.
    pub fn duration_frames(&self, fps: u32) -> i64 {
        (self.duration * fps as f64).round() as i64
    }
}

/// A job description as delivered by the upstream pipeline.
///
/// Clip keys arrive as strings ("1", "2", ...) because the producer emits
/// JSON objects; [`JobDescription::numbered_clips`] converts and validates
/// them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescription {
    /// Project name used for the saved project and the output file.
    pub project_name: String,

    /// Upstream job identifier.
    #[serde(default)]
    pub job_id: Option<String>,

    /// Upstream recording identifier.
    #[serde(default)]
    pub recording_id: Option<String>,

    /// Template project override; the configured template is used when
    /// absent.
    #[serde(default)]
    pub template_project: Option<String>,

    /// Slot number (string key) to replacement clip.
    pub clips: BTreeMap<String, ClipRecord>,

    /// Free-form upstream metadata, carried but not interpreted.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl JobDescription {
    /// Load and validate a job file.
    pub fn load(path: &Path) -> ConformResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConformError::job(format!("Failed to read job file {}: {e}", path.display()))
        })?;
        let job: Self = serde_json::from_str(&content).map_err(|e| {
            ConformError::job(format!("Failed to parse job file {}: {e}", path.display()))
        })?;
        job.validate()?;
        Ok(job)
    }

    /// Basic shape checks; filesystem state of the clips is checked later,
    /// at time of use.
    pub fn validate(&self) -> ConformResult<()> {
        if self.project_name.trim().is_empty() {
            return Err(ConformError::job("projectName is empty"));
        }
        if self.clips.is_empty() {
            return Err(ConformError::job("job contains no clips"));
        }
        for key in self.clips.keys() {
            match key.parse::<u32>() {
                Ok(0) => {
                    return Err(ConformError::job(format!(
                        "slot numbers are 1-based, got \"{key}\""
                    )));
                }
                Ok(_) => {}
                Err(_) => {
                    return Err(ConformError::job(format!(
                        "clip key \"{key}\" is not a slot number"
                    )));
                }
            }
        }
        Ok(())
    }

    /// A stable identifier for bin naming and idempotency, preferring the
    /// upstream ids over the display name.
    pub fn id(&self) -> &str {
        self.job_id
            .as_deref()
            .or(self.recording_id.as_deref())
            .unwrap_or(&self.project_name)
    }

    /// Clips keyed by numeric slot, ascending. Keys were validated by
    /// [`validate`](Self::validate); a malformed key here is a logic error.
    pub fn numbered_clips(&self) -> ConformResult<BTreeMap<u32, &ClipRecord>> {
        let mut out = BTreeMap::new();
        for (key, clip) in &self.clips {
            let slot: u32 = key
                .parse()
                .map_err(|_| ConformError::job(format!("clip key \"{key}\" is not a slot number")))?;
            out.insert(slot, clip);
        }
        Ok(out)
    }

    /// Slot numbers requested by this job, ascending.
    pub fn requested_slots(&self) -> ConformResult<Vec<u32>> {
        Ok(self.numbered_clips()?.into_keys().collect())
    }

    /// Base name for the rendered output and the saved project, without
    /// extension. Path separators and whitespace are flattened so the name
    /// is always usable as a single file-system component.
    pub fn render_name(&self, prefix: &str) -> String {
        let sanitized: String = self
            .project_name
            .chars()
            .map(|c| {
                if c.is_whitespace() || c == '/' || c == '\\' {
                    '_'
                } else {
                    c
                }
            })
            .collect();
        format!("{prefix}_{sanitized}")
    }
}
