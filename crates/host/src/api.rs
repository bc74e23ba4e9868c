//! The adapter interface to the host NLE.
//!
//! Everything the automation needs from the host application is expressed
//! here as one trait plus value types. The production implementation
//! drives the real application through its scripting interface
//! ([`crate::bridge`]); tests substitute an in-memory double. Timeline
//! items cross this boundary as value snapshots with opaque ids: the
//! host does not guarantee object identity across mutations, so snapshots
//! are re-queried rather than held.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use conform_common::error::ConformResult;

/// Opaque handle to a timeline item, valid only until the next timeline
/// mutation. Obtained from [`HostBackend::track_items`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

/// Opaque handle to a media-pool asset, valid for the lifetime of the
/// open project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaId(pub String);

/// Point-in-time view of one timeline item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineItemSnapshot {
    pub id: ItemId,
    pub start_frame: i64,
    pub end_frame: i64,
    /// Display name of the occupying media.
    pub media_name: String,
}

impl TimelineItemSnapshot {
    /// Whether the given frame lies inside this item.
    pub fn contains_frame(&self, frame: i64) -> bool {
        self.start_frame <= frame && frame < self.end_frame
    }
}

/// What the connected host version can do, reported once by the adapter
/// at connect time. Strategy selection reads these flags instead of
/// probing the API at call sites.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HostCapabilities {
    /// In-place media replacement on a timeline item.
    pub direct_item_replace: bool,

    /// Take management (add / select / finalize).
    pub takes: bool,

    /// Repointing a pool asset's backing file.
    pub source_swap: bool,

    /// Per-job render status query.
    pub render_job_status: bool,

    /// Global "is a render running" query.
    pub render_active_query: bool,

    /// Window control (minimize).
    pub window_control: bool,
}

impl Default for HostCapabilities {
    /// Conservative baseline every supported host version provides.
    fn default() -> Self {
        Self {
            direct_item_replace: false,
            takes: true,
            source_swap: true,
            render_job_status: true,
            render_active_query: true,
            window_control: false,
        }
    }
}

/// Host-reported state of a queued render job.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderJobStatus {
    Queued,
    Rendering { percent: u32 },
    Complete,
    Failed { error: String },
    Cancelled,
    /// The host returned something unrecognized; treat as still running.
    Unknown(String),
}

impl RenderJobStatus {
    /// Decode the host's status dictionary (`JobStatus`,
    /// `CompletionPercentage`, `Error` keys).
    pub fn from_host_value(value: &Value) -> Self {
        let status = value
            .get("JobStatus")
            .and_then(Value::as_str)
            .unwrap_or_default();
        match status {
            "Ready" | "Queued" => RenderJobStatus::Queued,
            "Rendering" => RenderJobStatus::Rendering {
                percent: value
                    .get("CompletionPercentage")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as u32,
            },
            "Complete" => RenderJobStatus::Complete,
            "Failed" => RenderJobStatus::Failed {
                error: value
                    .get("Error")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown error")
                    .to_string(),
            },
            "Cancelled" => RenderJobStatus::Cancelled,
            other => RenderJobStatus::Unknown(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RenderJobStatus::Complete
                | RenderJobStatus::Failed { .. }
                | RenderJobStatus::Cancelled
        )
    }
}

/// String-keyed settings dictionary in the shape the host expects.
/// Produced only by [`crate::settings::render_settings_map`].
pub type HostSettingsMap = BTreeMap<String, Value>;

/// Operations the automation needs from the host NLE.
///
/// The trait is deliberately flat: the host itself is a stateful
/// application with one open project and one current timeline, and the
/// methods mirror that surface. The session layer
/// ([`crate::session::HostSession`]) owns sequencing; the engine owns
/// semantics.
pub trait HostBackend: Send {
    /// Adapter-reported capability description for this host version.
    fn capabilities(&self) -> HostCapabilities;

    // Project manager surface.

    fn close_current_project(&mut self) -> ConformResult<()>;
    fn load_project(&mut self, name: &str) -> ConformResult<()>;
    fn save_project(&mut self) -> ConformResult<()>;
    fn rename_project(&mut self, name: &str) -> ConformResult<()>;
    fn current_project_name(&mut self) -> ConformResult<String>;

    /// Best effort; callers must tolerate failure.
    fn minimize_window(&mut self) -> ConformResult<()>;

    // Timeline surface.

    fn timeline_names(&mut self) -> ConformResult<Vec<String>>;
    fn set_current_timeline(&mut self, name: &str) -> ConformResult<()>;
    fn video_track_count(&mut self) -> ConformResult<u32>;

    /// Fresh snapshots of every item on a video track, in timeline order.
    /// Ids in previously returned snapshots are invalidated by any
    /// timeline mutation.
    fn track_items(&mut self, track: u32) -> ConformResult<Vec<TimelineItemSnapshot>>;

    // Media pool surface.

    /// Names of bins directly under the pool root.
    fn pool_bins(&mut self) -> ConformResult<Vec<String>>;
    fn create_bin(&mut self, name: &str) -> ConformResult<()>;
    fn set_current_bin(&mut self, name: &str) -> ConformResult<()>;
    fn delete_bin(&mut self, name: &str) -> ConformResult<()>;

    /// Import one file into the current bin.
    fn import_media(&mut self, path: &Path) -> ConformResult<MediaId>;

    /// Trim the pool asset to `[start_frame, end_frame)` before it is
    /// spliced into the timeline.
    fn set_clip_in_out(
        &mut self,
        media: &MediaId,
        start_frame: i64,
        end_frame: i64,
    ) -> ConformResult<()>;

    // Replacement primitives. Boolean returns mirror the host API: `false`
    // is a clean refusal, `Err` is a transport failure.

    fn replace_item_media(&mut self, item: &ItemId, media: &MediaId) -> ConformResult<bool>;
    fn add_take(&mut self, item: &ItemId, media: &MediaId) -> ConformResult<bool>;
    fn take_count(&mut self, item: &ItemId) -> ConformResult<u32>;
    fn select_take(&mut self, item: &ItemId, index: u32) -> ConformResult<bool>;
    fn finalize_take(&mut self, item: &ItemId) -> ConformResult<bool>;

    /// Display name of the media currently occupying the item.
    fn item_media_name(&mut self, item: &ItemId) -> ConformResult<String>;

    /// How many timeline items share this item's pool asset, including
    /// itself. Source-swap is only safe when this is exactly one.
    fn item_pool_usage(&mut self, item: &ItemId) -> ConformResult<u32>;

    /// Repoint the item's pool asset to a new backing file.
    fn swap_pool_source(&mut self, item: &ItemId, path: &Path) -> ConformResult<bool>;

    // Render surface.

    fn clear_render_queue(&mut self) -> ConformResult<()>;
    fn load_render_preset(&mut self, name: &str) -> ConformResult<bool>;
    fn apply_render_settings(&mut self, settings: &HostSettingsMap) -> ConformResult<bool>;

    /// Add the current timeline to the render queue; returns the job id.
    fn enqueue_render_job(&mut self) -> ConformResult<String>;
    fn start_rendering(&mut self) -> ConformResult<()>;
    fn render_job_status(&mut self, job_id: &str) -> ConformResult<RenderJobStatus>;
    fn render_in_progress(&mut self) -> ConformResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_frame_containment() {
        let snap = TimelineItemSnapshot {
            id: ItemId("3:0".to_string()),
            start_frame: 100,
            end_frame: 140,
            media_name: "placeholder_1".to_string(),
        };
        assert!(snap.contains_frame(100));
        assert!(snap.contains_frame(139));
        assert!(!snap.contains_frame(140));
        assert!(!snap.contains_frame(99));
    }

    #[test]
    fn test_job_status_decoding() {
        assert_eq!(
            RenderJobStatus::from_host_value(&json!({"JobStatus": "Complete"})),
            RenderJobStatus::Complete
        );
        assert_eq!(
            RenderJobStatus::from_host_value(
                &json!({"JobStatus": "Rendering", "CompletionPercentage": 42})
            ),
            RenderJobStatus::Rendering { percent: 42 }
        );
        assert_eq!(
            RenderJobStatus::from_host_value(&json!({"JobStatus": "Failed", "Error": "disk full"})),
            RenderJobStatus::Failed {
                error: "disk full".to_string()
            }
        );
        let unknown = RenderJobStatus::from_host_value(&json!({"JobStatus": "Paused"}));
        assert!(!unknown.is_terminal());
    }

    #[test]
    fn test_terminal_states() {
        assert!(RenderJobStatus::Complete.is_terminal());
        assert!(RenderJobStatus::Cancelled.is_terminal());
        assert!(!RenderJobStatus::Queued.is_terminal());
        assert!(!(RenderJobStatus::Rendering { percent: 99 }).is_terminal());
    }
}
