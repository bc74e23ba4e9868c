//! In-memory host double for engine tests.
//!
//! Models just enough of the host to exercise the reconciliation logic:
//! tracks of items, a media pool, bins, takes, and a scriptable render
//! queue. Mutations bump an epoch that invalidates previously issued item
//! ids, so any code path that dereferences a stale handle fails the test
//! instead of silently reading old state.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use conform_common::error::{ConformError, ConformResult};
use conform_host::{
    HostBackend, HostCapabilities, HostSettingsMap, ItemId, MediaId, RenderJobStatus,
    TimelineItemSnapshot,
};

#[derive(Debug, Clone)]
pub struct MockItem {
    pub start_frame: i64,
    pub end_frame: i64,
    pub media_name: String,
    pub takes: Vec<String>,
    pub selected_take: Option<u32>,
    pub pool_usage: u32,
}

#[derive(Default)]
pub struct MockHost {
    pub capabilities: HostCapabilities,
    pub timelines: Vec<String>,
    pub current_timeline: Option<String>,
    pub tracks: BTreeMap<u32, Vec<MockItem>>,

    epoch: u64,
    media: BTreeMap<String, String>,
    media_seq: u64,

    // Failure injection.
    pub fail_direct_replace: bool,
    pub fail_add_take: bool,
    pub takes_finalize_noop: bool,
    pub fail_load_project: bool,

    // Scripted render behavior.
    pub render_status_script: VecDeque<RenderJobStatus>,
    pub render_active_script: VecDeque<bool>,

    // Spies.
    pub track_scans: Vec<u32>,
    pub loaded_projects: Vec<String>,
    pub closed_projects: u32,
    pub saves: u32,
    pub renamed_to: Vec<String>,
    pub bins: Vec<String>,
    pub created_bins: Vec<String>,
    pub deleted_bins: Vec<String>,
    pub current_bin: Option<String>,
    pub imported_paths: Vec<PathBuf>,
    pub clip_trims: Vec<(MediaId, i64, i64)>,
    pub takes_added: Vec<(ItemId, String)>,
    pub finalized_takes: u32,
    pub direct_replace_calls: u32,
    pub render_queue_cleared: u32,
    pub presets_loaded: Vec<String>,
    pub applied_settings: Option<HostSettingsMap>,
    pub render_jobs: Vec<String>,
    pub renders_started: u32,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            capabilities: HostCapabilities::default(),
            timelines: vec!["Main Timeline".to_string()],
            ..Default::default()
        }
    }

    pub fn add_item(&mut self, track: u32, start_frame: i64, end_frame: i64, media_name: &str) {
        self.add_shared_item(track, start_frame, end_frame, media_name, 1);
    }

    pub fn add_shared_item(
        &mut self,
        track: u32,
        start_frame: i64,
        end_frame: i64,
        media_name: &str,
        pool_usage: u32,
    ) {
        self.tracks.entry(track).or_default().push(MockItem {
            start_frame,
            end_frame,
            media_name: media_name.to_string(),
            takes: Vec::new(),
            selected_take: None,
            pool_usage,
        });
    }

    pub fn register_media(&mut self, display_name: &str) -> MediaId {
        self.media_seq += 1;
        let id = format!("m{}", self.media_seq);
        self.media.insert(id.clone(), display_name.to_string());
        MediaId(id)
    }

    pub fn item_name_at(&self, track: u32, frame: i64) -> String {
        self.tracks[&track]
            .iter()
            .find(|i| i.start_frame == frame)
            .map(|i| i.media_name.clone())
            .unwrap_or_default()
    }

    /// Invalidate every outstanding item id, as a real timeline mutation
    /// would.
    pub fn bump_epoch(&mut self) {
        self.epoch += 1;
    }

    fn media_name(&self, media: &MediaId) -> ConformResult<String> {
        self.media
            .get(&media.0)
            .cloned()
            .ok_or_else(|| ConformError::host(format!("unknown media id {}", media.0)))
    }

    fn locate(&self, item: &ItemId) -> ConformResult<(u32, usize)> {
        let parts: Vec<&str> = item.0.split(':').collect();
        let parsed = match parts.as_slice() {
            [epoch, track, index] => {
                match (
                    epoch.strip_prefix('e').and_then(|s| s.parse::<u64>().ok()),
                    track.strip_prefix('t').and_then(|s| s.parse::<u32>().ok()),
                    index.strip_prefix('i').and_then(|s| s.parse::<usize>().ok()),
                ) {
                    (Some(e), Some(t), Some(i)) => Some((e, t, i)),
                    _ => None,
                }
            }
            _ => None,
        };
        let (epoch, track, index) =
            parsed.ok_or_else(|| ConformError::host(format!("unknown item id {}", item.0)))?;
        if epoch != self.epoch {
            return Err(ConformError::host(format!(
                "stale item id {} (timeline mutated since scan)",
                item.0
            )));
        }
        if self.tracks.get(&track).map_or(true, |t| index >= t.len()) {
            return Err(ConformError::host(format!("unknown item id {}", item.0)));
        }
        Ok((track, index))
    }

    fn item_mut(&mut self, item: &ItemId) -> ConformResult<&mut MockItem> {
        let (track, index) = self.locate(item)?;
        Ok(&mut self.tracks.get_mut(&track).unwrap()[index])
    }
}

impl HostBackend for MockHost {
    fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    fn close_current_project(&mut self) -> ConformResult<()> {
        self.closed_projects += 1;
        Ok(())
    }

    fn load_project(&mut self, name: &str) -> ConformResult<()> {
        if self.fail_load_project {
            return Err(ConformError::host(format!("could not load {name}")));
        }
        self.loaded_projects.push(name.to_string());
        Ok(())
    }

    fn save_project(&mut self) -> ConformResult<()> {
        self.saves += 1;
        Ok(())
    }

    fn rename_project(&mut self, name: &str) -> ConformResult<()> {
        self.renamed_to.push(name.to_string());
        Ok(())
    }

    fn current_project_name(&mut self) -> ConformResult<String> {
        Ok(self
            .renamed_to
            .last()
            .or(self.loaded_projects.last())
            .cloned()
            .unwrap_or_else(|| "Untitled".to_string()))
    }

    fn minimize_window(&mut self) -> ConformResult<()> {
        Ok(())
    }

    fn timeline_names(&mut self) -> ConformResult<Vec<String>> {
        Ok(self.timelines.clone())
    }

    fn set_current_timeline(&mut self, name: &str) -> ConformResult<()> {
        if !self.timelines.iter().any(|t| t == name) {
            return Err(ConformError::host(format!("no timeline named {name}")));
        }
        self.current_timeline = Some(name.to_string());
        Ok(())
    }

    fn video_track_count(&mut self) -> ConformResult<u32> {
        Ok(self.tracks.keys().max().copied().unwrap_or(0))
    }

    fn track_items(&mut self, track: u32) -> ConformResult<Vec<TimelineItemSnapshot>> {
        self.track_scans.push(track);
        let epoch = self.epoch;
        Ok(self
            .tracks
            .get(&track)
            .map(|items| {
                items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| TimelineItemSnapshot {
                        id: ItemId(format!("e{epoch}:t{track}:i{index}")),
                        start_frame: item.start_frame,
                        end_frame: item.end_frame,
                        media_name: item.media_name.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn pool_bins(&mut self) -> ConformResult<Vec<String>> {
        Ok(self.bins.clone())
    }

    fn create_bin(&mut self, name: &str) -> ConformResult<()> {
        self.bins.push(name.to_string());
        self.created_bins.push(name.to_string());
        Ok(())
    }

    fn set_current_bin(&mut self, name: &str) -> ConformResult<()> {
        if !self.bins.iter().any(|b| b == name) {
            return Err(ConformError::host(format!("no bin named {name}")));
        }
        self.current_bin = Some(name.to_string());
        Ok(())
    }

    fn delete_bin(&mut self, name: &str) -> ConformResult<()> {
        let before = self.bins.len();
        self.bins.retain(|b| b != name);
        if self.bins.len() == before {
            return Err(ConformError::host(format!("no bin named {name}")));
        }
        self.deleted_bins.push(name.to_string());
        Ok(())
    }

    fn import_media(&mut self, path: &Path) -> ConformResult<MediaId> {
        self.imported_paths.push(path.to_path_buf());
        let display = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(self.register_media(&display))
    }

    fn set_clip_in_out(
        &mut self,
        media: &MediaId,
        start_frame: i64,
        end_frame: i64,
    ) -> ConformResult<()> {
        self.media_name(media)?;
        self.clip_trims.push((media.clone(), start_frame, end_frame));
        Ok(())
    }

    fn replace_item_media(&mut self, item: &ItemId, media: &MediaId) -> ConformResult<bool> {
        self.direct_replace_calls += 1;
        if self.fail_direct_replace {
            return Ok(false);
        }
        let name = self.media_name(media)?;
        self.item_mut(item)?.media_name = name;
        self.bump_epoch();
        Ok(true)
    }

    fn add_take(&mut self, item: &ItemId, media: &MediaId) -> ConformResult<bool> {
        if self.fail_add_take {
            return Ok(false);
        }
        let name = self.media_name(media)?;
        self.item_mut(item)?.takes.push(name.clone());
        self.takes_added.push((item.clone(), name));
        Ok(true)
    }

    fn take_count(&mut self, item: &ItemId) -> ConformResult<u32> {
        Ok(1 + self.item_mut(item)?.takes.len() as u32)
    }

    fn select_take(&mut self, item: &ItemId, index: u32) -> ConformResult<bool> {
        self.item_mut(item)?.selected_take = Some(index);
        Ok(true)
    }

    fn finalize_take(&mut self, item: &ItemId) -> ConformResult<bool> {
        self.finalized_takes += 1;
        if self.takes_finalize_noop {
            return Ok(true);
        }
        let selected = {
            let entry = self.item_mut(item)?;
            match (entry.selected_take, entry.takes.last().cloned()) {
                // Take index 1 is the original media; 2.. are added takes.
                (Some(index), _) if index >= 2 => {
                    entry.takes.get(index as usize - 2).cloned()
                }
                (_, last) => last,
            }
        };
        if let Some(name) = selected {
            let entry = self.item_mut(item)?;
            entry.media_name = name;
            entry.takes.clear();
            entry.selected_take = None;
            self.bump_epoch();
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn item_media_name(&mut self, item: &ItemId) -> ConformResult<String> {
        Ok(self.item_mut(item)?.media_name.clone())
    }

    fn item_pool_usage(&mut self, item: &ItemId) -> ConformResult<u32> {
        Ok(self.item_mut(item)?.pool_usage)
    }

    fn swap_pool_source(&mut self, item: &ItemId, path: &Path) -> ConformResult<bool> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.item_mut(item)?.media_name = name;
        self.bump_epoch();
        Ok(true)
    }

    fn clear_render_queue(&mut self) -> ConformResult<()> {
        self.render_queue_cleared += 1;
        Ok(())
    }

    fn load_render_preset(&mut self, name: &str) -> ConformResult<bool> {
        self.presets_loaded.push(name.to_string());
        Ok(true)
    }

    fn apply_render_settings(&mut self, settings: &HostSettingsMap) -> ConformResult<bool> {
        self.applied_settings = Some(settings.clone());
        Ok(true)
    }

    fn enqueue_render_job(&mut self) -> ConformResult<String> {
        let job_id = format!("render-job-{}", self.render_jobs.len() + 1);
        self.render_jobs.push(job_id.clone());
        Ok(job_id)
    }

    fn start_rendering(&mut self) -> ConformResult<()> {
        self.renders_started += 1;
        Ok(())
    }

    fn render_job_status(&mut self, _job_id: &str) -> ConformResult<RenderJobStatus> {
        Ok(self
            .render_status_script
            .pop_front()
            .unwrap_or(RenderJobStatus::Complete))
    }

    fn render_in_progress(&mut self) -> ConformResult<bool> {
        Ok(self.render_active_script.pop_front().unwrap_or(false))
    }
}
