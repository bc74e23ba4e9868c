//! Render drive: configure, enqueue, start, and wait.
//!
//! The host offers no push notification for render completion, so waiting
//! is fixed-interval polling under one overall timeout. Three mechanisms,
//! in order of preference: the per-job status query, the global
//! is-rendering query, and finally a file heuristic (exists, big enough,
//! size stable, fresh). The file heuristic also backstops the active
//! query, which can only say that rendering stopped, not that it
//! succeeded.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use conform_common::config::{PollingConfig, RenderConfig};
use conform_common::error::{ConformError, ConformResult};
use conform_host::settings::render_settings_map;
use conform_host::{HostBackend, HostCapabilities, RenderJobStatus};

/// One job's render parameters.
pub struct RenderRequest<'a> {
    pub render: &'a RenderConfig,
    pub polling: &'a PollingConfig,
    pub output_dir: &'a Path,
    /// Output file name without extension.
    pub base_name: &'a str,
}

/// What the output-file heuristic concluded on one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    /// No file at the expected path yet.
    Missing,
    /// File exists but is under the minimum size threshold.
    TooSmall,
    /// File is growing, or has not been stable long enough.
    Growing,
    /// File predates this render or exceeds the staleness bound; it is
    /// not this job's output.
    Stale,
    /// Above threshold and size-stable across the settle interval.
    Complete,
}

/// Stateful observer of the expected output file.
pub struct OutputProbe {
    path: PathBuf,
    min_bytes: u64,
    settle: Duration,
    stale_bound: Duration,
    started_at: SystemTime,
    last_size: Option<u64>,
    stable_since: Option<Instant>,
}

impl OutputProbe {
    pub fn new(
        path: impl Into<PathBuf>,
        min_bytes: u64,
        settle: Duration,
        stale_bound: Duration,
        started_at: SystemTime,
    ) -> Self {
        Self {
            path: path.into(),
            min_bytes,
            settle,
            stale_bound,
            started_at,
            last_size: None,
            stable_since: None,
        }
    }

    pub fn for_render(path: impl Into<PathBuf>, polling: &PollingConfig, started_at: SystemTime) -> Self {
        Self::new(
            path,
            polling.output_min_bytes,
            polling.output_settle(),
            Duration::from_secs(polling.output_stale_secs),
            started_at,
        )
    }

    /// Observe the file once and classify it.
    pub fn check(&mut self) -> ConformResult<ProbeStatus> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ProbeStatus::Missing),
            Err(e) => return Err(e.into()),
        };

        if let Ok(modified) = metadata.modified() {
            if modified < self.started_at {
                return Ok(ProbeStatus::Stale);
            }
            if let Ok(age) = SystemTime::now().duration_since(modified) {
                if age > self.stale_bound {
                    return Ok(ProbeStatus::Stale);
                }
            }
        }

        let size = metadata.len();
        if size < self.min_bytes {
            return Ok(ProbeStatus::TooSmall);
        }

        match (self.last_size, self.stable_since) {
            (Some(last), Some(since)) if last == size => {
                if since.elapsed() >= self.settle {
                    Ok(ProbeStatus::Complete)
                } else {
                    Ok(ProbeStatus::Growing)
                }
            }
            _ => {
                self.last_size = Some(size);
                self.stable_since = Some(Instant::now());
                Ok(ProbeStatus::Growing)
            }
        }
    }
}

/// Configure output, enqueue, start, and block until done or timed out.
/// Returns the rendered file's path.
pub fn drive_render(
    host: &mut dyn HostBackend,
    caps: &HostCapabilities,
    request: &RenderRequest<'_>,
) -> ConformResult<PathBuf> {
    std::fs::create_dir_all(request.output_dir)?;
    let output_path = request
        .output_dir
        .join(format!("{}.{}", request.base_name, request.render.extension));

    // A leftover file at the target path would satisfy the completion
    // heuristic before the render has written a byte.
    if output_path.exists() {
        tracing::info!(path = %output_path.display(), "Removing pre-existing output file");
        std::fs::remove_file(&output_path)?;
    }

    if let Err(e) = host.clear_render_queue() {
        tracing::warn!(error = %e, "Could not clear stale render queue");
    }

    if let Some(preset) = &request.render.preset {
        match host.load_render_preset(preset) {
            Ok(true) => tracing::info!(preset = %preset, "Loaded render preset"),
            Ok(false) => tracing::warn!(preset = %preset, "Render preset not found, using settings only"),
            Err(e) => tracing::warn!(preset = %preset, error = %e, "Could not load render preset"),
        }
    }

    let settings = render_settings_map(request.render, request.output_dir, request.base_name);
    if !host.apply_render_settings(&settings)? {
        return Err(ConformError::render("host rejected render settings"));
    }

    let started_at = SystemTime::now();
    let job_id = host.enqueue_render_job()?;
    host.start_rendering()?;
    tracing::info!(
        job_id = %job_id,
        output = %output_path.display(),
        "Render started"
    );

    let mut probe = OutputProbe::for_render(&output_path, request.polling, started_at);
    wait_for_render(host, caps, &job_id, &mut probe, request.polling)?;

    tracing::info!(output = %output_path.display(), "Render complete");
    Ok(output_path)
}

/// Poll until the render completes, fails, or times out.
pub fn wait_for_render(
    host: &mut dyn HostBackend,
    caps: &HostCapabilities,
    job_id: &str,
    probe: &mut OutputProbe,
    polling: &PollingConfig,
) -> ConformResult<()> {
    let deadline = Instant::now() + polling.render_timeout();

    loop {
        let mut fall_back_to_file = !caps.render_job_status;

        if caps.render_job_status {
            match host.render_job_status(job_id) {
                Ok(RenderJobStatus::Complete) => return Ok(()),
                Ok(RenderJobStatus::Failed { error }) => {
                    return Err(ConformError::render(format!("render failed: {error}")));
                }
                Ok(RenderJobStatus::Cancelled) => {
                    return Err(ConformError::render("render was cancelled"));
                }
                Ok(RenderJobStatus::Rendering { percent }) => {
                    tracing::info!(percent, "Rendering");
                }
                Ok(RenderJobStatus::Queued) | Ok(RenderJobStatus::Unknown(_)) => {
                    tracing::debug!("Render job not yet reporting progress");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Status query failed, falling back");
                    fall_back_to_file = true;
                }
            }
        }

        if fall_back_to_file {
            if caps.render_active_query {
                match host.render_in_progress() {
                    Ok(true) => {}
                    // Rendering stopped (or the query broke): only a
                    // complete output file proves success.
                    Ok(false) | Err(_) => {
                        if probe.check()? == ProbeStatus::Complete {
                            return Ok(());
                        }
                    }
                }
            } else if probe.check()? == ProbeStatus::Complete {
                return Ok(());
            }
        }

        if Instant::now() >= deadline {
            return Err(ConformError::render(format!(
                "render did not complete within {} seconds",
                polling.render_timeout_secs
            )));
        }
        std::thread::sleep(polling.render_poll());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockHost;
    use std::io::Write;

    fn fast_polling() -> PollingConfig {
        PollingConfig {
            render_poll_secs: 0,
            render_timeout_secs: 5,
            output_min_bytes: 16,
            output_settle_secs: 0,
            output_stale_secs: 3600,
            ..Default::default()
        }
    }

    fn temp_file(name: &str, bytes: usize) -> PathBuf {
        let dir = std::env::temp_dir().join("conform_render_tests");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![0u8; bytes]).unwrap();
        path
    }

    fn past() -> SystemTime {
        SystemTime::now() - Duration::from_secs(60)
    }

    #[test]
    fn test_probe_missing_file() {
        let mut probe = OutputProbe::new(
            std::env::temp_dir().join("conform_render_tests_missing.mp4"),
            16,
            Duration::ZERO,
            Duration::from_secs(3600),
            past(),
        );
        assert_eq!(probe.check().unwrap(), ProbeStatus::Missing);
    }

    #[test]
    fn test_probe_below_threshold_is_not_complete() {
        let path = temp_file("small.mp4", 4);
        let mut probe =
            OutputProbe::new(&path, 16, Duration::ZERO, Duration::from_secs(3600), past());
        assert_eq!(probe.check().unwrap(), ProbeStatus::TooSmall);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_probe_requires_stable_size() {
        let path = temp_file("stable.mp4", 64);
        let mut probe =
            OutputProbe::new(&path, 16, Duration::ZERO, Duration::from_secs(3600), past());
        // First observation establishes the baseline.
        assert_eq!(probe.check().unwrap(), ProbeStatus::Growing);
        assert_eq!(probe.check().unwrap(), ProbeStatus::Complete);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_probe_resets_when_file_grows() {
        let path = temp_file("growing.mp4", 64);
        let mut probe =
            OutputProbe::new(&path, 16, Duration::ZERO, Duration::from_secs(3600), past());
        assert_eq!(probe.check().unwrap(), ProbeStatus::Growing);
        {
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(&[0u8; 32]).unwrap();
        }
        assert_eq!(probe.check().unwrap(), ProbeStatus::Growing);
        assert_eq!(probe.check().unwrap(), ProbeStatus::Complete);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_probe_rejects_preexisting_file() {
        let path = temp_file("preexisting.mp4", 64);
        // Render "started" a minute from now, so the file predates it.
        let started_at = SystemTime::now() + Duration::from_secs(60);
        let mut probe = OutputProbe::new(
            &path,
            16,
            Duration::ZERO,
            Duration::from_secs(3600),
            started_at,
        );
        assert_eq!(probe.check().unwrap(), ProbeStatus::Stale);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_probe_rejects_file_older_than_staleness_bound() {
        let path = temp_file("aged.mp4", 64);
        let mut probe = OutputProbe::new(&path, 16, Duration::ZERO, Duration::from_millis(200), past());
        std::thread::sleep(Duration::from_millis(350));
        assert_eq!(probe.check().unwrap(), ProbeStatus::Stale);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_wait_completes_on_job_status() {
        let mut host = MockHost::new();
        host.render_status_script
            .push_back(RenderJobStatus::Rendering { percent: 50 });
        host.render_status_script.push_back(RenderJobStatus::Complete);

        let polling = fast_polling();
        let caps = host.capabilities;
        let mut probe = OutputProbe::for_render(
            std::env::temp_dir().join("conform_render_tests_unused.mp4"),
            &polling,
            SystemTime::now(),
        );
        wait_for_render(&mut host, &caps, "render-job-1", &mut probe, &polling).unwrap();
    }

    #[test]
    fn test_wait_surfaces_render_failure() {
        let mut host = MockHost::new();
        host.render_status_script.push_back(RenderJobStatus::Failed {
            error: "disk full".to_string(),
        });

        let polling = fast_polling();
        let caps = host.capabilities;
        let mut probe = OutputProbe::for_render(
            std::env::temp_dir().join("conform_render_tests_unused.mp4"),
            &polling,
            SystemTime::now(),
        );
        let err = wait_for_render(&mut host, &caps, "render-job-1", &mut probe, &polling)
            .unwrap_err();
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_wait_times_out() {
        let mut host = MockHost::new();
        // Status never terminal.
        for _ in 0..8 {
            host.render_status_script
                .push_back(RenderJobStatus::Rendering { percent: 10 });
        }
        let polling = PollingConfig {
            render_poll_secs: 0,
            render_timeout_secs: 0,
            ..fast_polling()
        };
        let caps = host.capabilities;
        let mut probe = OutputProbe::for_render(
            std::env::temp_dir().join("conform_render_tests_unused.mp4"),
            &polling,
            SystemTime::now(),
        );
        let err = wait_for_render(&mut host, &caps, "render-job-1", &mut probe, &polling)
            .unwrap_err();
        assert!(err.to_string().contains("did not complete"));
    }

    #[test]
    fn test_wait_falls_back_to_file_heuristic() {
        let mut host = MockHost::new();
        host.capabilities.render_job_status = false;
        host.capabilities.render_active_query = false;

        let path = temp_file("fallback.mp4", 64);
        let polling = fast_polling();
        let caps = host.capabilities;
        let mut probe = OutputProbe::new(&path, 16, Duration::ZERO, Duration::from_secs(3600), past());
        wait_for_render(&mut host, &caps, "render-job-1", &mut probe, &polling).unwrap();
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_active_query_requires_complete_output() {
        let mut host = MockHost::new();
        host.capabilities.render_job_status = false;
        host.render_active_script.push_back(true);
        host.render_active_script.push_back(false);

        let path = temp_file("active.mp4", 64);
        let polling = fast_polling();
        let caps = host.capabilities;
        let mut probe = OutputProbe::new(&path, 16, Duration::ZERO, Duration::from_secs(3600), past());
        wait_for_render(&mut host, &caps, "render-job-1", &mut probe, &polling).unwrap();
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_drive_render_removes_preexisting_output() {
        let dir = std::env::temp_dir().join("conform_drive_render_test");
        std::fs::create_dir_all(&dir).unwrap();
        let leftover = dir.join("Conform_Old.mp4");
        std::fs::write(&leftover, vec![0u8; 64]).unwrap();

        let mut host = MockHost::new();
        host.render_status_script.push_back(RenderJobStatus::Complete);
        let caps = host.capabilities;
        let render = RenderConfig::default();
        let polling = fast_polling();
        let request = RenderRequest {
            render: &render,
            polling: &polling,
            output_dir: &dir,
            base_name: "Conform_Old",
        };

        let output = drive_render(&mut host, &caps, &request).unwrap();
        assert_eq!(output, leftover);
        // The leftover was deleted before the (mocked) render ran.
        assert!(!output.exists());
        assert_eq!(host.renders_started, 1);
        assert_eq!(host.render_queue_cleared, 1);
        assert_eq!(
            host.applied_settings.as_ref().unwrap()["CustomName"],
            "Conform_Old"
        );
        std::fs::remove_dir_all(dir).ok();
    }
}
