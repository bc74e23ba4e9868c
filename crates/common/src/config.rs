//! Application configuration.
//!
//! Everything the automation needs to know up front lives here: which
//! template project to load, where the slot table is, where output goes,
//! and every polling knob. Nothing in this file is derived from job input.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConformError, ConformResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Template project settings.
    pub template: TemplateConfig,

    /// Filesystem layout for job intake and output.
    pub paths: PathsConfig,

    /// Render format parameters.
    pub render: RenderConfig,

    /// Host application connection settings.
    pub host: HostConfig,

    /// Polling intervals and timeouts.
    pub polling: PollingConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Which template project and timeline the automation targets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Project name as it appears in the host's project manager.
    pub project_name: String,

    /// Timeline name inside the template project.
    pub timeline_name: String,

    /// Video track index that carries the replaceable placeholders.
    pub video_track: u32,

    /// Path to the slot-table JSON file (external, versioned configuration).
    pub slot_table: PathBuf,

    /// Prefix for media-pool bins created per job. Bins carrying this
    /// prefix from previous runs are purged before replacement starts.
    pub bin_prefix: String,

    /// Prefix for the saved per-job project name.
    pub project_prefix: String,
}

/// Directories the automation reads from and writes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where rendered videos are written.
    pub output_dir: PathBuf,

    /// Where processed job files are moved on success.
    pub completed_dir: PathBuf,
}

/// Render format parameters, applied to every job.
///
/// These are typed here; the translation to the host's string-keyed
/// settings map happens in exactly one place in the host adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Render preset name to load in the host, if any.
    pub preset: Option<String>,

    /// Output container extension (without dot).
    pub extension: String,

    pub width: u32,
    pub height: u32,

    /// Timeline frame rate.
    pub frame_rate: u32,

    /// Host video quality knob (0 = automatic).
    pub video_quality: u32,

    pub audio_codec: String,
    pub audio_bit_depth: u32,
    pub audio_sample_rate: u32,
}

/// How to reach (and if necessary start) the host application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Path to the host application binary, used when no instance is
    /// running and one has to be launched.
    pub app_path: Option<PathBuf>,

    /// Path to the host's bundled script interpreter.
    pub script_shell: PathBuf,

    /// Whether to minimize the host window after connecting (best effort).
    pub minimize_window: bool,

    /// Enable the pool-asset source-swap replacement strategy. Off by
    /// default: it is only safe when pool assets are slot-exclusive.
    pub allow_source_swap: bool,
}

/// Polling intervals and timeouts. All waiting in the system is
/// fixed-interval polling; these are the only places the numbers live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Connection attempts before giving up on the host.
    pub connect_attempts: u32,

    /// Seconds between connection attempts.
    pub connect_interval_secs: u64,

    /// Seconds to wait after launching the host before the first retry.
    pub launch_wait_secs: u64,

    /// Seconds between render status polls.
    pub render_poll_secs: u64,

    /// Overall render timeout in seconds. Exceeding it fails the job.
    pub render_timeout_secs: u64,

    /// Minimum output file size before the file heuristic will consider
    /// a render complete.
    pub output_min_bytes: u64,

    /// Seconds the output file size must hold steady before the file
    /// heuristic declares completion.
    pub output_settle_secs: u64,

    /// An output file whose mtime predates render start by more than this
    /// many seconds is not this job's output.
    pub output_stale_secs: u64,

    /// Seconds between watch-directory scans.
    pub watch_interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "conform=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            template: TemplateConfig::default(),
            paths: PathsConfig::default(),
            render: RenderConfig::default(),
            host: HostConfig::default(),
            polling: PollingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            project_name: "Template".to_string(),
            timeline_name: "Main Timeline".to_string(),
            video_track: 1,
            slot_table: PathBuf::from("slot_table.json"),
            bin_prefix: "Conform".to_string(),
            project_prefix: "Conform".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("rendered"),
            completed_dir: PathBuf::from("completed"),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            preset: None,
            extension: "mp4".to_string(),
            width: 1920,
            height: 1080,
            frame_rate: 24,
            video_quality: 0,
            audio_codec: "aac".to_string(),
            audio_bit_depth: 16,
            audio_sample_rate: 48000,
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            app_path: None,
            script_shell: PathBuf::from("fuscript"),
            minimize_window: true,
            allow_source_swap: false,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 5,
            connect_interval_secs: 5,
            launch_wait_secs: 15,
            render_poll_secs: 2,
            render_timeout_secs: 1800,
            output_min_bytes: 1024 * 1024,
            output_settle_secs: 4,
            output_stale_secs: 300,
            watch_interval_secs: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl PollingConfig {
    pub fn connect_interval(&self) -> Duration {
        Duration::from_secs(self.connect_interval_secs)
    }

    pub fn launch_wait(&self) -> Duration {
        Duration::from_secs(self.launch_wait_secs)
    }

    pub fn render_poll(&self) -> Duration {
        Duration::from_secs(self.render_poll_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn output_settle(&self) -> Duration {
        Duration::from_secs(self.output_settle_secs)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs)
    }
}

impl AppConfig {
    /// Load config from an explicit path, failing on any parse error.
    pub fn load_from(path: &std::path::Path) -> ConformResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConformError::config(format!("Failed to read config at {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            ConformError::config(format!("Failed to parse config at {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Ignoring config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Sanity checks that do not require the host to be reachable.
    pub fn validate(&self) -> ConformResult<()> {
        if self.template.project_name.is_empty() {
            return Err(ConformError::config("template.project_name is empty"));
        }
        if self.template.timeline_name.is_empty() {
            return Err(ConformError::config("template.timeline_name is empty"));
        }
        if self.template.video_track == 0 {
            return Err(ConformError::config(
                "template.video_track is 1-based and must be positive",
            ));
        }
        if self.polling.connect_attempts == 0 {
            return Err(ConformError::config("polling.connect_attempts must be > 0"));
        }
        if self.polling.render_timeout_secs <= self.polling.render_poll_secs {
            return Err(ConformError::config(
                "polling.render_timeout_secs must exceed polling.render_poll_secs",
            ));
        }
        Ok(())
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("conform").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn test_config_roundtrip() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.template.project_name, config.template.project_name);
        assert_eq!(parsed.polling.render_timeout_secs, 1800);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let json = r#"{ "template": { "project_name": "MAG_BACKUP" } }"#;
        let parsed: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.template.project_name, "MAG_BACKUP");
        // Untouched sections come from defaults
        assert_eq!(parsed.render.width, 1920);
        assert_eq!(parsed.polling.connect_attempts, 5);
    }

    #[test]
    fn test_validate_rejects_zero_track() {
        let mut config = AppConfig::default();
        config.template.video_track = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_timeout_below_poll_interval() {
        let mut config = AppConfig::default();
        config.polling.render_timeout_secs = 1;
        config.polling.render_poll_secs = 2;
        assert!(config.validate().is_err());
    }
}
