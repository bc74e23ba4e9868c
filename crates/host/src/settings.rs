//! Translation from typed render configuration to the host's
//! string-keyed settings dictionary.
//!
//! This is the only place the untyped boundary exists. Key names and
//! value shapes (the frame rate travels as a string, for one) follow the
//! host's render-settings API.

use std::path::Path;

use serde_json::{json, Value};

use conform_common::config::RenderConfig;

use crate::api::HostSettingsMap;

/// Build the settings map for one job's render.
pub fn render_settings_map(
    render: &RenderConfig,
    target_dir: &Path,
    custom_name: &str,
) -> HostSettingsMap {
    let mut map = HostSettingsMap::new();
    map.insert("SelectAllFrames".into(), json!(true));
    map.insert("TargetDir".into(), json!(target_dir.to_string_lossy()));
    map.insert("CustomName".into(), json!(custom_name));
    // 0 keeps the exact CustomName instead of appending a counter.
    map.insert("UniqueFilenameStyle".into(), json!(0));
    map.insert("ExportVideo".into(), json!(true));
    map.insert("ExportAudio".into(), json!(true));
    map.insert("FormatWidth".into(), json!(render.width));
    map.insert("FormatHeight".into(), json!(render.height));
    map.insert("FrameRate".into(), Value::String(render.frame_rate.to_string()));
    map.insert("VideoQuality".into(), json!(render.video_quality));
    map.insert("AudioCodec".into(), json!(render.audio_codec));
    map.insert("AudioBitDepth".into(), json!(render.audio_bit_depth));
    map.insert("AudioSampleRate".into(), json!(render.audio_sample_rate));
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_map_carries_host_key_names() {
        let render = RenderConfig::default();
        let map = render_settings_map(&render, &PathBuf::from("/out"), "Conform_Smith");

        assert_eq!(map["TargetDir"], "/out");
        assert_eq!(map["CustomName"], "Conform_Smith");
        assert_eq!(map["FormatWidth"], 1920);
        assert_eq!(map["FormatHeight"], 1080);
        assert_eq!(map["UniqueFilenameStyle"], 0);
        assert_eq!(map["SelectAllFrames"], true);
    }

    #[test]
    fn test_frame_rate_is_stringly_typed_for_the_host() {
        let render = RenderConfig {
            frame_rate: 24,
            ..Default::default()
        };
        let map = render_settings_map(&render, &PathBuf::from("/out"), "x");
        assert_eq!(map["FrameRate"], Value::String("24".to_string()));
    }
}
