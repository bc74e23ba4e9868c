//! Production host backend: drives the NLE's bundled script interpreter.
//!
//! The host exposes its automation surface only inside its own scripting
//! runtime, so the backend spawns that interpreter running a small bridge
//! program (`assets/bridge.py`) and speaks line-delimited JSON over its
//! stdin/stdout. One request, one response, strictly in order; the host
//! API is not reentrant and neither is this transport.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde::Deserialize;
use serde_json::{json, Value};

use conform_common::config::HostConfig;
use conform_common::error::{ConformError, ConformResult};

use crate::api::{
    HostBackend, HostCapabilities, HostSettingsMap, ItemId, MediaId, RenderJobStatus,
    TimelineItemSnapshot,
};

const BRIDGE_SCRIPT: &str = include_str!("../assets/bridge.py");
const BRIDGE_SCRIPT_NAME: &str = "conform-bridge.py";

/// Encode one request line.
fn encode_request(id: u64, method: &str, params: Value) -> String {
    let mut line = json!({
        "id": id,
        "method": method,
        "params": params,
    })
    .to_string();
    line.push('\n');
    line
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    #[serde(default)]
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Decode one response line.
fn decode_response(line: &str) -> ConformResult<BridgeResponse> {
    serde_json::from_str(line)
        .map_err(|e| ConformError::host(format!("malformed bridge response: {e}: {line}")))
}

#[derive(Debug, Deserialize)]
struct HelloReply {
    product: String,
    version: String,
    capabilities: HostCapabilities,
}

/// A live connection to the host's scripting runtime.
pub struct ScriptBridge {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    seq: u64,
    product: String,
    version: String,
    capabilities: HostCapabilities,
}

impl ScriptBridge {
    /// Spawn the script interpreter and perform the hello exchange. Fails
    /// fast when the interpreter is missing or the host is not running;
    /// the session layer owns launch-and-retry.
    pub fn connect(config: &HostConfig) -> ConformResult<Self> {
        let script_path = std::env::temp_dir().join(BRIDGE_SCRIPT_NAME);
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let mut child = Command::new(&config.script_shell)
            .arg("-l")
            .arg("py3")
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                ConformError::host(format!(
                    "could not start script shell {}: {e}",
                    config.script_shell.display()
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ConformError::host("bridge stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ConformError::host("bridge stdout unavailable"))?;

        let mut bridge = Self {
            child,
            stdin,
            reader: BufReader::new(stdout),
            seq: 0,
            product: String::new(),
            version: String::new(),
            capabilities: HostCapabilities::default(),
        };

        let hello = bridge.call("hello", json!({}))?;
        let reply: HelloReply = serde_json::from_value(hello)
            .map_err(|e| ConformError::host(format!("bad hello reply: {e}")))?;

        tracing::info!(
            product = %reply.product,
            version = %reply.version,
            "Connected to host scripting runtime"
        );
        bridge.product = reply.product;
        bridge.version = reply.version;
        bridge.capabilities = reply.capabilities;
        Ok(bridge)
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    fn call(&mut self, method: &str, params: Value) -> ConformResult<Value> {
        self.seq += 1;
        let id = self.seq;
        let line = encode_request(id, method, params);
        self.stdin
            .write_all(line.as_bytes())
            .and_then(|_| self.stdin.flush())
            .map_err(|e| ConformError::host(format!("bridge write failed: {e}")))?;

        let mut response_line = String::new();
        let n = self
            .reader
            .read_line(&mut response_line)
            .map_err(|e| ConformError::host(format!("bridge read failed: {e}")))?;
        if n == 0 {
            return Err(ConformError::host("bridge terminated unexpectedly"));
        }

        let response = decode_response(response_line.trim())?;
        if response.id != Some(id) {
            return Err(ConformError::host(format!(
                "bridge response id mismatch: sent {id}, got {:?}",
                response.id
            )));
        }
        if !response.ok {
            return Err(ConformError::host(
                response.error.unwrap_or_else(|| "unknown bridge error".to_string()),
            ));
        }
        Ok(response.result)
    }

    fn call_bool(&mut self, method: &str, params: Value) -> ConformResult<bool> {
        let value = self.call(method, params)?;
        value
            .as_bool()
            .ok_or_else(|| ConformError::host(format!("{method}: expected boolean reply")))
    }

    fn call_unit(&mut self, method: &str, params: Value) -> ConformResult<()> {
        self.call(method, params).map(|_| ())
    }
}

impl Drop for ScriptBridge {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl HostBackend for ScriptBridge {
    fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    fn close_current_project(&mut self) -> ConformResult<()> {
        self.call_unit("close_current_project", json!({}))
    }

    fn load_project(&mut self, name: &str) -> ConformResult<()> {
        self.call_unit("load_project", json!({ "name": name }))
    }

    fn save_project(&mut self) -> ConformResult<()> {
        self.call_unit("save_project", json!({}))
    }

    fn rename_project(&mut self, name: &str) -> ConformResult<()> {
        self.call_unit("rename_project", json!({ "name": name }))
    }

    fn current_project_name(&mut self) -> ConformResult<String> {
        let value = self.call("current_project_name", json!({}))?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ConformError::host("current_project_name: expected string"))
    }

    fn minimize_window(&mut self) -> ConformResult<()> {
        self.call_unit("minimize_window", json!({}))
    }

    fn timeline_names(&mut self) -> ConformResult<Vec<String>> {
        let value = self.call("timeline_names", json!({}))?;
        serde_json::from_value(value)
            .map_err(|e| ConformError::host(format!("timeline_names: {e}")))
    }

    fn set_current_timeline(&mut self, name: &str) -> ConformResult<()> {
        self.call_unit("set_current_timeline", json!({ "name": name }))
    }

    fn video_track_count(&mut self) -> ConformResult<u32> {
        let value = self.call("video_track_count", json!({}))?;
        value
            .as_u64()
            .map(|n| n as u32)
            .ok_or_else(|| ConformError::host("video_track_count: expected integer"))
    }

    fn track_items(&mut self, track: u32) -> ConformResult<Vec<TimelineItemSnapshot>> {
        let value = self.call("track_items", json!({ "track": track }))?;
        serde_json::from_value(value).map_err(|e| ConformError::host(format!("track_items: {e}")))
    }

    fn pool_bins(&mut self) -> ConformResult<Vec<String>> {
        let value = self.call("pool_bins", json!({}))?;
        serde_json::from_value(value).map_err(|e| ConformError::host(format!("pool_bins: {e}")))
    }

    fn create_bin(&mut self, name: &str) -> ConformResult<()> {
        self.call_unit("create_bin", json!({ "name": name }))
    }

    fn set_current_bin(&mut self, name: &str) -> ConformResult<()> {
        self.call_unit("set_current_bin", json!({ "name": name }))
    }

    fn delete_bin(&mut self, name: &str) -> ConformResult<()> {
        self.call_unit("delete_bin", json!({ "name": name }))
    }

    fn import_media(&mut self, path: &Path) -> ConformResult<MediaId> {
        let value = self.call("import_media", json!({ "path": path.to_string_lossy() }))?;
        value
            .as_str()
            .map(|s| MediaId(s.to_string()))
            .ok_or_else(|| ConformError::host("import_media: expected media id"))
    }

    fn set_clip_in_out(
        &mut self,
        media: &MediaId,
        start_frame: i64,
        end_frame: i64,
    ) -> ConformResult<()> {
        self.call_unit(
            "set_clip_in_out",
            json!({ "media": media.0, "start_frame": start_frame, "end_frame": end_frame }),
        )
    }

    fn replace_item_media(&mut self, item: &ItemId, media: &MediaId) -> ConformResult<bool> {
        self.call_bool(
            "replace_item_media",
            json!({ "item": item.0, "media": media.0 }),
        )
    }

    fn add_take(&mut self, item: &ItemId, media: &MediaId) -> ConformResult<bool> {
        self.call_bool("add_take", json!({ "item": item.0, "media": media.0 }))
    }

    fn take_count(&mut self, item: &ItemId) -> ConformResult<u32> {
        let value = self.call("take_count", json!({ "item": item.0 }))?;
        value
            .as_u64()
            .map(|n| n as u32)
            .ok_or_else(|| ConformError::host("take_count: expected integer"))
    }

    fn select_take(&mut self, item: &ItemId, index: u32) -> ConformResult<bool> {
        self.call_bool("select_take", json!({ "item": item.0, "index": index }))
    }

    fn finalize_take(&mut self, item: &ItemId) -> ConformResult<bool> {
        self.call_bool("finalize_take", json!({ "item": item.0 }))
    }

    fn item_media_name(&mut self, item: &ItemId) -> ConformResult<String> {
        let value = self.call("item_media_name", json!({ "item": item.0 }))?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ConformError::host("item_media_name: expected string"))
    }

    fn item_pool_usage(&mut self, item: &ItemId) -> ConformResult<u32> {
        let value = self.call("item_pool_usage", json!({ "item": item.0 }))?;
        value
            .as_u64()
            .map(|n| n as u32)
            .ok_or_else(|| ConformError::host("item_pool_usage: expected integer"))
    }

    fn swap_pool_source(&mut self, item: &ItemId, path: &Path) -> ConformResult<bool> {
        self.call_bool(
            "swap_pool_source",
            json!({ "item": item.0, "path": path.to_string_lossy() }),
        )
    }

    fn clear_render_queue(&mut self) -> ConformResult<()> {
        self.call_unit("clear_render_queue", json!({}))
    }

    fn load_render_preset(&mut self, name: &str) -> ConformResult<bool> {
        self.call_bool("load_render_preset", json!({ "name": name }))
    }

    fn apply_render_settings(&mut self, settings: &HostSettingsMap) -> ConformResult<bool> {
        self.call_bool("apply_render_settings", json!({ "settings": settings }))
    }

    fn enqueue_render_job(&mut self) -> ConformResult<String> {
        let value = self.call("enqueue_render_job", json!({}))?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ConformError::host("enqueue_render_job: expected job id"))
    }

    fn start_rendering(&mut self) -> ConformResult<()> {
        self.call_unit("start_rendering", json!({}))
    }

    fn render_job_status(&mut self, job_id: &str) -> ConformResult<RenderJobStatus> {
        let value = self.call("render_job_status", json!({ "job_id": job_id }))?;
        Ok(RenderJobStatus::from_host_value(&value))
    }

    fn render_in_progress(&mut self) -> ConformResult<bool> {
        self.call_bool("render_in_progress", json!({}))
    }
}
