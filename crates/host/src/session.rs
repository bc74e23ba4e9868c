//! Session handshake and lifecycle.
//!
//! The host's scripting handle is a process-wide singleton: one session,
//! one job in flight, strictly serial. `HostSession` makes that explicit:
//! it is created once by [`HostSession::connect`] and handed to every
//! operation that touches the host.

use std::process::Command;

use conform_common::config::{HostConfig, PollingConfig};
use conform_common::error::{ConformError, ConformResult};

use crate::api::{HostBackend, HostCapabilities};
use crate::bridge::ScriptBridge;

/// A live, exclusive session with the host application.
pub struct HostSession {
    backend: Box<dyn HostBackend>,
    capabilities: HostCapabilities,
}

impl HostSession {
    /// Connect to a running host; if none is reachable, launch one (when
    /// a binary is configured) and keep retrying on a fixed interval.
    /// Exhausting the configured attempts is fatal to the process.
    pub fn connect(host: &HostConfig, polling: &PollingConfig) -> ConformResult<Self> {
        let mut launched = false;
        let mut last_error = ConformError::host("no connection attempted");

        for attempt in 1..=polling.connect_attempts {
            tracing::info!(
                attempt,
                total = polling.connect_attempts,
                "Connecting to host scripting runtime"
            );
            match ScriptBridge::connect(host) {
                Ok(bridge) => {
                    let mut session = Self {
                        capabilities: bridge.capabilities(),
                        backend: Box::new(bridge),
                    };
                    session.minimize_best_effort(host);
                    return Ok(session);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Connection attempt failed");
                    last_error = e;
                }
            }

            if !launched {
                if let Some(app_path) = &host.app_path {
                    tracing::info!(app = %app_path.display(), "Host not running, launching it");
                    match Command::new(app_path).spawn() {
                        Ok(_) => {
                            launched = true;
                            std::thread::sleep(polling.launch_wait());
                            continue;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Could not launch host application");
                        }
                    }
                }
            }

            if attempt < polling.connect_attempts {
                std::thread::sleep(polling.connect_interval());
            }
        }

        Err(ConformError::connection(format!(
            "could not reach host after {} attempts: {last_error}",
            polling.connect_attempts
        )))
    }

    /// Wrap an already-constructed backend (used by tests and by tools
    /// that bring their own transport).
    pub fn from_backend(backend: Box<dyn HostBackend>) -> Self {
        Self {
            capabilities: backend.capabilities(),
            backend,
        }
    }

    pub fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    pub fn backend(&mut self) -> &mut dyn HostBackend {
        self.backend.as_mut()
    }

    fn minimize_best_effort(&mut self, host: &HostConfig) {
        if !host.minimize_window {
            return;
        }
        if !self.capabilities.window_control {
            tracing::debug!("Host does not support window control, leaving window as-is");
            return;
        }
        if let Err(e) = self.backend.minimize_window() {
            tracing::debug!(error = %e, "Could not minimize host window");
        }
    }
}
