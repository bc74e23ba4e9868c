//! Logging and tracing initialization.
//!
//! Every run logs to the console; a log file can be added via
//! configuration so unattended watch-mode runs leave an audit trail of
//! what was replaced and rendered.

use std::sync::Arc;

use crate::config::LoggingConfig;

/// Initialize the tracing subscriber with the given configuration.
pub fn init_logging(config: &LoggingConfig) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let log_file = config.file.as_ref().and_then(|path| {
        match std::fs::OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(Arc::new(file)),
            Err(e) => {
                eprintln!("Could not open log file {}: {e}", path.display());
                None
            }
        }
    });

    if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .with(log_file.map(|file| fmt::layer().with_ansi(false).with_writer(file)))
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .with(log_file.map(|file| fmt::layer().with_ansi(false).with_writer(file)))
            .try_init()
            .ok();
    }
}

/// Initialize logging with defaults (useful for tests and quick scripts).
pub fn init_default_logging() {
    init_logging(&LoggingConfig::default());
}
