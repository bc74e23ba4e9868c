//! Error types shared across conform crates.

use std::path::PathBuf;

/// Top-level error type for conform operations.
#[derive(Debug, thiserror::Error)]
pub enum ConformError {
    /// The host application could not be reached or launched.
    #[error("Connection error: {message}")]
    Connection { message: String },

    /// Expected anchor positions are missing from the live template.
    #[error("Template integrity error: {message}")]
    TemplateIntegrity { message: String },

    /// A clip file referenced by the job does not exist on disk.
    #[error("Media not found: {path}")]
    MediaNotFound { path: PathBuf },

    /// All replacement strategies were exhausted, or the gate refused the job.
    #[error("Replacement error: {message}")]
    Replacement { message: String },

    /// The render failed, was cancelled, or timed out.
    #[error("Render error: {message}")]
    Render { message: String },

    /// A job file could not be parsed or failed validation.
    #[error("Job error: {message}")]
    Job { message: String },

    /// Invalid or unloadable configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The scripting transport to the host application failed.
    #[error("Host error: {message}")]
    Host { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ConformError.
pub type ConformResult<T> = Result<T, ConformError>;

impl ConformError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
        }
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::TemplateIntegrity {
            message: msg.into(),
        }
    }

    pub fn media_not_found(path: impl Into<PathBuf>) -> Self {
        Self::MediaNotFound { path: path.into() }
    }

    pub fn replacement(msg: impl Into<String>) -> Self {
        Self::Replacement {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn job(msg: impl Into<String>) -> Self {
        Self::Job {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn host(msg: impl Into<String>) -> Self {
        Self::Host {
            message: msg.into(),
        }
    }

    /// Whether the error is fatal to the whole process rather than one job.
    ///
    /// Losing the host connection means no later job can succeed either;
    /// everything else fails the current job only.
    pub fn is_fatal_to_process(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}
