//! Error types shared across Heatlens crates.

use std::path::PathBuf;

/// Top-level error type for Heatlens operations.
#[derive(Debug, thiserror::Error)]
pub enum HeatlensError {
    #[error("Tracker error: {message}")]
    Tracker { message: String },

    #[error("Host page unavailable: {message}")]
    HostUnavailable { message: String },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Ingestion error: {message}")]
    Ingest { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using HeatlensError.
pub type HeatlensResult<T> = Result<T, HeatlensError>;

impl HeatlensError {
    pub fn tracker(msg: impl Into<String>) -> Self {
        Self::Tracker {
            message: msg.into(),
        }
    }

    pub fn host_unavailable(msg: impl Into<String>) -> Self {
        Self::HostUnavailable {
            message: msg.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
        }
    }

    pub fn ingest(msg: impl Into<String>) -> Self {
        Self::Ingest {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}
